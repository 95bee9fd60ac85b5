use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod state;

use notehub_backend::audit::SqliteAuditSink;
use notehub_backend::cache::{CompositeCache, LocalBackend, RedisBackend};
use notehub_backend::config::{self, CacheConfig};
use notehub_backend::{db, search};
use state::AppState;

/// Build the composite cache; an unreachable Redis leaves it local-only / 构建缓存
async fn build_cache(cache_config: &CacheConfig, local: Arc<LocalBackend>) -> CompositeCache {
    if !cache_config.redis_enabled {
        tracing::info!("Redis cache disabled, using in-process cache only");
        return CompositeCache::local_only(local);
    }

    match RedisBackend::connect(cache_config).await {
        Ok(redis) => CompositeCache::with_remote(Arc::new(redis), local),
        Err(e) => {
            tracing::warn!("Redis unavailable, falling back to in-process cache: {}", e);
            CompositeCache::local_only(local)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notehub_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    config::init_config().map_err(anyhow::Error::msg)?;
    let app_config = config::config();
    tracing::info!("Server will listen on {}:{}", app_config.server.host, app_config.server.port);

    // Create data directory if not exists / 创建数据目录
    let data_dir = app_config.get_data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Created data directory: {:?}", data_dir);
    }

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| app_config.get_database_url());
    let timeout = app_config.database.timeout();

    let pool = db::connect(&database_url, app_config.database.max_connections, timeout).await?;
    db::run_migrations(&pool).await?;

    let local = Arc::new(LocalBackend::new());
    let sweeper = local.spawn_sweeper(app_config.cache.sweep_interval());
    let cache = Arc::new(build_cache(&app_config.cache, local).await);

    let audit = Arc::new(SqliteAuditSink::new(pool.clone(), timeout));
    let stack = search::build_stack(pool.clone(), timeout, cache.clone(), audit, &app_config.search);

    let state = Arc::new(AppState {
        db: pool.clone(),
        cache,
        engine: stack.engine,
        admin: stack.admin,
        tasks: stack.tasks,
    });

    let app = Router::new()
        .route("/api/health", get(api::server::health_check))
        // 搜索API
        .route("/api/search", get(api::search::search))
        .route("/api/search/trending", get(api::search::trending))
        .route("/api/search/suggest", get(api::search::suggest))
        // 搜索管理API
        .route("/api/admin/search/config", get(api::search::get_search_config))
        .route("/api/admin/search/config", post(api::search::update_search_config))
        .route("/api/admin/search/index/rebuild", post(api::search::rebuild_index))
        .route("/api/admin/search/index/status", get(api::search::index_status))
        .route("/api/admin/search/cache/clear", post(api::search::clear_cache))
        .route("/api/admin/search/sensitive-words", get(api::search::list_sensitive_words))
        .route("/api/admin/search/sensitive-words", post(api::search::add_sensitive_word))
        .route("/api/admin/search/sensitive-words/delete", post(api::search::remove_sensitive_word))
        .route("/api/admin/search/blocked", get(api::search::list_blocked_notes))
        .route("/api/admin/search/blocked", post(api::search::block_note))
        .route("/api/admin/search/blocked/delete", post(api::search::unblock_note))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await?;

    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain pending invalidations and audit writes / 等待后台任务完成
    state.tasks.settle().await;
    sweeper.abort();
    drop(state);
    // Closing the queue lets the log worker flush and exit / 关闭日志队列
    if tokio::time::timeout(timeout, stack.log_worker).await.is_err() {
        tracing::warn!("Search log worker did not finish within {:?}", timeout);
    }
    pool.close().await;

    Ok(())
}
