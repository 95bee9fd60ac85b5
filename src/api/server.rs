use axum::{
    extract::State,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::state::AppState;

/// GET /api/health - 健康检查
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database_ok = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();

    Json(json!({
        "status": if database_ok { "ok" } else { "degraded" },
        "message": if database_ok { "NoteHub 服务运行正常" } else { "数据库不可用" },
        "version": env!("CARGO_PKG_VERSION"),
        "build_time": env!("BUILD_TIME"),
        "database": database_ok,
        "cache_backend": if state.cache.has_remote() { "redis+local" } else { "local" },
        "background_tasks": state.tasks.pending(),
    }))
}
