//! Search module - note retrieval, caching and index lifecycle / 搜索模块
//!
//! Components / 组件：
//! - `SensitiveWordGate`: cached word list blocking or masking input
//! - `SearchIndex`: FTS5 mirror of active notes, rebuilt wholesale
//! - `SearchEngine`: gating, caching, strategy choice, ranking, highlighting
//! - `IndexAdmin`: rebuild / inspect / clear plus config and moderation
//!
//! Index features / 索引特性：
//! - Chinese word segmentation via jieba, simplified/traditional folding
//! - Substring fallback when the index is absent or disabled

pub mod admin;
pub mod engine;
pub mod highlight;
pub mod index;
pub mod keys;
pub mod log;
pub mod query;
pub mod sensitive;
pub mod settings;
pub mod strategy;
pub mod tokenizer;

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;

use crate::audit::AuditSink;
use crate::background::BackgroundTasks;
use crate::cache::CompositeCache;
use crate::config::SearchSettings;

pub use admin::IndexAdmin;
pub use engine::{RecommendedNote, SearchEngine, SearchHit, SearchPage};
pub use index::{IndexStatus, RebuildReport, SearchIndex};
pub use log::SearchLogRecorder;
pub use query::{SearchQuery, SearchRequest, SortBy, TimeRange};
pub use sensitive::{Clock, SensitiveWordGate, SystemClock};
pub use settings::SearchConfigStore;
pub use strategy::{FallbackSearch, IndexedSearch, RetrievalStrategy};

/// Wired search components sharing one cache and word list / 组装好的搜索组件
pub struct SearchStack {
    pub cache: Arc<CompositeCache>,
    pub engine: Arc<SearchEngine>,
    pub admin: Arc<IndexAdmin>,
    pub tasks: BackgroundTasks,
    pub log_worker: JoinHandle<()>,
}

/// Build engine and admin over shared state / 构建搜索组件
///
/// Spawns the search log worker, so it must run inside a tokio runtime.
pub fn build_stack(
    db: SqlitePool,
    timeout: Duration,
    cache: Arc<CompositeCache>,
    audit: Arc<dyn AuditSink>,
    settings: &SearchSettings,
) -> SearchStack {
    let gate = Arc::new(SensitiveWordGate::new(
        db.clone(),
        timeout,
        Duration::from_secs(settings.sensitive_refresh_secs),
    ));
    let index = Arc::new(SearchIndex::new(db.clone(), timeout));
    let config_store = Arc::new(SearchConfigStore::new(db.clone(), timeout));
    let (log, log_worker) = SearchLogRecorder::spawn(db.clone(), timeout, settings.log_queue_capacity);
    let tasks = BackgroundTasks::new();

    let engine = Arc::new(SearchEngine::new(
        db.clone(),
        timeout,
        cache.clone(),
        gate.clone(),
        index.clone(),
        config_store.clone(),
        log,
        settings.clone(),
    ));
    let admin = Arc::new(IndexAdmin::new(
        db,
        timeout,
        cache.clone(),
        gate,
        index,
        config_store,
        audit,
        tasks.clone(),
    ));

    SearchStack {
        cache,
        engine,
        admin,
        tasks,
        log_worker,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::audit::SqliteAuditSink;
    use crate::cache::LocalBackend;
    use crate::testutil::TestDb;

    /// Local-only stack over a test database / 测试用搜索组件
    pub fn stack(db: &TestDb) -> SearchStack {
        let cache = Arc::new(CompositeCache::local_only(Arc::new(LocalBackend::new())));
        stack_with_cache(db, cache)
    }

    pub fn stack_with_cache(db: &TestDb, cache: Arc<CompositeCache>) -> SearchStack {
        let timeout = Duration::from_secs(5);
        let audit = Arc::new(SqliteAuditSink::new(db.pool.clone(), timeout));
        build_stack(db.pool.clone(), timeout, cache, audit, &SearchSettings::default())
    }
}
