use std::sync::Arc;

use sqlx::SqlitePool;
use notehub_backend::background::BackgroundTasks;
use notehub_backend::cache::CompositeCache;
use notehub_backend::search::{IndexAdmin, SearchEngine};

pub struct AppState {
    pub db: SqlitePool,
    pub cache: Arc<CompositeCache>,
    pub engine: Arc<SearchEngine>,
    pub admin: Arc<IndexAdmin>,
    /// Detached invalidations and audit writes, drained on shutdown / 后台任务
    pub tasks: BackgroundTasks,
}
