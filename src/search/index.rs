//! Search index lifecycle / 搜索索引生命周期
//!
//! The mirror table `search_index` is an FTS5 table holding pre-segmented
//! copies of every active note. It is never patched incrementally: a
//! rebuild drops and repopulates it wholesale.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::tokenizer::segment_for_index;
use crate::db::{object_exists, timed, SchemaObject};
use crate::error::{SearchError, SearchResult};
use crate::models::NOTE_STATUS_ACTIVE;

/// Mirror table name / 镜像表名
pub const MIRROR_TABLE: &str = "search_index";
/// Structural key on the source table / 源表上的结构索引
pub const STRUCTURAL_KEY: &str = "idx_notes_search_key";

/// Notes read and inserted per transaction / 每批处理的笔记数
const BATCH_SIZE: i64 = 500;
const MAX_RETRIES: u32 = 3;

/// Index health report / 索引状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub index_exists: bool,
    pub indexed_count: i64,
    pub total_active_documents: i64,
    /// Percentage with two decimals, e.g. "100.00" / 覆盖率
    pub index_coverage: String,
}

impl IndexStatus {
    pub fn new(index_exists: bool, indexed_count: i64, total_active_documents: i64) -> Self {
        let coverage = indexed_count as f64 / total_active_documents.max(1) as f64 * 100.0;
        Self {
            index_exists,
            indexed_count,
            total_active_documents,
            index_coverage: format!("{:.2}", coverage),
        }
    }
}

/// Outcome of a rebuild / 重建结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RebuildReport {
    pub indexed: u64,
    /// Structural key steps that failed (logged, not fatal) / 失败的非关键步骤
    pub warnings: Vec<String>,
}

#[derive(sqlx::FromRow)]
struct MirrorSource {
    id: i64,
    title: String,
    content: String,
    updated_at: String,
}

fn is_busy(error: &SearchError) -> bool {
    let message = error.to_string();
    message.contains("database is locked") || message.contains("SQLITE_BUSY")
}

/// Denormalized mirror of searchable notes / 可检索笔记的镜像
pub struct SearchIndex {
    db: SqlitePool,
    timeout: Duration,
    /// Serializes rebuilds / 重建互斥
    rebuild_lock: tokio::sync::Mutex<()>,
}

impl SearchIndex {
    pub fn new(db: SqlitePool, timeout: Duration) -> Self {
        Self {
            db,
            timeout,
            rebuild_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Full rebuild / 全量重建
    ///
    /// 1. drop the structural key (best effort)
    /// 2. drop and recreate the mirror table
    /// 3. copy every active note into it
    /// 4. recreate the structural key (best effort)
    ///
    /// Only steps 2 and 3 can fail the call.
    pub async fn rebuild(&self) -> SearchResult<RebuildReport> {
        let _guard = self.rebuild_lock.lock().await;
        let mut report = RebuildReport::default();
        tracing::info!("Search index rebuild started");

        // Step 1 / 删除结构索引
        let drop_key = format!("DROP INDEX IF EXISTS {}", STRUCTURAL_KEY);
        if let Err(e) = timed(self.timeout, sqlx::query(&drop_key).execute(&self.db)).await {
            tracing::warn!("Rebuild step 1: failed to drop structural key: {}", e);
            report.warnings.push(format!("drop structural key: {}", e));
        }

        // Step 2 / 重建镜像表
        self.recreate_mirror()
            .await
            .map_err(|e| SearchError::IndexInconsistent(format!("mirror table could not be created: {}", e)))?;
        tracing::info!("Rebuild step 2: mirror table recreated");

        // Step 3 / 复制数据
        report.indexed = self
            .populate_mirror()
            .await
            .map_err(|e| SearchError::IndexInconsistent(format!("mirror copy failed: {}", e)))?;
        tracing::info!("Rebuild step 3: {} notes copied into mirror", report.indexed);

        // Step 4 / 重建结构索引
        if let Err(e) = self.create_structural_key().await {
            tracing::warn!("Rebuild step 4: failed to create structural key, searches will use fallback: {}", e);
            report.warnings.push(format!("create structural key: {}", e));
        }

        tracing::info!(
            "Search index rebuild finished: indexed={}, warnings={}",
            report.indexed,
            report.warnings.len()
        );
        Ok(report)
    }

    async fn recreate_mirror(&self) -> SearchResult<()> {
        let drop_table = format!("DROP TABLE IF EXISTS {}", MIRROR_TABLE);
        timed(self.timeout, sqlx::query(&drop_table).execute(&self.db)).await?;

        let create_table = format!(
            "CREATE VIRTUAL TABLE {} USING fts5(note_id UNINDEXED, title, content, updated_at UNINDEXED)",
            MIRROR_TABLE
        );
        timed(self.timeout, sqlx::query(&create_table).execute(&self.db)).await?;
        Ok(())
    }

    pub(crate) async fn create_structural_key(&self) -> SearchResult<()> {
        let create_key = format!(
            "CREATE INDEX IF NOT EXISTS {} ON notes(status, created_at, view_count)",
            STRUCTURAL_KEY
        );
        timed(self.timeout, sqlx::query(&create_key).execute(&self.db)).await?;
        Ok(())
    }

    /// Keyset-paged copy of active notes / 分批复制活跃笔记
    async fn populate_mirror(&self) -> SearchResult<u64> {
        let mut last_id = 0i64;
        let mut copied = 0u64;

        loop {
            let batch: Vec<MirrorSource> = timed(
                self.timeout,
                sqlx::query_as::<_, MirrorSource>(
                    "SELECT id, title, content, updated_at FROM notes WHERE status = ? AND id > ? ORDER BY id LIMIT ?",
                )
                .bind(NOTE_STATUS_ACTIVE)
                .bind(last_id)
                .bind(BATCH_SIZE)
                .fetch_all(&self.db),
            )
            .await?;

            let Some(last) = batch.last() else {
                break;
            };
            last_id = last.id;

            self.insert_batch(&batch).await?;
            copied += batch.len() as u64;
            tracing::debug!("Mirror batch inserted: {} notes (total {})", batch.len(), copied);
        }

        Ok(copied)
    }

    /// Insert one batch, retrying while the database is locked / 带重试的批量插入
    async fn insert_batch(&self, batch: &[MirrorSource]) -> SearchResult<()> {
        let mut attempt = 0;
        loop {
            match self.do_insert_batch(batch).await {
                Ok(()) => return Ok(()),
                Err(e) if is_busy(&e) && attempt + 1 < MAX_RETRIES => {
                    attempt += 1;
                    let delay = 100 * attempt as u64;
                    tracing::debug!("Database locked, retrying in {}ms (attempt {}/{})", delay, attempt, MAX_RETRIES);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn do_insert_batch(&self, batch: &[MirrorSource]) -> SearchResult<()> {
        let insert = format!(
            "INSERT INTO {} (note_id, title, content, updated_at) VALUES (?, ?, ?, ?)",
            MIRROR_TABLE
        );
        let mut tx = timed(self.timeout, self.db.begin()).await?;
        for note in batch {
            timed(
                self.timeout,
                sqlx::query(&insert)
                    .bind(note.id)
                    .bind(segment_for_index(&note.title))
                    .bind(segment_for_index(&note.content))
                    .bind(&note.updated_at)
                    .execute(&mut *tx),
            )
            .await?;
        }
        timed(self.timeout, tx.commit()).await?;
        Ok(())
    }

    /// Current index health / 当前索引状态
    pub async fn status(&self) -> SearchResult<IndexStatus> {
        let mirror_exists = object_exists(&self.db, SchemaObject::Table, MIRROR_TABLE, self.timeout).await?;
        let key_exists = object_exists(&self.db, SchemaObject::Index, STRUCTURAL_KEY, self.timeout).await?;

        let indexed_count = if mirror_exists {
            let count = format!("SELECT COUNT(*) FROM {}", MIRROR_TABLE);
            timed(self.timeout, sqlx::query_scalar::<_, i64>(&count).fetch_one(&self.db)).await?
        } else {
            0
        };

        let total_active: i64 = timed(
            self.timeout,
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notes WHERE status = ?")
                .bind(NOTE_STATUS_ACTIVE)
                .fetch_one(&self.db),
        )
        .await?;

        Ok(IndexStatus::new(mirror_exists && key_exists, indexed_count, total_active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestDb;

    #[test]
    fn test_coverage_formatting() {
        assert_eq!(IndexStatus::new(true, 3, 3).index_coverage, "100.00");
        assert_eq!(IndexStatus::new(true, 1, 3).index_coverage, "33.33");
        assert_eq!(IndexStatus::new(false, 0, 0).index_coverage, "0.00");
    }

    #[tokio::test]
    async fn test_status_before_first_rebuild() {
        let db = TestDb::new().await;
        db.insert_note("Rust ownership basics", "memory", None).await;

        let status = SearchIndex::new(db.pool.clone(), Duration::from_secs(5)).status().await.unwrap();
        assert!(!status.index_exists);
        assert_eq!(status.indexed_count, 0);
        assert_eq!(status.total_active_documents, 1);
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let db = TestDb::new().await;
        db.insert_note("Rust ownership basics", "moves and borrows", None).await;
        db.insert_note("Rust borrowing rules", "shared xor mutable", None).await;
        let draft = db.insert_note("Draft", "unfinished", None).await;
        db.set_status(draft, "draft").await;

        let index = SearchIndex::new(db.pool.clone(), Duration::from_secs(5));
        for _ in 0..2 {
            let report = index.rebuild().await.unwrap();
            assert_eq!(report.indexed, 2);
            assert!(report.warnings.is_empty());

            let status = index.status().await.unwrap();
            assert!(status.index_exists);
            assert_eq!(status.indexed_count, 2);
            assert_eq!(status.total_active_documents, 2);
            assert_eq!(status.index_coverage, "100.00");
        }
    }

    #[tokio::test]
    async fn test_rebuild_spans_multiple_batches() {
        let db = TestDb::new().await;
        for i in 0..(BATCH_SIZE + 7) {
            db.insert_note(&format!("note {}", i), "body", None).await;
        }

        let index = SearchIndex::new(db.pool.clone(), Duration::from_secs(30));
        let report = index.rebuild().await.unwrap();
        assert_eq!(report.indexed, (BATCH_SIZE + 7) as u64);
    }

    #[tokio::test]
    async fn test_missing_structural_key_reports_absent() {
        let db = TestDb::new().await;
        db.insert_note("Cooking pasta", "boil water", None).await;

        let index = SearchIndex::new(db.pool.clone(), Duration::from_secs(5));
        index.rebuild().await.unwrap();
        sqlx::query("DROP INDEX idx_notes_search_key").execute(&db.pool).await.unwrap();

        let status = index.status().await.unwrap();
        assert!(!status.index_exists);
        assert_eq!(status.indexed_count, 1);
    }

    #[tokio::test]
    async fn test_failed_structural_key_step_degrades_to_fallback() {
        use crate::search::query::{SearchQuery, SearchRequest};
        use crate::search::strategy::{choose_strategy, StrategyKind};

        let db = TestDb::new().await;
        db.insert_note("Cooking pasta", "boil water", None).await;
        // Occupies the key's name so step 4 cannot create it
        sqlx::query("CREATE VIEW idx_notes_search_key AS SELECT id FROM notes")
            .execute(&db.pool)
            .await
            .unwrap();

        let index = SearchIndex::new(db.pool.clone(), Duration::from_secs(5));
        let report = index.rebuild().await.unwrap();
        assert_eq!(report.indexed, 1);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("create structural key"));

        let status = index.status().await.unwrap();
        assert!(!status.index_exists);
        assert_eq!(status.indexed_count, 1);

        let query = SearchQuery::normalize(&SearchRequest::new("pasta"), 50, true).unwrap();
        assert_eq!(choose_strategy(Some(&status), &query), StrategyKind::Fallback);
    }

    #[tokio::test]
    async fn test_rebuild_gives_up_while_store_is_locked() {
        let db = TestDb::new().await;
        db.insert_note("Cooking pasta", "boil water", None).await;

        let mut writer = db.pool.acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *writer).await.unwrap();
        sqlx::query("UPDATE notes SET view_count = 1").execute(&mut *writer).await.unwrap();

        let index = SearchIndex::new(db.pool.clone(), Duration::from_millis(200));
        let result = tokio::time::timeout(Duration::from_secs(5), index.rebuild())
            .await
            .expect("rebuild must not hang on a locked store");
        assert!(matches!(result, Err(SearchError::IndexInconsistent(_))));

        sqlx::query("ROLLBACK").execute(&mut *writer).await.unwrap();
    }

    #[tokio::test]
    async fn test_mirror_is_segmented() {
        let db = TestDb::new().await;
        db.insert_note("中华人民共和国", "Hello World", None).await;

        let index = SearchIndex::new(db.pool.clone(), Duration::from_secs(5));
        index.rebuild().await.unwrap();

        let hits: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_index WHERE search_index MATCH '\"中华\"'")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(hits, 1);
        let content: String = sqlx::query_scalar("SELECT content FROM search_index")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(content, "hello world");
    }
}
