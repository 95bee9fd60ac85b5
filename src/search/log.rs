//! Search keyword log / 搜索日志
//!
//! The request path only enqueues; a single background worker owns the
//! writes. A full queue drops the record.

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::db::timed;
use crate::error::SearchResult;

/// Longest keyword kept in the log / 记录的关键词最大长度
const MAX_LOGGED_CHARS: usize = 100;

/// Producer side of the search log / 搜索日志生产端
#[derive(Clone)]
pub struct SearchLogRecorder {
    tx: mpsc::Sender<String>,
}

impl SearchLogRecorder {
    /// Create the queue and start its worker / 创建队列并启动写入任务
    ///
    /// The worker exits once every recorder clone is dropped and the queue
    /// is drained.
    pub fn spawn(db: SqlitePool, timeout: Duration, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(db, timeout, rx));
        (Self { tx }, handle)
    }

    /// Enqueue one occurrence without waiting / 非阻塞记录一次搜索
    pub fn record(&self, keyword: &str) -> bool {
        let keyword: String = keyword.trim().to_lowercase().chars().take(MAX_LOGGED_CHARS).collect();
        if keyword.is_empty() {
            return false;
        }
        match self.tx.try_send(keyword) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(keyword)) => {
                tracing::warn!("Search log queue full, dropping keyword: {}", keyword);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Search log worker stopped, keyword not recorded");
                false
            }
        }
    }
}

async fn run_worker(db: SqlitePool, timeout: Duration, mut rx: mpsc::Receiver<String>) {
    tracing::debug!("Search log worker started");
    while let Some(keyword) = rx.recv().await {
        if let Err(e) = upsert_keyword(&db, timeout, &keyword).await {
            tracing::error!("Failed to record search keyword {}: {}", keyword, e);
        }
    }
    tracing::debug!("Search log worker stopped");
}

async fn upsert_keyword(db: &SqlitePool, timeout: Duration, keyword: &str) -> SearchResult<()> {
    timed(
        timeout,
        sqlx::query(
            r#"
            INSERT INTO search_logs (keyword, search_count, last_searched_at) VALUES (?, 1, ?)
            ON CONFLICT(keyword) DO UPDATE SET
                search_count = search_count + 1,
                last_searched_at = excluded.last_searched_at
            "#,
        )
        .bind(keyword)
        .bind(Utc::now().to_rfc3339())
        .execute(db),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestDb;

    async fn count_for(db: &TestDb, keyword: &str) -> Option<i64> {
        sqlx::query_scalar("SELECT search_count FROM search_logs WHERE keyword = ?")
            .bind(keyword)
            .fetch_optional(&db.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_worker_upserts_counts() {
        let db = TestDb::new().await;
        let (recorder, handle) = SearchLogRecorder::spawn(db.pool.clone(), Duration::from_secs(5), 16);

        assert!(recorder.record("Rust"));
        assert!(recorder.record("rust "));
        assert!(recorder.record("pasta"));
        assert!(!recorder.record("   "));

        drop(recorder);
        handle.await.unwrap();

        assert_eq!(count_for(&db, "rust").await, Some(2));
        assert_eq!(count_for(&db, "pasta").await, Some(1));
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let db = TestDb::new().await;
        let (tx, _rx) = mpsc::channel(1);
        let recorder = SearchLogRecorder { tx };

        assert!(recorder.record("first"));
        assert!(!recorder.record("second"));
        assert_eq!(count_for(&db, "first").await, None);
    }
}
