//! Database bootstrap and store-call helpers / 数据库初始化与调用辅助

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::error::{SearchError, SearchResult};

/// Open a pooled connection to the main database (WAL mode) / 打开主数据库连接池
pub async fn connect(database_url: &str, max_connections: u32, timeout: Duration) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(timeout)
        .connect_with(options)
        .await?;

    tracing::info!("Database connected: {} (WAL mode)", database_url);
    Ok(pool)
}

/// Run database migrations / 运行数据库迁移
///
/// The FTS mirror `search_index` is intentionally not created here: it only
/// exists as the product of a full rebuild.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            category_id INTEGER,
            status TEXT NOT NULL DEFAULT 'active',
            view_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_config (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            suggest_count INTEGER NOT NULL,
            title_weight REAL NOT NULL,
            content_weight REAL NOT NULL,
            enable_suggest INTEGER NOT NULL,
            enable_trending INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensitive_words (
            word TEXT PRIMARY KEY COLLATE NOCASE,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blocked_notes (
            note_id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            blocked_by TEXT NOT NULL,
            blocked_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_logs (
            keyword TEXT PRIMARY KEY,
            search_count INTEGER NOT NULL DEFAULT 0,
            last_searched_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS admin_action_logs (
            id TEXT PRIMARY KEY,
            actor_id TEXT NOT NULL,
            action TEXT NOT NULL,
            target_id TEXT,
            metadata TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_search_logs_last ON search_logs(last_searched_at)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Run a store call under a deadline / 带超时执行数据库调用
///
/// Elapsed deadlines map to [`SearchError::Timeout`] and an unreachable
/// pool to [`SearchError::Upstream`]; callers treat both as backend failures.
pub async fn timed<T, F>(limit: Duration, fut: F) -> SearchResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Err(e @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)))) => {
            Err(SearchError::Upstream(e.to_string()))
        }
        Ok(result) => result.map_err(SearchError::from),
        Err(_) => Err(SearchError::Timeout(limit)),
    }
}

/// Kind of schema object in `sqlite_master` / 数据库对象类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaObject {
    Table,
    Index,
}

impl SchemaObject {
    fn as_str(&self) -> &'static str {
        match self {
            SchemaObject::Table => "table",
            SchemaObject::Index => "index",
        }
    }
}

/// Whether a schema object of this kind and name exists / 检查表或索引是否存在
pub async fn object_exists(pool: &SqlitePool, kind: SchemaObject, name: &str, limit: Duration) -> SearchResult<bool> {
    let count: i64 = timed(
        limit,
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sqlite_master WHERE type = ? AND name = ?")
            .bind(kind.as_str())
            .bind(name)
            .fetch_one(pool),
    )
    .await?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("m.db").to_string_lossy());
        let pool = connect(&url, 2, Duration::from_secs(5)).await.unwrap();

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let limit = Duration::from_secs(1);
        assert!(object_exists(&pool, SchemaObject::Table, "notes", limit).await.unwrap());
        assert!(object_exists(&pool, SchemaObject::Table, "sensitive_words", limit).await.unwrap());
        assert!(!object_exists(&pool, SchemaObject::Table, "search_index", limit).await.unwrap());
        assert!(object_exists(&pool, SchemaObject::Index, "idx_search_logs_last", limit).await.unwrap());
        assert!(!object_exists(&pool, SchemaObject::Index, "notes", limit).await.unwrap());
    }

    #[tokio::test]
    async fn test_timed_maps_elapsed_deadline() {
        let result: SearchResult<()> = timed(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(SearchError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_closed_pool_is_upstream() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("c.db").to_string_lossy());
        let pool = connect(&url, 1, Duration::from_secs(1)).await.unwrap();
        pool.close().await;

        let result = object_exists(&pool, SchemaObject::Table, "notes", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(SearchError::Upstream(_))));
        assert!(result.unwrap_err().is_upstream());
    }
}
