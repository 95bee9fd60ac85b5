//! Store fixtures for tests / 测试用数据库夹具

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::db;

/// Migrated on-disk database in a temporary directory / 临时目录中的数据库
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").to_string_lossy());
        let pool = db::connect(&url, 4, Duration::from_secs(5)).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        Self { pool, _dir: dir }
    }

    pub async fn insert_note(&self, title: &str, content: &str, category_id: Option<i64>) -> i64 {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO notes (title, content, category_id, status, view_count, created_at, updated_at) VALUES (?, ?, ?, 'active', 0, ?, ?)",
        )
        .bind(title)
        .bind(content)
        .bind(category_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    pub async fn set_status(&self, note_id: i64, status: &str) {
        sqlx::query("UPDATE notes SET status = ? WHERE id = ?")
            .bind(status)
            .bind(note_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn set_view_count(&self, note_id: i64, view_count: i64) {
        sqlx::query("UPDATE notes SET view_count = ? WHERE id = ?")
            .bind(view_count)
            .bind(note_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn set_created_at(&self, note_id: i64, created_at: &str) {
        sqlx::query("UPDATE notes SET created_at = ? WHERE id = ?")
            .bind(created_at)
            .bind(note_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn block_note(&self, note_id: i64) {
        sqlx::query(
            "INSERT INTO blocked_notes (note_id, title, blocked_by, blocked_at) SELECT id, title, 'tester', ? FROM notes WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(note_id)
        .execute(&self.pool)
        .await
        .unwrap();
    }
}
