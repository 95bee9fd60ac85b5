//! Administrative audit sink / 管理操作审计
//!
//! Write-only collaborator: administrative calls hand records over in the
//! background and never fail because of the write.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::db::timed;
use crate::error::SearchResult;

/// Authenticated administrator performing an action / 执行操作的管理员
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, actor_id: &str, action: &str, target_id: Option<&str>, metadata: Value) -> SearchResult<()>;
}

/// Audit sink backed by `admin_action_logs` / 写入 admin_action_logs 表
pub struct SqliteAuditSink {
    db: SqlitePool,
    timeout: Duration,
}

impl SqliteAuditSink {
    pub fn new(db: SqlitePool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    async fn record(&self, actor_id: &str, action: &str, target_id: Option<&str>, metadata: Value) -> SearchResult<()> {
        timed(
            self.timeout,
            sqlx::query(
                "INSERT INTO admin_action_logs (id, actor_id, action, target_id, metadata, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(actor_id)
            .bind(action)
            .bind(target_id)
            .bind(metadata.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&self.db),
        )
        .await?;
        Ok(())
    }
}
