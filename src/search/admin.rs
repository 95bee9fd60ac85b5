//! Administrative search surface / 搜索管理
//!
//! Every mutation invalidates the derived cache families it affects and
//! records an audit entry. Both happen in the background; `settle()` waits
//! for them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use super::index::{IndexStatus, RebuildReport, SearchIndex};
use super::keys;
use super::sensitive::SensitiveWordGate;
use super::settings::SearchConfigStore;
use crate::audit::{Actor, AuditSink};
use crate::background::BackgroundTasks;
use crate::cache::CompositeCache;
use crate::db::timed;
use crate::error::{SearchError, SearchResult};
use crate::models::{BlockedNote, SearchConfig, SearchConfigUpdate, SensitiveWord};

/// Families affected by a change in what is searchable / 可检索内容变化时失效
const CONTENT_PATTERNS: &[&str] = &[keys::RESULT_PATTERN, keys::SUGGEST_PATTERN, keys::STATUS_KEY];
/// Families affected by a word list change / 敏感词变化时失效
const WORD_PATTERNS: &[&str] = &[keys::RESULT_PATTERN, keys::SUGGEST_PATTERN, keys::TRENDING_PATTERN];
/// Families affected by a config change / 配置变化时失效
const CONFIG_PATTERNS: &[&str] = &[
    keys::CONFIG_KEY,
    keys::RESULT_PATTERN,
    keys::SUGGEST_PATTERN,
    keys::TRENDING_PATTERN,
];

pub struct IndexAdmin {
    db: SqlitePool,
    timeout: Duration,
    cache: Arc<CompositeCache>,
    gate: Arc<SensitiveWordGate>,
    index: Arc<SearchIndex>,
    config_store: Arc<SearchConfigStore>,
    audit: Arc<dyn AuditSink>,
    tasks: BackgroundTasks,
}

impl IndexAdmin {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: SqlitePool,
        timeout: Duration,
        cache: Arc<CompositeCache>,
        gate: Arc<SensitiveWordGate>,
        index: Arc<SearchIndex>,
        config_store: Arc<SearchConfigStore>,
        audit: Arc<dyn AuditSink>,
        tasks: BackgroundTasks,
    ) -> Self {
        Self {
            db,
            timeout,
            cache,
            gate,
            index,
            config_store,
            audit,
            tasks,
        }
    }

    /// Wait for background invalidations and audit writes / 等待后台任务
    pub async fn settle(&self) {
        self.tasks.settle().await;
    }

    fn audit(&self, actor: &Actor, action: &'static str, target_id: Option<String>, metadata: Value) {
        let sink = self.audit.clone();
        let actor_id = actor.id.clone();
        self.tasks.spawn(async move {
            if let Err(e) = sink.record(&actor_id, action, target_id.as_deref(), metadata).await {
                tracing::error!("Failed to write audit record: actor={}, action={}, error={}", actor_id, action, e);
            }
        });
    }

    fn invalidate_detached(&self, patterns: &'static [&'static str]) {
        let cache = self.cache.clone();
        self.tasks.spawn(async move {
            for pattern in patterns {
                cache.delete_by_pattern(pattern).await;
            }
        });
    }

    async fn clear_all(&self) -> usize {
        let mut removed = 0;
        for pattern in keys::ALL_PATTERNS {
            removed += self.cache.delete_by_pattern(pattern).await;
        }
        removed
    }

    /// Rebuild the mirror, then drop every derived cache entry / 重建索引
    pub async fn rebuild_index(&self, actor: &Actor) -> SearchResult<RebuildReport> {
        tracing::info!("Index rebuild requested by {}", actor.id);
        let result = self.index.rebuild().await;
        // The mirror changed (or vanished) either way
        self.clear_all().await;

        match &result {
            Ok(report) => self.audit(
                actor,
                "search.index.rebuild",
                None,
                json!({ "indexed": report.indexed, "warnings": report.warnings }),
            ),
            Err(e) => {
                tracing::error!("Index rebuild failed: {}", e);
                self.audit(actor, "search.index.rebuild", None, json!({ "error": e.to_string() }));
            }
        }
        result
    }

    /// Fresh index health report / 索引状态
    pub async fn index_status(&self) -> SearchResult<IndexStatus> {
        self.index.status().await
    }

    /// Drop results, config, status, trending and suggestions / 清空搜索缓存
    pub async fn clear_cache(&self, actor: &Actor) -> usize {
        let removed = self.clear_all().await;
        tracing::info!("Search cache cleared by {}: {} keys", actor.id, removed);
        self.audit(actor, "search.cache.clear", None, json!({ "removed": removed }));
        removed
    }

    pub async fn get_config(&self) -> SearchResult<SearchConfig> {
        self.config_store.load().await
    }

    /// Validate and save a partial config update / 更新搜索配置
    pub async fn update_config(&self, actor: &Actor, update: &SearchConfigUpdate) -> SearchResult<SearchConfig> {
        let saved = self.config_store.update(update).await?;
        tracing::info!("Search config updated by {}: {:?}", actor.id, saved);
        self.invalidate_detached(CONFIG_PATTERNS);
        self.audit(actor, "search.config.update", None, json!({ "update": update, "config": saved }));
        Ok(saved)
    }

    pub async fn list_sensitive_words(&self) -> SearchResult<Vec<SensitiveWord>> {
        self.gate.list().await
    }

    /// Add a sensitive word; false when already present / 添加敏感词
    pub async fn add_sensitive_word(&self, actor: &Actor, word: &str) -> SearchResult<bool> {
        let added = self.gate.add(word).await?;
        if added {
            self.invalidate_detached(WORD_PATTERNS);
            self.audit(actor, "search.sensitive_word.add", Some(word.trim().to_lowercase()), json!({}));
        }
        Ok(added)
    }

    /// Remove a sensitive word; false when absent / 删除敏感词
    pub async fn remove_sensitive_word(&self, actor: &Actor, word: &str) -> SearchResult<bool> {
        let removed = self.gate.remove(word).await?;
        if removed {
            self.invalidate_detached(WORD_PATTERNS);
            self.audit(actor, "search.sensitive_word.remove", Some(word.trim().to_lowercase()), json!({}));
        }
        Ok(removed)
    }

    pub async fn list_blocked_notes(&self) -> SearchResult<Vec<BlockedNote>> {
        timed(
            self.timeout,
            sqlx::query_as::<_, BlockedNote>(
                "SELECT note_id, title, blocked_by, blocked_at FROM blocked_notes ORDER BY blocked_at DESC, note_id DESC",
            )
            .fetch_all(&self.db),
        )
        .await
    }

    /// Exclude a note from every search strategy / 屏蔽笔记
    pub async fn block_note(&self, actor: &Actor, note_id: i64) -> SearchResult<BlockedNote> {
        let title: Option<String> = timed(
            self.timeout,
            sqlx::query_scalar::<_, String>("SELECT title FROM notes WHERE id = ?")
                .bind(note_id)
                .fetch_optional(&self.db),
        )
        .await?;
        let Some(title) = title else {
            return Err(SearchError::validation(format!("笔记不存在 / note {} not found", note_id)));
        };

        timed(
            self.timeout,
            sqlx::query(
                "INSERT INTO blocked_notes (note_id, title, blocked_by, blocked_at) VALUES (?, ?, ?, ?) ON CONFLICT(note_id) DO NOTHING",
            )
            .bind(note_id)
            .bind(&title)
            .bind(&actor.id)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.db),
        )
        .await?;

        let blocked = timed(
            self.timeout,
            sqlx::query_as::<_, BlockedNote>(
                "SELECT note_id, title, blocked_by, blocked_at FROM blocked_notes WHERE note_id = ?",
            )
            .bind(note_id)
            .fetch_one(&self.db),
        )
        .await?;

        self.invalidate_detached(CONTENT_PATTERNS);
        self.audit(actor, "search.note.block", Some(note_id.to_string()), json!({ "title": title }));
        Ok(blocked)
    }

    /// Make a blocked note searchable again; false when not blocked / 取消屏蔽
    pub async fn unblock_note(&self, actor: &Actor, note_id: i64) -> SearchResult<bool> {
        let result = timed(
            self.timeout,
            sqlx::query("DELETE FROM blocked_notes WHERE note_id = ?")
                .bind(note_id)
                .execute(&self.db),
        )
        .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            self.invalidate_detached(CONTENT_PATTERNS);
            self.audit(actor, "search.note.unblock", Some(note_id.to_string()), json!({}));
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::query::SearchRequest;
    use crate::search::testing::stack;
    use crate::testutil::TestDb;

    async fn audit_actions(db: &TestDb) -> Vec<String> {
        sqlx::query_scalar("SELECT action FROM admin_action_logs ORDER BY created_at, action")
            .fetch_all(&db.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_mutations_are_audited() {
        let db = TestDb::new().await;
        let note = db.insert_note("Rust ownership basics", "", None).await;
        let s = stack(&db);
        let actor = Actor::new("admin-7");

        s.admin.rebuild_index(&actor).await.unwrap();
        s.admin.add_sensitive_word(&actor, "spam").await.unwrap();
        s.admin.block_note(&actor, note).await.unwrap();
        s.admin.unblock_note(&actor, note).await.unwrap();
        s.admin.clear_cache(&actor).await;
        s.admin.settle().await;

        let mut actions = audit_actions(&db).await;
        actions.sort();
        assert_eq!(
            actions,
            vec![
                "search.cache.clear",
                "search.index.rebuild",
                "search.note.block",
                "search.note.unblock",
                "search.sensitive_word.add",
            ]
        );
        let actors: Vec<String> = sqlx::query_scalar("SELECT DISTINCT actor_id FROM admin_action_logs")
            .fetch_all(&db.pool)
            .await
            .unwrap();
        assert_eq!(actors, vec!["admin-7".to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_config_is_not_audited() {
        let db = TestDb::new().await;
        let s = stack(&db);
        let update = SearchConfigUpdate { title_weight: Some(0.2), ..Default::default() };

        assert!(matches!(
            s.admin.update_config(&Actor::new("a"), &update).await,
            Err(SearchError::Validation(_))
        ));
        s.admin.settle().await;
        assert!(audit_actions(&db).await.is_empty());
        assert_eq!(s.admin.get_config().await.unwrap(), SearchConfig::default());
    }

    #[tokio::test]
    async fn test_config_update_reaches_engine() {
        let db = TestDb::new().await;
        let s = stack(&db);
        assert_eq!(s.engine.config().await.suggest_count, 10);

        let update = SearchConfigUpdate { suggest_count: Some(3), title_weight: Some(2.0), ..Default::default() };
        s.admin.update_config(&Actor::new("a"), &update).await.unwrap();
        s.admin.settle().await;

        let config = s.engine.config().await;
        assert_eq!(config.suggest_count, 3);
        assert!(config.uses_weighted_scoring());
    }

    #[tokio::test]
    async fn test_clear_cache_removes_every_family() {
        let db = TestDb::new().await;
        db.insert_note("Rust", "", None).await;
        let s = stack(&db);

        s.engine.search(&SearchRequest::new("rust")).await.unwrap();
        s.engine.trending(5).await;
        s.engine.suggest("ru").await;
        assert!(s.cache.local().len() >= 5);

        let removed = s.admin.clear_cache(&Actor::new("a")).await;
        assert!(removed >= 5);
        assert!(s.cache.local().is_empty());
    }

    #[tokio::test]
    async fn test_block_unknown_note() {
        let db = TestDb::new().await;
        let s = stack(&db);
        let actor = Actor::new("a");

        assert!(matches!(s.admin.block_note(&actor, 404).await, Err(SearchError::Validation(_))));
        assert!(!s.admin.unblock_note(&actor, 404).await.unwrap());
    }

    #[tokio::test]
    async fn test_block_is_idempotent_and_listed() {
        let db = TestDb::new().await;
        let note = db.insert_note("Hidden gem", "", None).await;
        let s = stack(&db);

        let first = s.admin.block_note(&Actor::new("first"), note).await.unwrap();
        let second = s.admin.block_note(&Actor::new("second"), note).await.unwrap();
        assert_eq!(first.blocked_by, "first");
        assert_eq!(second.blocked_by, "first");

        let listed = s.admin.list_blocked_notes().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Hidden gem");
    }

    #[tokio::test]
    async fn test_sensitive_word_admin_round_trip() {
        let db = TestDb::new().await;
        let s = stack(&db);
        let actor = Actor::new("a");

        assert!(s.admin.add_sensitive_word(&actor, " Gamble ").await.unwrap());
        assert!(!s.admin.add_sensitive_word(&actor, "gamble").await.unwrap());
        let words = s.admin.list_sensitive_words().await.unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "gamble");

        assert!(s.admin.remove_sensitive_word(&actor, "GAMBLE").await.unwrap());
        assert!(s.admin.list_sensitive_words().await.unwrap().is_empty());
    }
}
