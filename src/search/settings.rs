//! Persisted search configuration / 搜索配置持久化

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::timed;
use crate::error::{SearchError, SearchResult};
use crate::models::{SearchConfig, SearchConfigUpdate};

/// Apply a partial update, rejecting out-of-range values / 合并并校验配置
pub fn merge_config(current: &SearchConfig, update: &SearchConfigUpdate) -> SearchResult<SearchConfig> {
    let merged = SearchConfig {
        suggest_count: update.suggest_count.unwrap_or(current.suggest_count),
        title_weight: update.title_weight.unwrap_or(current.title_weight),
        content_weight: update.content_weight.unwrap_or(current.content_weight),
        enable_suggest: update.enable_suggest.unwrap_or(current.enable_suggest),
        enable_trending: update.enable_trending.unwrap_or(current.enable_trending),
    };

    if !(SearchConfig::MIN_SUGGEST_COUNT..=SearchConfig::MAX_SUGGEST_COUNT).contains(&merged.suggest_count) {
        return Err(SearchError::validation(format!(
            "建议数量必须在 {}-{} 之间 / suggest_count must be within [{}, {}]",
            SearchConfig::MIN_SUGGEST_COUNT,
            SearchConfig::MAX_SUGGEST_COUNT,
            SearchConfig::MIN_SUGGEST_COUNT,
            SearchConfig::MAX_SUGGEST_COUNT
        )));
    }
    for (name, weight) in [("title_weight", merged.title_weight), ("content_weight", merged.content_weight)] {
        if !weight.is_finite() || weight < SearchConfig::NEUTRAL_WEIGHT {
            return Err(SearchError::validation(format!("权重不能小于 1 / {} must be >= 1", name)));
        }
    }

    Ok(merged)
}

/// Single-row `search_config` table / 单行配置表
pub struct SearchConfigStore {
    db: SqlitePool,
    timeout: Duration,
}

impl SearchConfigStore {
    pub fn new(db: SqlitePool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    /// Stored configuration, defaults when never saved / 读取配置
    pub async fn load(&self) -> SearchResult<SearchConfig> {
        let row = timed(
            self.timeout,
            sqlx::query_as::<_, SearchConfig>(
                "SELECT suggest_count, title_weight, content_weight, enable_suggest, enable_trending FROM search_config WHERE id = 1",
            )
            .fetch_optional(&self.db),
        )
        .await?;
        Ok(row.unwrap_or_default())
    }

    /// Validate and persist a partial update / 校验并保存
    pub async fn update(&self, update: &SearchConfigUpdate) -> SearchResult<SearchConfig> {
        let merged = merge_config(&self.load().await?, update)?;

        timed(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO search_config (id, suggest_count, title_weight, content_weight, enable_suggest, enable_trending, updated_at)
                VALUES (1, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    suggest_count = excluded.suggest_count,
                    title_weight = excluded.title_weight,
                    content_weight = excluded.content_weight,
                    enable_suggest = excluded.enable_suggest,
                    enable_trending = excluded.enable_trending,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(merged.suggest_count)
            .bind(merged.title_weight)
            .bind(merged.content_weight)
            .bind(merged.enable_suggest)
            .bind(merged.enable_trending)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.db),
        )
        .await?;

        Ok(merged)
    }
}
