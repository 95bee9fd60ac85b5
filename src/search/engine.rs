//! Search engine - orchestrates a single search request / 搜索引擎
//!
//! Flow / 流程：
//! sanitize → sensitive gate → result cache → strategy choice → retrieval
//! → highlight/snippet → recommendations → cache → log
//!
//! Every failure after validation degrades: cache errors become misses,
//! indexed failures fall back to substring search, and a failing store
//! yields an empty page that is not cached.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::highlight::{build_snippet, highlight_title};
use super::index::{IndexStatus, SearchIndex};
use super::keys;
use super::log::SearchLogRecorder;
use super::query::{total_pages, SearchQuery, SearchRequest};
use super::sensitive::SensitiveWordGate;
use super::settings::SearchConfigStore;
use super::strategy::{choose_strategy, FallbackSearch, HitPage, IndexedSearch, RawHit, RetrievalStrategy, StrategyKind};
use crate::cache::CompositeCache;
use crate::config::SearchSettings;
use crate::db::timed;
use crate::error::SearchResult;
use crate::models::{SearchConfig, TrendingKeyword, NOTE_STATUS_ACTIVE};
use crate::utils::{escape_like, sanitize_keyword};

pub const MAX_TRENDING_LIMIT: i64 = 50;

/// One ranked, highlighted hit / 搜索结果条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    /// HTML-escaped, matches wrapped in `<mark>` / 高亮后的标题
    pub title: String,
    pub snippet: String,
    pub category_id: Option<i64>,
    pub view_count: i64,
    pub created_at: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecommendedNote {
    pub id: i64,
    pub title: String,
    pub view_count: i64,
    pub created_at: String,
}

/// Paginated search response / 分页搜索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub list: Vec<SearchHit>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub recommended_notes: Vec<RecommendedNote>,
}

/// Keep scores short so cached payloads decode to the same value / 分数保留四位小数
fn round_score(score: f64) -> f64 {
    if score.is_finite() {
        (score * 10_000.0).round() / 10_000.0
    } else {
        0.0
    }
}

fn to_hit(raw: RawHit, keyword: &str) -> SearchHit {
    SearchHit {
        id: raw.id,
        title: highlight_title(&raw.title, keyword),
        snippet: build_snippet(&raw.content, keyword),
        category_id: raw.category_id,
        view_count: raw.view_count,
        created_at: raw.created_at,
        score: round_score(raw.score),
    }
}

pub struct SearchEngine {
    db: SqlitePool,
    timeout: Duration,
    cache: Arc<CompositeCache>,
    gate: Arc<SensitiveWordGate>,
    index: Arc<SearchIndex>,
    config_store: Arc<SearchConfigStore>,
    log: SearchLogRecorder,
    indexed: IndexedSearch,
    fallback: FallbackSearch,
    settings: SearchSettings,
}

impl SearchEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: SqlitePool,
        timeout: Duration,
        cache: Arc<CompositeCache>,
        gate: Arc<SensitiveWordGate>,
        index: Arc<SearchIndex>,
        config_store: Arc<SearchConfigStore>,
        log: SearchLogRecorder,
        settings: SearchSettings,
    ) -> Self {
        Self {
            indexed: IndexedSearch::new(db.clone(), timeout),
            fallback: FallbackSearch::new(db.clone(), timeout),
            db,
            timeout,
            cache,
            gate,
            index,
            config_store,
            log,
            settings,
        }
    }

    fn strategy(&self, kind: StrategyKind) -> &dyn RetrievalStrategy {
        match kind {
            StrategyKind::Indexed => &self.indexed,
            StrategyKind::Fallback => &self.fallback,
        }
    }

    /// Search notes / 搜索笔记
    ///
    /// Only a blank keyword is an error. A keyword containing a sensitive
    /// word gets an ordinary empty page.
    pub async fn search(&self, request: &SearchRequest) -> SearchResult<SearchPage> {
        let query = SearchQuery::normalize(request, self.settings.max_page_size as i64, self.settings.use_index)?;

        if self.gate.contains(&query.keyword).await {
            return Ok(self.assemble(&query, HitPage::default()).await);
        }

        let key = query.cache_key();
        if let Some(page) = self.cache.get_json::<SearchPage>(&key).await {
            tracing::debug!("Search cache hit: keyword={}, page={}", query.keyword, query.page);
            self.log.record(&query.keyword);
            return Ok(page);
        }

        let config = self.config().await;
        let status = self.index_status().await;
        let kind = choose_strategy(status.as_ref(), &query);

        let Some(hits) = self.retrieve(kind, &query, &config).await else {
            return Ok(self.assemble(&query, HitPage::default()).await);
        };

        let page = self.assemble(&query, hits).await;
        self.cache.set_json(&key, &page, self.settings.result_ttl_secs as i64).await;
        self.log.record(&query.keyword);
        Ok(page)
    }

    /// Run the chosen strategy, degrading indexed → fallback / 执行检索并降级
    async fn retrieve(&self, kind: StrategyKind, query: &SearchQuery, config: &SearchConfig) -> Option<HitPage> {
        let strategy = self.strategy(kind);
        match strategy.execute(query, config).await {
            Ok(hits) => {
                tracing::debug!("Search via {}: keyword={}, total={}", strategy.name(), query.keyword, hits.total);
                return Some(hits);
            }
            Err(e) if kind == StrategyKind::Indexed => {
                tracing::warn!("Indexed search failed, falling back: keyword={}, error={}", query.keyword, e);
            }
            Err(e) => {
                tracing::error!("Search failed: keyword={}, error={}", query.keyword, e);
                return None;
            }
        }

        match self.fallback.execute(query, config).await {
            Ok(hits) => Some(hits),
            Err(e) => {
                tracing::error!("Fallback search failed: keyword={}, error={}", query.keyword, e);
                None
            }
        }
    }

    async fn assemble(&self, query: &SearchQuery, hits: HitPage) -> SearchPage {
        let recommended_notes = if hits.total == 0 {
            self.recommended().await
        } else {
            Vec::new()
        };

        SearchPage {
            list: hits.hits.into_iter().map(|raw| to_hit(raw, &query.keyword)).collect(),
            total: hits.total,
            page: query.page,
            page_size: query.page_size,
            total_pages: total_pages(hits.total, query.page_size),
            recommended_notes,
        }
    }

    /// Most-viewed active notes, independent of the keyword / 推荐笔记
    async fn recommended(&self) -> Vec<RecommendedNote> {
        let result = timed(
            self.timeout,
            sqlx::query_as::<_, RecommendedNote>(
                r#"
                SELECT n.id, n.title, n.view_count, n.created_at
                FROM notes n LEFT JOIN blocked_notes b ON b.note_id = n.id
                WHERE n.status = ? AND b.note_id IS NULL
                ORDER BY n.view_count DESC, n.created_at DESC, n.id DESC
                LIMIT ?
                "#,
            )
            .bind(NOTE_STATUS_ACTIVE)
            .bind(self.settings.recommend_count as i64)
            .fetch_all(&self.db),
        )
        .await;

        result.unwrap_or_else(|e| {
            tracing::warn!("Failed to load recommended notes: {}", e);
            Vec::new()
        })
    }

    /// Current search configuration, cached / 搜索配置（带缓存）
    pub async fn config(&self) -> SearchConfig {
        if let Some(config) = self.cache.get_json::<SearchConfig>(keys::CONFIG_KEY).await {
            return config;
        }
        match self.config_store.load().await {
            Ok(config) => {
                self.cache
                    .set_json(keys::CONFIG_KEY, &config, self.settings.config_ttl_secs as i64)
                    .await;
                config
            }
            Err(e) => {
                tracing::warn!("Failed to load search config, using defaults: {}", e);
                SearchConfig::default()
            }
        }
    }

    /// Index status, cached briefly; `None` when it cannot be read / 索引状态
    pub async fn index_status(&self) -> Option<IndexStatus> {
        if let Some(status) = self.cache.get_json::<IndexStatus>(keys::STATUS_KEY).await {
            return Some(status);
        }
        match self.index.status().await {
            Ok(status) => {
                self.cache
                    .set_json(keys::STATUS_KEY, &status, self.settings.status_ttl_secs as i64)
                    .await;
                Some(status)
            }
            Err(e) => {
                tracing::warn!("Failed to read index status, using fallback search: {}", e);
                None
            }
        }
    }

    /// Most-searched keywords in the recent window / 热门搜索
    pub async fn trending(&self, limit: i64) -> Vec<TrendingKeyword> {
        if !self.config().await.enable_trending {
            return Vec::new();
        }
        let limit = limit.clamp(1, MAX_TRENDING_LIMIT);
        let key = keys::trending_key(limit);
        if let Some(cached) = self.cache.get_json::<Vec<TrendingKeyword>>(&key).await {
            return cached;
        }

        let cutoff = Utc::now() - chrono::Duration::days(self.settings.trending_window_days.max(1));
        let rows = timed(
            self.timeout,
            sqlx::query_as::<_, TrendingKeyword>(
                r#"
                SELECT keyword, search_count, last_searched_at FROM search_logs
                WHERE last_searched_at >= ?
                ORDER BY search_count DESC, last_searched_at DESC
                LIMIT ?
                "#,
            )
            .bind(cutoff.to_rfc3339())
            // Over-fetch so filtered entries do not shorten the list
            .bind(limit * 2)
            .fetch_all(&self.db),
        )
        .await;

        let rows = match rows {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Failed to load trending keywords: {}", e);
                return Vec::new();
            }
        };

        let mut trending = Vec::with_capacity(limit as usize);
        for row in rows {
            if trending.len() as i64 >= limit {
                break;
            }
            if !self.gate.contains(&row.keyword).await {
                trending.push(row);
            }
        }

        self.cache.set_json(&key, &trending, self.settings.trending_ttl_secs as i64).await;
        trending
    }

    /// Completions for a prefix: logged keywords first, then note titles / 搜索建议
    pub async fn suggest(&self, prefix: &str) -> Vec<String> {
        let prefix = sanitize_keyword(prefix);
        if prefix.is_empty() {
            return Vec::new();
        }
        let config = self.config().await;
        if !config.enable_suggest {
            return Vec::new();
        }

        let key = keys::suggest_key(&prefix);
        if let Some(cached) = self.cache.get_json::<Vec<String>>(&key).await {
            return cached;
        }

        let limit = config.suggest_count;
        let pattern = format!("{}%", escape_like(&prefix.to_lowercase()));
        let keywords = timed(
            self.timeout,
            sqlx::query_scalar::<_, String>(
                "SELECT keyword FROM search_logs WHERE keyword LIKE ? ESCAPE '\\' ORDER BY search_count DESC LIMIT ?",
            )
            .bind(&pattern)
            .bind(limit)
            .fetch_all(&self.db),
        )
        .await;
        let titles = timed(
            self.timeout,
            sqlx::query_scalar::<_, String>(
                r#"
                SELECT n.title FROM notes n LEFT JOIN blocked_notes b ON b.note_id = n.id
                WHERE n.title LIKE ? ESCAPE '\' AND n.status = ? AND b.note_id IS NULL
                ORDER BY n.view_count DESC
                LIMIT ?
                "#,
            )
            .bind(&pattern)
            .bind(NOTE_STATUS_ACTIVE)
            .bind(limit)
            .fetch_all(&self.db),
        )
        .await;

        let (keywords, titles) = match (keywords, titles) {
            (Ok(keywords), Ok(titles)) => (keywords, titles),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Failed to load suggestions: prefix={}, error={}", prefix, e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();
        for candidate in keywords.into_iter().chain(titles) {
            if suggestions.len() as i64 >= limit {
                break;
            }
            if !seen.insert(candidate.to_lowercase()) || self.gate.contains(&candidate).await {
                continue;
            }
            suggestions.push(candidate);
        }

        self.cache.set_json(&key, &suggestions, self.settings.suggest_ttl_secs as i64).await;
        suggestions
    }
}
