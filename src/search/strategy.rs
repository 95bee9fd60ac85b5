//! Retrieval strategies / 检索策略
//!
//! - `IndexedSearch`: FTS5 MATCH over the mirror, ranked by bm25
//! - `FallbackSearch`: substring match on the source table
//!
//! Both apply the same filters (active, not blocked, categories, time
//! window) and return the same row shape.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::index::{IndexStatus, MIRROR_TABLE};
use super::query::{SearchQuery, SortBy};
use crate::db::timed;
use crate::error::SearchResult;
use crate::models::{SearchConfig, NOTE_STATUS_ACTIVE};
use crate::utils::escape_like;

const HIT_COLUMNS: &str = "n.id, n.title, n.content, n.category_id, n.view_count, n.created_at";

/// Raw strategy row before post-processing / 未加工的命中
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawHit {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category_id: Option<i64>,
    pub view_count: i64,
    pub created_at: String,
    /// Higher is better / 越大越相关
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct HitPage {
    pub hits: Vec<RawHit>,
    pub total: i64,
}

#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, query: &SearchQuery, config: &SearchConfig) -> SearchResult<HitPage>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Indexed,
    Fallback,
}

/// Pick the strategy for a query / 选择检索策略
pub fn choose_strategy(status: Option<&IndexStatus>, query: &SearchQuery) -> StrategyKind {
    let index_ready = status.map_or(false, |s| s.index_exists);
    if index_ready && query.use_index && query.match_expression.is_some() {
        StrategyKind::Indexed
    } else {
        StrategyKind::Fallback
    }
}

/// Shared WHERE filters, appended after a leading condition / 公共过滤条件
fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &SearchQuery) {
    qb.push(" AND n.status = ").push_bind(NOTE_STATUS_ACTIVE);
    qb.push(" AND b.note_id IS NULL");

    if !query.category_ids.is_empty() {
        qb.push(" AND n.category_id IN (");
        let mut ids = qb.separated(", ");
        for id in &query.category_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");
    }

    if let Some(cutoff) = query.time_range.cutoff(Utc::now()) {
        qb.push(" AND n.created_at >= ").push_bind(cutoff.to_rfc3339());
    }
}

fn push_order_and_page(qb: &mut QueryBuilder<'_, Sqlite>, query: &SearchQuery) {
    let order = match query.sort_by {
        SortBy::Relevance => " ORDER BY score DESC, n.created_at DESC, n.id DESC",
        SortBy::Newest => " ORDER BY n.created_at DESC, n.id DESC",
        SortBy::MostViewed => " ORDER BY n.view_count DESC, n.created_at DESC, n.id DESC",
    };
    qb.push(order);
    qb.push(" LIMIT ").push_bind(query.page_size);
    qb.push(" OFFSET ").push_bind(query.offset());
}

/// Ranked token search over the mirror / 基于镜像表的全文检索
pub struct IndexedSearch {
    db: SqlitePool,
    timeout: Duration,
}

impl IndexedSearch {
    pub fn new(db: SqlitePool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    fn push_from(qb: &mut QueryBuilder<'_, Sqlite>, match_expression: &str, query: &SearchQuery) {
        qb.push(format!(
            " FROM {table} JOIN notes n ON n.id = {table}.note_id LEFT JOIN blocked_notes b ON b.note_id = n.id WHERE {table} MATCH ",
            table = MIRROR_TABLE
        ));
        qb.push_bind(match_expression.to_string());
        push_filters(qb, query);
    }
}

#[async_trait]
impl RetrievalStrategy for IndexedSearch {
    fn name(&self) -> &'static str {
        "indexed"
    }

    async fn execute(&self, query: &SearchQuery, config: &SearchConfig) -> SearchResult<HitPage> {
        let Some(expression) = query.match_expression.as_deref() else {
            return Ok(HitPage::default());
        };

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
        Self::push_from(&mut count, expression, query);
        let total: i64 = timed(self.timeout, count.build_query_scalar::<i64>().fetch_one(&self.db)).await?;
        if total == 0 {
            return Ok(HitPage::default());
        }

        // bm25 is lower-is-better; negate so higher scores rank first
        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {}, ", HIT_COLUMNS));
        if config.uses_weighted_scoring() {
            select
                .push(format!("-bm25({}, 0.0, ", MIRROR_TABLE))
                .push_bind(config.title_weight)
                .push(", ")
                .push_bind(config.content_weight)
                .push(", 0.0) AS score");
        } else {
            select.push(format!("-bm25({}) AS score", MIRROR_TABLE));
        }
        Self::push_from(&mut select, expression, query);
        push_order_and_page(&mut select, query);

        let hits = timed(self.timeout, select.build_query_as::<RawHit>().fetch_all(&self.db)).await?;
        Ok(HitPage { hits, total })
    }
}

/// Substring search on the source table / 基于源表的模糊匹配
pub struct FallbackSearch {
    db: SqlitePool,
    timeout: Duration,
}

impl FallbackSearch {
    pub fn new(db: SqlitePool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    fn push_from(qb: &mut QueryBuilder<'_, Sqlite>, pattern: &str, query: &SearchQuery) {
        qb.push(" FROM notes n LEFT JOIN blocked_notes b ON b.note_id = n.id WHERE (n.title LIKE ");
        qb.push_bind(pattern.to_string());
        qb.push(" ESCAPE '\\' OR n.content LIKE ");
        qb.push_bind(pattern.to_string());
        qb.push(" ESCAPE '\\')");
        push_filters(qb, query);
    }
}

#[async_trait]
impl RetrievalStrategy for FallbackSearch {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn execute(&self, query: &SearchQuery, _config: &SearchConfig) -> SearchResult<HitPage> {
        let pattern = format!("%{}%", escape_like(&query.keyword));

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
        Self::push_from(&mut count, &pattern, query);
        let total: i64 = timed(self.timeout, count.build_query_scalar::<i64>().fetch_one(&self.db)).await?;
        if total == 0 {
            return Ok(HitPage::default());
        }

        // Title matches rank above content-only matches
        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {}, CASE WHEN n.title LIKE ", HIT_COLUMNS));
        select.push_bind(pattern.clone());
        select.push(" ESCAPE '\\' THEN 2.0 ELSE 1.0 END AS score");
        Self::push_from(&mut select, &pattern, query);
        push_order_and_page(&mut select, query);

        let hits = timed(self.timeout, select.build_query_as::<RawHit>().fetch_all(&self.db)).await?;
        Ok(HitPage { hits, total })
    }
}
