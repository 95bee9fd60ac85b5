//! Search request normalization / 搜索请求规范化

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::keys;
use super::tokenizer::build_match_expression;
use crate::error::{SearchError, SearchResult};
use crate::utils::sanitize_keyword;

pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Result ordering / 排序方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    Relevance,
    Newest,
    MostViewed,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Relevance => "relevance",
            SortBy::Newest => "newest",
            SortBy::MostViewed => "mostViewed",
        }
    }
}

impl FromStr for SortBy {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "relevance" => Ok(SortBy::Relevance),
            "newest" => Ok(SortBy::Newest),
            "mostViewed" | "most_viewed" => Ok(SortBy::MostViewed),
            other => Err(SearchError::validation(format!("不支持的排序方式 / unsupported sort_by: {}", other))),
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creation-time window / 时间范围
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "30days")]
    Last30Days,
    #[serde(rename = "90days")]
    Last90Days,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Last30Days => "30days",
            TimeRange::Last90Days => "90days",
            TimeRange::All => "all",
        }
    }

    /// Earliest accepted creation time / 最早创建时间
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeRange::Last30Days => Some(now - chrono::Duration::days(30)),
            TimeRange::Last90Days => Some(now - chrono::Duration::days(90)),
            TimeRange::All => None,
        }
    }
}

impl FromStr for TimeRange {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(TimeRange::All),
            "30days" => Ok(TimeRange::Last30Days),
            "90days" => Ok(TimeRange::Last90Days),
            other => Err(SearchError::validation(format!("不支持的时间范围 / unsupported time_range: {}", other))),
        }
    }
}

/// Caller-supplied search parameters / 搜索参数
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub keyword: String,
    pub page: i64,
    pub page_size: i64,
    pub sort_by: SortBy,
    pub category_ids: Option<Vec<i64>>,
    pub time_range: TimeRange,
    pub use_index: bool,
}

impl SearchRequest {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort_by: SortBy::default(),
            category_ids: None,
            time_range: TimeRange::default(),
            use_index: true,
        }
    }

    pub fn page(mut self, page: i64, page_size: i64) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn categories(mut self, category_ids: Vec<i64>) -> Self {
        self.category_ids = Some(category_ids);
        self
    }

    pub fn time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = time_range;
        self
    }

    pub fn use_index(mut self, use_index: bool) -> Self {
        self.use_index = use_index;
        self
    }
}

/// Normalized search parameters / 规范化后的搜索参数
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Sanitized keyword / 清理后的关键词
    pub keyword: String,
    /// FTS5 expression, `None` when the keyword has no indexable token
    pub match_expression: Option<String>,
    pub page: i64,
    pub page_size: i64,
    pub sort_by: SortBy,
    /// Sorted and deduplicated / 已排序去重
    pub category_ids: Vec<i64>,
    pub time_range: TimeRange,
    pub use_index: bool,
}

impl SearchQuery {
    /// Sanitize and clamp a request / 清理并钳制参数
    ///
    /// Blank keywords are rejected; `page` is clamped to `>= 1` and
    /// `page_size` to `[1, max_page_size]`.
    pub fn normalize(request: &SearchRequest, max_page_size: i64, index_allowed: bool) -> SearchResult<Self> {
        let keyword = sanitize_keyword(&request.keyword);
        if keyword.is_empty() {
            return Err(SearchError::validation("搜索关键词不能为空 / keyword must not be blank"));
        }

        let mut category_ids = request.category_ids.clone().unwrap_or_default();
        category_ids.sort_unstable();
        category_ids.dedup();

        Ok(Self {
            match_expression: build_match_expression(&keyword),
            keyword,
            page: request.page.max(1),
            page_size: request.page_size.clamp(1, max_page_size.max(1)),
            sort_by: request.sort_by,
            category_ids,
            time_range: request.time_range,
            use_index: request.use_index && index_allowed,
        })
    }

    /// Row offset of the page; saturates for absurd page numbers / 分页偏移
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Cache key over the full normalized tuple / 结果缓存键
    ///
    /// The keyword keeps its case: substring matching folds ASCII only, so
    /// "Ärger" and "ärger" can have different results.
    pub fn cache_key(&self) -> String {
        let categories: Vec<String> = self.category_ids.iter().map(i64::to_string).collect();
        let canonical = format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.keyword,
            self.page,
            self.page_size,
            self.sort_by,
            categories.join(","),
            self.time_range.as_str(),
            self.use_index
        );
        let digest = Sha256::digest(canonical.as_bytes());
        keys::result_key(&hex::encode(digest))
    }
}

/// `ceil(total / page_size)`, zero for an empty result / 总页数
pub fn total_pages(total: i64, page_size: i64) -> i64 {
    if total <= 0 {
        0
    } else {
        (total + page_size - 1) / page_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_keywords_rejected() {
        for raw in ["", "   ", "\t\n", "<script>alert(1)</script>", "<b></b>"] {
            let result = SearchQuery::normalize(&SearchRequest::new(raw), 50, true);
            assert!(matches!(result, Err(SearchError::Validation(_))), "{:?}", raw);
        }
    }

    #[test]
    fn test_pagination_clamped() {
        let query = SearchQuery::normalize(&SearchRequest::new("rust").page(0, 500), 50, true).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 50);

        let query = SearchQuery::normalize(&SearchRequest::new("rust").page(-3, 0), 50, true).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 1);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn test_huge_page_offset_saturates() {
        let query = SearchQuery::normalize(&SearchRequest::new("rust").page(i64::MAX, 10), 50, true).unwrap();
        assert_eq!(query.page, i64::MAX);
        assert_eq!(query.offset(), i64::MAX);

        let query = SearchQuery::normalize(&SearchRequest::new("rust").page(3, 10), 50, true).unwrap();
        assert_eq!(query.offset(), 20);
    }

    #[test]
    fn test_index_use_requires_both_switches() {
        let request = SearchRequest::new("rust");
        assert!(SearchQuery::normalize(&request, 50, true).unwrap().use_index);
        assert!(!SearchQuery::normalize(&request, 50, false).unwrap().use_index);
        assert!(!SearchQuery::normalize(&request.use_index(false), 50, true).unwrap().use_index);
    }

    #[test]
    fn test_cache_key_normalizes_tuple() {
        let a = SearchQuery::normalize(&SearchRequest::new("rust").categories(vec![3, 1, 3]), 50, true).unwrap();
        let b = SearchQuery::normalize(&SearchRequest::new("  rust ").categories(vec![1, 3]), 50, true).unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
        assert!(a.cache_key().starts_with("search:result:"));

        let upper = SearchQuery::normalize(&SearchRequest::new("Ärger"), 50, true).unwrap();
        let lower = SearchQuery::normalize(&SearchRequest::new("ärger"), 50, true).unwrap();
        assert_ne!(upper.cache_key(), lower.cache_key());

        let c = SearchQuery::normalize(&SearchRequest::new("rust").page(2, 10), 50, true).unwrap();
        assert_ne!(a.cache_key(), c.cache_key());
        let d = SearchQuery::normalize(&SearchRequest::new("rust").sort_by(SortBy::Newest), 50, true).unwrap();
        assert_ne!(a.cache_key(), d.cache_key());
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(2, 1), 2);
    }

    #[test]
    fn test_parse_options() {
        assert_eq!("mostViewed".parse::<SortBy>().unwrap(), SortBy::MostViewed);
        assert_eq!("".parse::<SortBy>().unwrap(), SortBy::Relevance);
        assert!("oldest".parse::<SortBy>().is_err());
        assert_eq!("30days".parse::<TimeRange>().unwrap(), TimeRange::Last30Days);
        assert!("7days".parse::<TimeRange>().is_err());
    }
}
