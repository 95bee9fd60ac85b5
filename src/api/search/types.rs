use serde::Deserialize;

use notehub_backend::error::{SearchError, SearchResult};
use notehub_backend::search::{SearchRequest, SortBy, TimeRange};

/// Query string of `GET /api/search` / 搜索请求参数
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub keyword: String,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub sort_by: Option<String>,
    /// Comma-separated ids, e.g. `1,3` / 逗号分隔的分类ID
    #[serde(default)]
    pub category_ids: Option<String>,
    #[serde(default)]
    pub time_range: Option<String>,
    #[serde(default)]
    pub use_index: Option<bool>,
}

fn default_page() -> i64 { 1 }
fn default_page_size() -> i64 { 10 }

impl SearchParams {
    pub fn into_request(self) -> SearchResult<SearchRequest> {
        let sort_by: SortBy = self.sort_by.as_deref().unwrap_or_default().parse()?;
        let time_range: TimeRange = self.time_range.as_deref().unwrap_or_default().parse()?;

        let mut request = SearchRequest::new(self.keyword)
            .page(self.page, self.page_size)
            .sort_by(sort_by)
            .time_range(time_range)
            .use_index(self.use_index.unwrap_or(true));

        if let Some(raw) = self.category_ids.as_deref().filter(|s| !s.trim().is_empty()) {
            let ids = raw
                .split(',')
                .map(|id| id.trim().parse::<i64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| SearchError::validation(format!("无效的分类ID / invalid category_ids: {}", raw)))?;
            request = request.categories(ids);
        }
        Ok(request)
    }
}

#[derive(Debug, Deserialize)]
pub struct TrendingParams {
    #[serde(default = "default_trending_limit")]
    pub limit: i64,
}

fn default_trending_limit() -> i64 { 10 }

#[derive(Debug, Deserialize)]
pub struct SuggestParams {
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct SensitiveWordRequest {
    pub word: String,
}

#[derive(Debug, Deserialize)]
pub struct BlockNoteRequest {
    pub note_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(category_ids: Option<&str>, sort_by: Option<&str>) -> SearchParams {
        SearchParams {
            keyword: "rust".into(),
            page: 1,
            page_size: 10,
            sort_by: sort_by.map(String::from),
            category_ids: category_ids.map(String::from),
            time_range: None,
            use_index: None,
        }
    }

    #[test]
    fn test_category_ids_parsing() {
        let request = params(Some("3, 1"), None).into_request().unwrap();
        assert_eq!(request.category_ids, Some(vec![3, 1]));
        assert_eq!(params(Some(" "), None).into_request().unwrap().category_ids, None);
        assert!(params(Some("1,x"), None).into_request().is_err());
    }

    #[test]
    fn test_sort_parsing() {
        let request = params(None, Some("mostViewed")).into_request().unwrap();
        assert_eq!(request.sort_by, SortBy::MostViewed);
        assert!(params(None, Some("random")).into_request().is_err());
    }
}
