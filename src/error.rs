//! Error types for the search core / 搜索核心错误类型

use std::time::Duration;

/// Search core error / 搜索核心错误
///
/// Content blocking is deliberately absent: a blocked keyword produces an
/// ordinary empty page. / 敏感词命中不是错误，返回普通空结果。
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Caller input rejected / 参数校验失败
    #[error("validation failed: {0}")]
    Validation(String),

    /// Store or cache backend unreachable / 上游不可用
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// A rebuild step left the index in a partial state / 索引重建不完整
    #[error("index inconsistent: {0}")]
    IndexInconsistent(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SearchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the failure came from a backend rather than the caller / 是否为后端故障
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Timeout(_) | Self::Database(_))
    }
}

pub type SearchResult<T> = Result<T, SearchError>;

/// Cache backend error, never leaves the cache layer / 缓存后端错误
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}
