//! Cache key namespace / 缓存键命名空间

pub const RESULT_PREFIX: &str = "search:result:";
pub const CONFIG_KEY: &str = "search:config";
pub const STATUS_KEY: &str = "search:status";
pub const TRENDING_PREFIX: &str = "search:trending:";
pub const SUGGEST_PREFIX: &str = "search:suggest:";

pub const RESULT_PATTERN: &str = "search:result:*";
pub const TRENDING_PATTERN: &str = "search:trending:*";
pub const SUGGEST_PATTERN: &str = "search:suggest:*";

/// Every derived family, deleted by a full clear / 全部派生缓存
pub const ALL_PATTERNS: [&str; 5] = [RESULT_PATTERN, CONFIG_KEY, STATUS_KEY, TRENDING_PATTERN, SUGGEST_PATTERN];

pub fn result_key(digest: &str) -> String {
    format!("{}{}", RESULT_PREFIX, digest)
}

pub fn trending_key(limit: i64) -> String {
    format!("{}{}", TRENDING_PREFIX, limit)
}

pub fn suggest_key(prefix: &str) -> String {
    format!("{}{}", SUGGEST_PREFIX, prefix.to_lowercase())
}
