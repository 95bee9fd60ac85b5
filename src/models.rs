use serde::{Deserialize, Serialize};

/// Note lifecycle status / 笔记状态
pub const NOTE_STATUS_ACTIVE: &str = "active";

/// Runtime-tunable ranking and feature parameters / 搜索配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SearchConfig {
    pub suggest_count: i64,
    pub title_weight: f64,
    pub content_weight: f64,
    pub enable_suggest: bool,
    pub enable_trending: bool,
}

impl SearchConfig {
    pub const MIN_SUGGEST_COUNT: i64 = 1;
    pub const MAX_SUGGEST_COUNT: i64 = 20;
    /// Neutral weight, i.e. native scoring / 中性权重
    pub const NEUTRAL_WEIGHT: f64 = 1.0;

    /// Whether ranking should use the explicit per-column weights / 是否启用加权评分
    pub fn uses_weighted_scoring(&self) -> bool {
        self.title_weight != Self::NEUTRAL_WEIGHT || self.content_weight != Self::NEUTRAL_WEIGHT
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            suggest_count: 10,
            title_weight: Self::NEUTRAL_WEIGHT,
            content_weight: Self::NEUTRAL_WEIGHT,
            enable_suggest: true,
            enable_trending: true,
        }
    }
}

/// Partial update for [`SearchConfig`] / 搜索配置的部分更新
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfigUpdate {
    pub suggest_count: Option<i64>,
    pub title_weight: Option<f64>,
    pub content_weight: Option<f64>,
    pub enable_suggest: Option<bool>,
    pub enable_trending: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SensitiveWord {
    pub word: String,
    pub created_at: String,
}

/// Note explicitly excluded from search / 屏蔽的笔记
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlockedNote {
    pub note_id: i64,
    pub title: String,
    pub blocked_by: String,
    pub blocked_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrendingKeyword {
    pub keyword: String,
    pub search_count: i64,
    pub last_searched_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_scoring_policy() {
        let mut config = SearchConfig::default();
        assert!(!config.uses_weighted_scoring());

        config.title_weight = 3.0;
        assert!(config.uses_weighted_scoring());

        config.title_weight = 1.0;
        config.content_weight = 2.0;
        assert!(config.uses_weighted_scoring());
    }
}
