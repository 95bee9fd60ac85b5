//! Sensitive word gate / 敏感词过滤
//!
//! The word list is cached in-process as an explicit snapshot
//! `{words, matcher, loaded_at}` and reloaded when older than the refresh
//! interval. Loads run without holding the lock; a finished load is only
//! published if no invalidation happened meanwhile and it is not older than
//! the current snapshot. Redundant concurrent loads are harmless.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use sqlx::SqlitePool;

use crate::db::timed;
use crate::error::{SearchError, SearchResult};
use crate::models::SensitiveWord;

/// Longest accepted word / 敏感词最大长度
const MAX_WORD_CHARS: usize = 64;

/// Time source, injectable for tests / 时钟
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Default)]
struct WordList {
    words: Vec<String>,
    matcher: Option<Regex>,
    loaded_at: Option<DateTime<Utc>>,
}

impl WordList {
    fn build(mut words: Vec<String>, loaded_at: DateTime<Utc>) -> Self {
        // Longest first so overlapping words mask fully
        words.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
        words.dedup();

        let matcher = if words.is_empty() {
            None
        } else {
            let alternation: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
            match RegexBuilder::new(&alternation.join("|")).case_insensitive(true).build() {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!("Sensitive word matcher build failed, using plain scan: {}", e);
                    None
                }
            }
        };

        Self { words, matcher, loaded_at: Some(loaded_at) }
    }

    /// Char length of the word starting at `chars[0]`, longest first / 匹配长度
    fn match_len(&self, chars: &[char]) -> Option<usize> {
        self.words.iter().find_map(|word| {
            let len = word.chars().count();
            if len == 0 || chars.len() < len {
                return None;
            }
            let candidate: String = chars[..len].iter().collect();
            (candidate.to_lowercase() == *word).then_some(len)
        })
    }

    fn contains(&self, text: &str) -> bool {
        match &self.matcher {
            Some(matcher) => matcher.is_match(text),
            None => {
                let chars: Vec<char> = text.chars().collect();
                (0..chars.len()).any(|i| self.match_len(&chars[i..]).is_some())
            }
        }
    }

    fn filter(&self, text: &str, mask: &str) -> String {
        if let Some(matcher) = &self.matcher {
            return matcher
                .replace_all(text, |caps: &regex::Captures| mask.repeat(caps[0].chars().count()))
                .into_owned();
        }

        let chars: Vec<char> = text.chars().collect();
        let mut filtered = String::with_capacity(text.len());
        let mut i = 0;
        while i < chars.len() {
            match self.match_len(&chars[i..]) {
                Some(len) => {
                    filtered.push_str(&mask.repeat(len));
                    i += len;
                }
                None => {
                    filtered.push(chars[i]);
                    i += 1;
                }
            }
        }
        filtered
    }
}

/// Normalize a word for storage: trimmed, lower-case / 规范化敏感词
pub fn normalize_word(word: &str) -> SearchResult<String> {
    let word = word.trim().to_lowercase();
    if word.is_empty() {
        return Err(SearchError::validation("敏感词不能为空 / sensitive word must not be blank"));
    }
    if word.chars().count() > MAX_WORD_CHARS {
        return Err(SearchError::validation(format!(
            "敏感词过长 / sensitive word longer than {} characters",
            MAX_WORD_CHARS
        )));
    }
    Ok(word)
}

/// Cached sensitive word list / 敏感词缓存
pub struct SensitiveWordGate {
    db: SqlitePool,
    timeout: Duration,
    refresh_interval: chrono::Duration,
    clock: Arc<dyn Clock>,
    state: RwLock<WordList>,
    /// Bumped on every invalidation / 失效计数
    generation: AtomicU64,
}

impl SensitiveWordGate {
    pub fn new(db: SqlitePool, timeout: Duration, refresh_interval: Duration) -> Self {
        Self::with_clock(db, timeout, refresh_interval, Arc::new(SystemClock))
    }

    pub fn with_clock(db: SqlitePool, timeout: Duration, refresh_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            timeout,
            refresh_interval: chrono::Duration::from_std(refresh_interval)
                .unwrap_or_else(|_| chrono::Duration::minutes(5)),
            clock,
            state: RwLock::new(WordList::default()),
            generation: AtomicU64::new(0),
        }
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.state.read().loaded_at {
            None => true,
            Some(loaded_at) => now - loaded_at >= self.refresh_interval,
        }
    }

    async fn load_words(&self) -> SearchResult<Vec<String>> {
        timed(
            self.timeout,
            sqlx::query_scalar::<_, String>("SELECT word FROM sensitive_words").fetch_all(&self.db),
        )
        .await
    }

    /// Reload the list if the snapshot is stale / 过期时重新加载
    ///
    /// Returns whether a fresh snapshot was published. A failed load keeps
    /// the previous snapshot and retries on the next call.
    pub async fn refresh(&self) -> bool {
        let started = self.clock.now();
        if !self.is_stale(started) {
            return false;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let words = match self.load_words().await {
            Ok(words) => words,
            Err(e) => {
                tracing::warn!("Failed to load sensitive words, keeping previous list: {}", e);
                return false;
            }
        };

        let mut state = self.state.write();
        let newer = state.loaded_at.map_or(true, |current| current <= started);
        if generation != self.generation.load(Ordering::SeqCst) || !newer {
            return false;
        }
        *state = WordList::build(words, started);
        tracing::debug!("Sensitive word list loaded: {} words", state.words.len());
        true
    }

    /// Drop the snapshot so the next check reloads / 使缓存失效
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.write().loaded_at = None;
    }

    /// Case-insensitive match of any word / 是否包含敏感词
    pub async fn contains(&self, text: &str) -> bool {
        self.refresh().await;
        self.state.read().contains(text)
    }

    /// Replace each match with `mask` repeated to the word length / 替换敏感词
    pub async fn filter(&self, text: &str, mask: &str) -> String {
        self.refresh().await;
        self.state.read().filter(text, mask)
    }

    /// Add a word; returns false if it already existed / 添加敏感词
    pub async fn add(&self, word: &str) -> SearchResult<bool> {
        let word = normalize_word(word)?;
        let result = timed(
            self.timeout,
            sqlx::query("INSERT OR IGNORE INTO sensitive_words (word, created_at) VALUES (?, ?)")
                .bind(&word)
                .bind(Utc::now().to_rfc3339())
                .execute(&self.db),
        )
        .await?;
        self.invalidate();
        Ok(result.rows_affected() > 0)
    }

    /// Remove a word; returns false if it was absent / 删除敏感词
    pub async fn remove(&self, word: &str) -> SearchResult<bool> {
        let word = normalize_word(word)?;
        let result = timed(
            self.timeout,
            sqlx::query("DELETE FROM sensitive_words WHERE word = ?")
                .bind(&word)
                .execute(&self.db),
        )
        .await?;
        self.invalidate();
        Ok(result.rows_affected() > 0)
    }

    pub async fn list(&self) -> SearchResult<Vec<SensitiveWord>> {
        timed(
            self.timeout,
            sqlx::query_as::<_, SensitiveWord>(
                "SELECT word, created_at FROM sensitive_words ORDER BY created_at DESC, word ASC",
            )
            .fetch_all(&self.db),
        )
        .await
    }
}
