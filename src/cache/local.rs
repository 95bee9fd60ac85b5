//! In-process cache backend / 进程内缓存后端

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{CacheBackend, GlobMatcher};
use crate::error::CacheError;

#[derive(Debug, Clone)]
struct LocalEntry {
    value: String,
    /// Absolute expiry, `None` = never / 绝对过期时间
    expires_at: Option<Instant>,
}

impl LocalEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// In-process map with lazy expiry / 进程内缓存
///
/// Expiry is checked on read and swept periodically by
/// [`LocalBackend::spawn_sweeper`].
#[derive(Debug, Default)]
pub struct LocalBackend {
    entries: RwLock<HashMap<String, LocalEntry>>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock, a writer may have replaced it
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    pub fn set_value(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let entry = LocalEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().insert(key.to_string(), entry);
    }

    pub fn remove_keys(&self, keys: &[String]) -> u64 {
        let mut entries = self.entries.write();
        keys.iter().filter(|key| entries.remove(key.as_str()).is_some()).count() as u64
    }

    /// Live keys matching a glob pattern / 匹配通配符的有效键
    pub fn matching_keys(&self, pattern: &str) -> Result<Vec<String>, regex::Error> {
        let matcher = GlobMatcher::new(pattern)?;
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|(key, entry)| !entry.is_expired(now) && matcher.is_match(key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    /// Remove expired entries, returns how many were dropped / 清理过期条目
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the periodic sweeper / 启动定期清理任务
    ///
    /// The task holds a weak reference and stops once the backend is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(backend) = weak.upgrade() else {
                    tracing::debug!("Local cache dropped, sweeper exiting");
                    break;
                };
                let removed = backend.sweep();
                if removed > 0 {
                    tracing::debug!("Local cache sweep removed {} expired entries", removed);
                }
            }
        })
    }
}

#[async_trait]
impl CacheBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.get_value(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.set_value(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        Ok(self.remove_keys(keys))
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.matching_keys(pattern)
            .map_err(|e| CacheError::Backend(e.to_string()))
    }
}
