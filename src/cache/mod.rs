//! Dual-backend cache / 双后端缓存
//!
//! Architecture / 架构：
//! - `CacheBackend` is the primitive seam (get / set / delete / scan)
//! - `LocalBackend`: in-process map with lazy expiry and a periodic sweeper
//! - `RedisBackend`: optional distributed backend
//! - `CompositeCache` composes both and never surfaces backend errors;
//!   every failure is logged and treated as a miss / 所有错误视为未命中
//!
//! Values are opaque strings (JSON payloads) and are replaced wholesale.

pub mod glob;
pub mod local;
pub mod redis_backend;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CacheError;

pub use glob::GlobMatcher;
pub use local::LocalBackend;
pub use redis_backend::RedisBackend;

/// Cache backend primitives / 缓存后端原语
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// `ttl == None` means no expiry / 不过期
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Returns the number of keys removed / 返回删除数量
    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Enumerate keys matching a glob pattern / 枚举匹配通配符的键
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;
}

/// Convert a TTL in seconds; `<= 0` means no expiry / 秒转 TTL，非正数表示不过期
pub fn ttl_from_secs(ttl_seconds: i64) -> Option<Duration> {
    if ttl_seconds <= 0 {
        None
    } else {
        Some(Duration::from_secs(ttl_seconds as u64))
    }
}

/// Composite cache: distributed first, local as fallback / 组合缓存
pub struct CompositeCache {
    remote: Option<Arc<dyn CacheBackend>>,
    local: Arc<LocalBackend>,
}

impl CompositeCache {
    /// Local-only cache / 仅本地缓存
    pub fn local_only(local: Arc<LocalBackend>) -> Self {
        Self { remote: None, local }
    }

    pub fn with_remote(remote: Arc<dyn CacheBackend>, local: Arc<LocalBackend>) -> Self {
        Self { remote: Some(remote), local }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn local(&self) -> &Arc<LocalBackend> {
        &self.local
    }

    /// Read a value / 读取
    ///
    /// A remote miss is authoritative; the local map only answers when the
    /// remote backend is disabled or failing.
    pub async fn get(&self, key: &str) -> Option<String> {
        if let Some(remote) = &self.remote {
            match remote.get(key).await {
                Ok(value) => return value,
                Err(e) => {
                    tracing::warn!("Cache get via {} failed, using local map: key={}, error={}", remote.name(), key, e);
                }
            }
        }
        self.local.get_value(key)
    }

    /// Write a value to every enabled backend / 写入所有后端
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: i64) {
        let ttl = ttl_from_secs(ttl_seconds);
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.set(key, value, ttl).await {
                tracing::warn!("Cache set via {} failed: key={}, error={}", remote.name(), key, e);
            }
        }
        self.local.set_value(key, value, ttl);
    }

    pub async fn delete(&self, key: &str) {
        let keys = [key.to_string()];
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.delete(&keys).await {
                tracing::warn!("Cache delete via {} failed: key={}, error={}", remote.name(), key, e);
            }
        }
        self.local.remove_keys(&keys);
    }

    /// Delete every key matching a glob pattern / 按通配符批量删除
    ///
    /// Two phases: enumerate (remote cursor scan ∪ local match), then delete
    /// the union from both backends. Returns the number of distinct keys found.
    pub async fn delete_by_pattern(&self, pattern: &str) -> usize {
        let mut keys: BTreeSet<String> = BTreeSet::new();

        if let Some(remote) = &self.remote {
            match remote.scan_keys(pattern).await {
                Ok(found) => keys.extend(found),
                Err(e) => {
                    tracing::warn!("Cache scan via {} failed: pattern={}, error={}", remote.name(), pattern, e);
                }
            }
        }

        match self.local.matching_keys(pattern) {
            Ok(found) => keys.extend(found),
            Err(e) => {
                tracing::warn!("Invalid cache pattern {}: {}", pattern, e);
            }
        }

        if keys.is_empty() {
            return 0;
        }

        let keys: Vec<String> = keys.into_iter().collect();
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.delete(&keys).await {
                tracing::warn!("Cache bulk delete via {} failed: pattern={}, error={}", remote.name(), pattern, e);
            }
        }
        self.local.remove_keys(&keys);

        tracing::debug!("Cache invalidated: pattern={}, keys={}", pattern, keys.len());
        keys.len()
    }

    /// Typed read; undecodable payloads count as misses / 类型化读取
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding undecodable cache entry: key={}, error={}", key, e);
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: i64) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw, ttl_seconds).await,
            Err(e) => tracing::error!("Failed to encode cache entry: key={}, error={}", key, e),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-test distributed backends / 测试用分布式后端

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Map-backed stand-in for a distributed backend, can be switched to failing
    #[derive(Default)]
    pub struct MapBackend {
        pub entries: Mutex<HashMap<String, String>>,
        pub failing: AtomicBool,
    }

    impl MapBackend {
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), CacheError> {
            if self.failing.load(Ordering::SeqCst) {
                Err(CacheError::Backend("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CacheBackend for MapBackend {
        fn name(&self) -> &'static str {
            "map"
        }

        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            self.check()?;
            Ok(self.entries.lock().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<(), CacheError> {
            self.check()?;
            self.entries.lock().insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
            self.check()?;
            let mut entries = self.entries.lock();
            Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count() as u64)
        }

        async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
            self.check()?;
            let matcher = GlobMatcher::new(pattern).map_err(|e| CacheError::Backend(e.to_string()))?;
            Ok(self.entries.lock().keys().filter(|k| matcher.is_match(k)).cloned().collect())
        }
    }
}
