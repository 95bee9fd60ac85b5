//! Redis cache backend / Redis 缓存后端

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use super::CacheBackend;
use crate::config::CacheConfig;
use crate::error::CacheError;

/// Keys deleted per DEL command / 每条 DEL 删除的键数量
const DELETE_CHUNK: usize = 500;

/// Keyspace commands used for bulk invalidation / 批量失效使用的键空间命令
#[async_trait]
trait Keyspace: Send + Sync {
    /// One `SCAN cursor MATCH pattern COUNT count` round
    async fn scan_page(&self, cursor: u64, pattern: &str, count: usize) -> redis::RedisResult<(u64, Vec<String>)>;
    async fn del(&self, keys: &[String]) -> redis::RedisResult<u64>;
}

#[async_trait]
impl Keyspace for ConnectionManager {
    async fn scan_page(&self, cursor: u64, pattern: &str, count: usize) -> redis::RedisResult<(u64, Vec<String>)> {
        let mut conn = self.clone();
        redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async::<_, (u64, Vec<String>)>(&mut conn)
            .await
    }

    async fn del(&self, keys: &[String]) -> redis::RedisResult<u64> {
        let mut conn = self.clone();
        redis::cmd("DEL").arg(keys).query_async::<_, u64>(&mut conn).await
    }
}

async fn with_deadline<T, F>(limit: Duration, fut: F) -> Result<T, CacheError>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(CacheError::from),
        Err(_) => Err(CacheError::Timeout(limit)),
    }
}

/// Cursor-based SCAN, bounded by `max_rounds` / 基于游标的有界扫描
async fn scan_bounded(
    keyspace: &dyn Keyspace,
    pattern: &str,
    batch: usize,
    max_rounds: usize,
    limit: Duration,
) -> Result<Vec<String>, CacheError> {
    let mut keys = Vec::new();
    let mut cursor: u64 = 0;

    for _ in 0..max_rounds {
        let (next, page) = with_deadline(limit, keyspace.scan_page(cursor, pattern, batch)).await?;
        keys.extend(page);
        if next == 0 {
            return Ok(keys);
        }
        cursor = next;
    }

    tracing::warn!(
        "Redis SCAN for {} stopped after {} rounds, {} keys collected",
        pattern,
        max_rounds,
        keys.len()
    );
    Ok(keys)
}

/// DEL in chunks of [`DELETE_CHUNK`] / 分批删除
async fn delete_chunked(keyspace: &dyn Keyspace, keys: &[String], limit: Duration) -> Result<u64, CacheError> {
    let mut removed = 0u64;
    for chunk in keys.chunks(DELETE_CHUNK) {
        removed += with_deadline(limit, keyspace.del(chunk)).await?;
    }
    Ok(removed)
}

/// Distributed backend over a multiplexed Redis connection / 分布式缓存后端
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    op_timeout: Duration,
    scan_batch: usize,
    scan_max_rounds: usize,
}

impl RedisBackend {
    /// Connect using the cache configuration / 按配置连接
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let op_timeout = config.op_timeout();

        let conn = match tokio::time::timeout(op_timeout * 4, ConnectionManager::new(client)).await {
            Ok(conn) => conn?,
            Err(_) => return Err(CacheError::Timeout(op_timeout * 4)),
        };

        tracing::info!("Redis cache backend connected: {}", config.redis_url);
        Ok(Self {
            conn,
            op_timeout,
            scan_batch: config.scan_batch.max(1),
            scan_max_rounds: config.scan_max_rounds.max(1),
        })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        with_deadline(self.op_timeout, async move {
            redis::cmd("GET")
                .arg(key)
                .query_async::<_, Option<String>>(&mut conn)
                .await
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        with_deadline(self.op_timeout, async move { cmd.query_async::<_, ()>(&mut conn).await }).await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        delete_chunked(&self.conn, keys, self.op_timeout).await
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        scan_bounded(&self.conn, pattern, self.scan_batch, self.scan_max_rounds, self.op_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays SCAN pages and records every command / 按脚本返回 SCAN 结果
    #[derive(Default)]
    struct ScriptedKeyspace {
        pages: Mutex<VecDeque<(u64, Vec<String>)>>,
        /// Returned once the script runs out; nonzero keeps the cursor open
        endless_cursor: u64,
        delay: Option<Duration>,
        cursors: Mutex<Vec<u64>>,
        deleted_chunks: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Keyspace for ScriptedKeyspace {
        async fn scan_page(&self, cursor: u64, pattern: &str, count: usize) -> redis::RedisResult<(u64, Vec<String>)> {
            assert_eq!(pattern, "search:result:*");
            assert_eq!(count, 100);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.cursors.lock().push(cursor);
            let page = self.pages.lock().pop_front();
            Ok(page.unwrap_or_else(|| (self.endless_cursor, vec![format!("search:result:{}", cursor)])))
        }

        async fn del(&self, keys: &[String]) -> redis::RedisResult<u64> {
            self.deleted_chunks.lock().push(keys.len());
            Ok(keys.len() as u64)
        }
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| format!("search:result:{}", n)).collect()
    }

    const LIMIT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_scan_follows_cursor_until_zero() {
        let keyspace = ScriptedKeyspace {
            pages: Mutex::new(VecDeque::from(vec![
                (17, keys(&["a", "b"])),
                (42, Vec::new()),
                (0, keys(&["c"])),
            ])),
            ..Default::default()
        };

        let found = scan_bounded(&keyspace, "search:result:*", 100, 10, LIMIT).await.unwrap();
        assert_eq!(found, keys(&["a", "b", "c"]));
        assert_eq!(*keyspace.cursors.lock(), vec![0, 17, 42]);
    }

    #[tokio::test]
    async fn test_scan_stops_after_max_rounds() {
        let keyspace = ScriptedKeyspace {
            endless_cursor: 7,
            ..Default::default()
        };

        let found = scan_bounded(&keyspace, "search:result:*", 100, 3, LIMIT).await.unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(keyspace.cursors.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_slow_scan_times_out() {
        let keyspace = ScriptedKeyspace {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        };

        let result = scan_bounded(&keyspace, "search:result:*", 100, 3, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(CacheError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_delete_is_chunked() {
        let keyspace = ScriptedKeyspace::default();
        let many: Vec<String> = (0..1201).map(|i| format!("search:result:{}", i)).collect();

        let removed = delete_chunked(&keyspace, &many, LIMIT).await.unwrap();
        assert_eq!(removed, 1201);
        assert_eq!(*keyspace.deleted_chunks.lock(), vec![500, 500, 201]);

        assert_eq!(delete_chunked(&keyspace, &[], LIMIT).await.unwrap(), 0);
        assert_eq!(keyspace.deleted_chunks.lock().len(), 3);
    }
}
