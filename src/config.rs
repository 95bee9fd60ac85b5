//! Deployment configuration / 部署配置
//!
//! Read once at startup from `config.json` (or the file named by
//! `NOTEHUB_CONFIG`). A missing file is created with defaults; a partial file
//! falls back to defaults section by section.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file / 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "NOTEHUB_CONFIG";

static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration / 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration / 缓存配置
    #[serde(default)]
    pub cache: CacheConfig,
    /// Search engine configuration / 搜索引擎配置
    #[serde(default)]
    pub search: SearchSettings,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    pub host: String,
    /// Server port / 服务器端口
    pub port: u16,
}

/// Database configuration / 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Data directory path / 数据目录路径
    pub data_dir: String,
    /// Main database file path (relative to data_dir) / 主数据库文件路径
    pub db_file: String,
    /// Pool size / 连接池大小
    pub max_connections: u32,
    /// Per-call timeout in milliseconds / 单次调用超时（毫秒）
    pub timeout_ms: u64,
}

/// Cache configuration / 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Use Redis as the distributed backend / 是否启用 Redis
    pub redis_enabled: bool,
    pub redis_url: String,
    /// Expired local entry sweep interval / 本地过期清理间隔
    pub sweep_interval_secs: u64,
    /// Per-command timeout in milliseconds / 单条命令超时（毫秒）
    pub op_timeout_ms: u64,
    /// SCAN COUNT hint / SCAN 每批数量
    pub scan_batch: usize,
    /// Upper bound on SCAN rounds per pattern / SCAN 最大轮数
    pub scan_max_rounds: usize,
}

/// Search engine configuration / 搜索引擎配置
///
/// Static deployment settings. Ranking weights and feature toggles live in
/// the database (`search_config`) and are edited at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    pub max_page_size: u32,
    pub result_ttl_secs: u64,
    pub status_ttl_secs: u64,
    pub config_ttl_secs: u64,
    pub trending_ttl_secs: u64,
    pub suggest_ttl_secs: u64,
    /// Allow the indexed strategy at all / 是否允许使用索引检索
    pub use_index: bool,
    /// Sensitive word list reload interval / 敏感词刷新间隔
    pub sensitive_refresh_secs: u64,
    /// Search log queue capacity / 搜索日志队列容量
    pub log_queue_capacity: usize,
    pub recommend_count: u32,
    pub trending_window_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8180,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            db_file: "notehub.db".to_string(),
            max_connections: 8,
            timeout_ms: 5000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_enabled: false,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            sweep_interval_secs: 60,
            op_timeout_ms: 500,
            scan_batch: 100,
            scan_max_rounds: 1000,
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_page_size: 50,
            result_ttl_secs: 300,
            status_ttl_secs: 60,
            config_ttl_secs: 3600,
            trending_ttl_secs: 600,
            suggest_ttl_secs: 600,
            use_index: true,
            sensitive_refresh_secs: 300,
            log_queue_capacity: 1024,
            recommend_count: 5,
            trending_window_days: 7,
        }
    }
}

impl DatabaseConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CacheConfig {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl AppConfig {
    /// Get the full database URL / 获取完整的数据库URL
    pub fn get_database_url(&self) -> String {
        let db_path = Path::new(&self.database.data_dir).join(&self.database.db_file);
        format!("sqlite:{}?mode=rwc", db_path.to_string_lossy())
    }

    /// Get the full data directory path / 获取完整的数据目录路径
    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(&self.database.data_dir)
    }

    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn config_path() -> PathBuf {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("config.json"),
    }
}

/// Read `path`, writing the defaults there first when it is missing / 读取配置，缺失时写入默认值
pub fn load_or_create(path: &Path) -> Result<AppConfig, String> {
    if !path.exists() {
        let config = AppConfig::default();
        let body = serde_json::to_string_pretty(&config)
            .map_err(|e| format!("Failed to serialize default config: {}", e))?;
        std::fs::write(path, body).map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        tracing::info!("Wrote default configuration to {:?}", path);
        return Ok(config);
    }

    let raw = std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let config = serde_json::from_str(&raw).map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
    tracing::info!("Loaded configuration from {:?}", path);
    Ok(config)
}

/// Load the process-wide configuration / 初始化全局配置
pub fn init_config() -> Result<(), String> {
    let config = load_or_create(&config_path())?;
    CONFIG
        .set(config)
        .map_err(|_| "Config already initialized".to_string())
}

/// Snapshot of the global configuration, defaults before `init_config` / 当前配置快照
pub fn config() -> AppConfig {
    CONFIG.get().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let raw = r#"{ "server": { "host": "127.0.0.1", "port": 9000 } }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.get_bind_address(), "127.0.0.1:9000");
        assert!(!config.cache.redis_enabled);
        assert_eq!(config.search.max_page_size, 50);
        assert_eq!(config.database.timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let created = load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.search.result_ttl_secs, 300);

        let reloaded = load_or_create(&path).unwrap();
        assert_eq!(reloaded.get_bind_address(), created.get_bind_address());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_or_create(&path).is_err());
    }

    #[test]
    fn test_database_url() {
        let config = AppConfig::default();
        let url = config.get_database_url();
        assert!(url.starts_with("sqlite:"));
        assert!(url.ends_with("notehub.db?mode=rwc"));
    }
}
