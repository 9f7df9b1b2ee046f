use std::path::PathBuf;
use std::time::Duration;

use crate::message::DEFAULT_BUS_CAPACITY;
use crate::services::DEFAULT_LOW_STOCK_THRESHOLD;

/// 同步层配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | PANTRY_WORK_DIR | ./data | 工作目录 |
/// | PANTRY_DB_FILE | pantry.redb | 本地数据库文件 (相对工作目录) |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (无) | 日志目录，设置后写入按天滚动的文件 |
/// | REMOTE_TIMEOUT_MS | 10000 | 远程请求超时(毫秒) |
/// | LOW_STOCK_THRESHOLD | 10 | 低库存阈值 |
/// | SEED_ON_START | true | 本地空库时写入初始目录 |
/// | LOCAL_QUOTA_BYTES | (无) | 单个集合的字节上限 |
/// | BUS_CAPACITY | 64 | 变更信号通道容量 |
/// | REMOTE_ENDPOINT | (无) | 启动时配置远程后端 |
/// | REMOTE_CREDENTIAL | (无) | 远程后端 API key |
///
/// # 示例
///
/// ```ignore
/// PANTRY_WORK_DIR=/data/pantry LOG_LEVEL=debug cargo run -p pantry-sync
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存放数据库和日志
    pub work_dir: String,
    pub db_file: String,
    pub log_level: String,
    pub log_dir: Option<String>,
    /// 远程请求超时 (毫秒)
    pub remote_timeout_ms: u64,
    pub low_stock_threshold: u32,
    pub seed_on_start: bool,
    pub local_quota_bytes: Option<usize>,
    pub bus_capacity: usize,
    /// 启动时的远程配置 (仅在没有已保存配置时使用)
    pub remote_endpoint: Option<String>,
    pub remote_credential: Option<String>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("PANTRY_WORK_DIR").unwrap_or_else(|_| "./data".into()),
            db_file: std::env::var("PANTRY_DB_FILE").unwrap_or_else(|_| "pantry.redb".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: env_non_empty("LOG_DIR"),
            remote_timeout_ms: env_parse("REMOTE_TIMEOUT_MS").unwrap_or(10_000),
            low_stock_threshold: env_parse("LOW_STOCK_THRESHOLD")
                .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD),
            seed_on_start: env_parse("SEED_ON_START").unwrap_or(true),
            local_quota_bytes: env_parse("LOCAL_QUOTA_BYTES"),
            bus_capacity: env_parse::<usize>("BUS_CAPACITY")
                .filter(|c| *c > 0)
                .unwrap_or(DEFAULT_BUS_CAPACITY),
            remote_endpoint: env_non_empty("REMOTE_ENDPOINT"),
            remote_credential: env_non_empty("REMOTE_CREDENTIAL"),
        }
    }

    /// 使用自定义工作目录 (测试场景)
    pub fn with_work_dir(work_dir: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config
    }

    /// 数据库完整路径
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join(&self.db_file)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    /// Endpoint + credential from the environment, when both are set
    pub fn bootstrap_remote(&self) -> Option<(&str, &str)> {
        match (&self.remote_endpoint, &self.remote_credential) {
            (Some(endpoint), Some(credential)) => Some((endpoint.as_str(), credential.as_str())),
            _ => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
