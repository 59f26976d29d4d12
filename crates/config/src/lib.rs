//! 全局频道配置
//!
//! 加载顺序：默认值 -> 可选 YAML 文件（`CHANNEL_CONFIG_FILE`）-> 环境变量（`CHANNEL_*`，
//! 嵌套字段用 `__` 分隔，例如 `CHANNEL_REDIS__HOST`）。

use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// 默认键前缀
pub const DEFAULT_PREFIX: &str = "POMELO:CHANNEL";

/// 指定配置文件路径的环境变量
pub const CONFIG_FILE_ENV: &str = "CHANNEL_CONFIG_FILE";

/// 全局频道服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Redis 键命名空间前缀
    pub prefix: String,
    /// 启动时清空命名空间下的所有键
    #[serde(default)]
    pub clean_on_startup: bool,
    /// 单个前端服务器推送任务的超时时间（毫秒），0 表示不限时
    pub rpc_timeout_ms: u64,
    /// Redis 连接配置
    pub redis: RedisConfig,
}

/// Redis 连接配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    /// 数据库编号
    pub db: i64,
    /// 认证密码
    #[serde(default)]
    pub auth_pass: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            auth_pass: None,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            clean_on_startup: false,
            rpc_timeout_ms: 10_000,
            redis: RedisConfig::default(),
        }
    }
}

impl ChannelConfig {
    /// 按 默认值 -> 文件 -> 环境变量 的优先级加载并校验
    pub fn load() -> Result<Self, ConfigError> {
        let mut fig = Figment::new().merge(Serialized::defaults(ChannelConfig::default()));
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            fig = fig.merge(Yaml::file(path));
        }
        fig = fig.merge(Env::prefixed("CHANNEL_").split("__"));

        Self::from_figment(fig)
    }

    /// 从已组装好的 figment 提取配置
    pub fn from_figment(fig: Figment) -> Result<Self, ConfigError> {
        let config: ChannelConfig = fig.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// 推送任务超时；`rpc_timeout_ms` 为 0 时不限时
    pub fn rpc_timeout(&self) -> Option<Duration> {
        (self.rpc_timeout_ms > 0).then(|| Duration::from_millis(self.rpc_timeout_ms))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.is_empty() {
            return Err(ConfigError::Invalid("prefix cannot be empty".to_string()));
        }

        if self.redis.host.is_empty() {
            return Err(ConfigError::Invalid("redis host cannot be empty".to_string()));
        }

        if self.redis.port == 0 {
            return Err(ConfigError::Invalid(
                "redis port must be greater than 0".to_string(),
            ));
        }

        if self.redis.db < 0 {
            return Err(ConfigError::Invalid(
                "redis db index cannot be negative".to_string(),
            ));
        }

        Ok(())
    }

    /// 用于日志输出的配置描述，隐藏密码
    pub fn sanitized(&self) -> String {
        let mut redacted = self.clone();
        if redacted.redis.auth_pass.is_some() {
            redacted.redis.auth_pass = Some("[REDACTED]".to_string());
        }
        format!("{:?}", redacted)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
