//! Redis 错误类型定义

use application::StoreError;
use thiserror::Error;

/// Redis 操作错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RedisStoreError {
    /// 尚未建立连接或连接已释放
    #[error("Redis 连接未建立")]
    NotConnected,

    /// 连接错误
    #[error("Redis 连接错误: {message}")]
    ConnectionError { message: String },

    /// 命令执行错误
    #[error("Redis 命令错误: {message}")]
    CommandError { message: String },

    /// 配置错误
    #[error("配置错误: {message}")]
    ConfigError { message: String },
}

/// Redis 结果类型
pub type RedisStoreResult<T> = Result<T, RedisStoreError>;

impl From<redis::RedisError> for RedisStoreError {
    fn from(err: redis::RedisError) -> Self {
        let message = err.to_string();
        match err.kind() {
            redis::ErrorKind::InvalidClientConfig => RedisStoreError::ConfigError { message },
            redis::ErrorKind::IoError | redis::ErrorKind::AuthenticationFailed => {
                RedisStoreError::ConnectionError { message }
            }
            _ if err.is_connection_dropped() || err.is_timeout() => {
                RedisStoreError::ConnectionError { message }
            }
            _ => RedisStoreError::CommandError { message },
        }
    }
}

impl From<RedisStoreError> for StoreError {
    fn from(err: RedisStoreError) -> Self {
        match err {
            RedisStoreError::NotConnected => StoreError::NotStarted,
            RedisStoreError::ConnectionError { message }
            | RedisStoreError::ConfigError { message } => StoreError::Connection(message),
            RedisStoreError::CommandError { message } => StoreError::Command(message),
        }
    }
}

pub(crate) fn map_redis_err(err: redis::RedisError) -> StoreError {
    RedisStoreError::from(err).into()
}
