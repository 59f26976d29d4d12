use domain::ServerId;
use thiserror::Error;

/// 全局频道服务错误
#[derive(Debug, Error)]
pub enum ChannelError {
    /// 服务未处于 STARTED 状态，或重复调用 start
    #[error("invalid state")]
    InvalidState,
    /// 存储连接或命令失败，原样透传给调用方
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// 所有前端服务器推送都失败（部分失败不算错误）
    #[error("all frontend server push message fail")]
    AllServersFailed,
    /// 扇出任务全部异常退出，没有产生结果
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChannelError {
    pub fn internal(message: impl Into<String>) -> Self {
        ChannelError::Internal(message.into())
    }
}

/// 成员存储错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// 存储尚未启动或已经停止
    #[error("store connection is not started")]
    NotStarted,
    /// 网络或连接错误
    #[error("store connection error: {0}")]
    Connection(String),
    /// 存储命令执行失败
    #[error("store command failed: {0}")]
    Command(String),
}

impl StoreError {
    pub fn connection(message: impl Into<String>) -> Self {
        StoreError::Connection(message.into())
    }

    pub fn command(message: impl Into<String>) -> Self {
        StoreError::Command(message.into())
    }
}

/// 单个服务器的远程调用错误，只记录日志，不会中断其它服务器的推送
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    #[error("rpc to {server_id} failed: {message}")]
    Failed { server_id: ServerId, message: String },
    #[error("rpc to {server_id} timed out")]
    Timeout { server_id: ServerId },
}

impl RpcError {
    pub fn failed(server_id: ServerId, message: impl Into<String>) -> Self {
        RpcError::Failed {
            server_id,
            message: message.into(),
        }
    }
}

pub type ChannelResult<T> = Result<T, ChannelError>;
pub type StoreResult<T> = Result<T, StoreError>;
