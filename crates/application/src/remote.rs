use async_trait::async_trait;
use domain::{RemoteRequest, ServerId, UserId};

use crate::error::RpcError;

/// 宿主应用的远程调用能力
#[async_trait]
pub trait ChannelRemote: Send + Sync {
    /// 在指定服务器上执行推送调用，返回投递失败的用户
    async fn invoke(
        &self,
        server_id: &ServerId,
        request: RemoteRequest,
    ) -> Result<Vec<UserId>, RpcError>;
}
