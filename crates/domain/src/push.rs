//! 推送到前端服务器的远程调用负载

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value_objects::UserId;

/// 前端推送服务所在的命名空间
pub const PUSH_NAMESPACE: &str = "sys";
/// 前端推送服务名
pub const PUSH_SERVICE: &str = "channelRemote";
/// 前端推送方法名
pub const PUSH_METHOD: &str = "pushMessage";

/// 推送选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushOptions {
    #[serde(rename = "isPush")]
    pub is_push: bool,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self { is_push: true }
    }
}

/// `pushMessage(route, msg, uids, opts)` 的参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushArgs {
    pub route: String,
    pub msg: Value,
    pub uids: Vec<UserId>,
    pub opts: PushOptions,
}

/// 发往单个服务器的远程调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub namespace: String,
    pub service: String,
    pub method: String,
    pub args: PushArgs,
}

impl RemoteRequest {
    /// 构造对前端 `sys.channelRemote.pushMessage` 的调用
    pub fn push_message(route: impl Into<String>, msg: Value, uids: Vec<UserId>) -> Self {
        Self {
            namespace: PUSH_NAMESPACE.to_string(),
            service: PUSH_SERVICE.to_string(),
            method: PUSH_METHOD.to_string(),
            args: PushArgs {
                route: route.into(),
                msg,
                uids,
                opts: PushOptions::default(),
            },
        }
    }
}
