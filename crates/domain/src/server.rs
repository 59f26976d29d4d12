use serde::{Deserialize, Serialize};

use crate::value_objects::ServerId;

/// 服务器描述
///
/// 由宿主应用的服务器注册表持有，频道服务只读。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub id: ServerId,
    /// 服务器类型，例如 `connector`
    pub server_type: String,
    /// 是否为持有客户端连接的前端服务器
    #[serde(default)]
    pub frontend: bool,
}

impl ServerDescriptor {
    pub fn new(id: impl Into<ServerId>, server_type: impl Into<String>, frontend: bool) -> Self {
        Self {
            id: id.into(),
            server_type: server_type.into(),
            frontend,
        }
    }

    /// 前端服务器描述的快捷构造
    pub fn frontend(id: impl Into<ServerId>, server_type: impl Into<String>) -> Self {
        Self::new(id, server_type, true)
    }

    /// 后端服务器描述的快捷构造
    pub fn backend(id: impl Into<ServerId>, server_type: impl Into<String>) -> Self {
        Self::new(id, server_type, false)
    }
}
