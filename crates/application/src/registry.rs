use std::collections::HashMap;

use domain::{ServerDescriptor, ServerId};

/// 宿主应用的服务器注册表
///
/// 频道服务只通过它枚举服务器，不持有也不修改服务器信息。
pub trait ServerRegistry: Send + Sync {
    /// 按类型列出服务器
    fn servers_by_type(&self, server_type: &str) -> Vec<ServerDescriptor>;

    /// 列出全部服务器
    fn all_servers(&self) -> HashMap<ServerId, ServerDescriptor>;

    fn is_frontend(&self, server: &ServerDescriptor) -> bool {
        server.frontend
    }

    /// 所有前端服务器的标识
    fn frontend_server_ids(&self) -> Vec<ServerId> {
        self.all_servers()
            .into_values()
            .filter(|server| self.is_frontend(server))
            .map(|server| server.id)
            .collect()
    }
}
