//! 固定服务器表
//!
//! 宿主应用没有提供动态注册表时，用一份静态列表描述集群中的服务器。

use std::collections::HashMap;

use application::ServerRegistry;
use domain::{ServerDescriptor, ServerId};

#[derive(Debug, Clone, Default)]
pub struct StaticServerRegistry {
    servers: Vec<ServerDescriptor>,
}

impl StaticServerRegistry {
    pub fn new(servers: Vec<ServerDescriptor>) -> Self {
        let mut registry = Self::default();
        for server in servers {
            registry.register(server);
        }
        registry
    }

    /// 注册服务器，相同 id 的旧描述会被替换
    pub fn register(&mut self, server: ServerDescriptor) {
        match self.servers.iter_mut().find(|s| s.id == server.id) {
            Some(existing) => *existing = server,
            None => self.servers.push(server),
        }
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

impl ServerRegistry for StaticServerRegistry {
    fn servers_by_type(&self, server_type: &str) -> Vec<ServerDescriptor> {
        self.servers
            .iter()
            .filter(|s| s.server_type == server_type)
            .cloned()
            .collect()
    }

    fn all_servers(&self) -> HashMap<ServerId, ServerDescriptor> {
        self.servers
            .iter()
            .map(|s| (s.id.clone(), s.clone()))
            .collect()
    }
}
