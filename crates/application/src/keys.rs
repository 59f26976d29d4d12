//! 存储键派生
//!
//! 所有键都位于同一个前缀命名空间下：
//! - 频道成员集合 `{prefix}:channel:{name}:{sid}`
//! - 用户已加入频道集合 `{prefix}:user:{uid}:{sid}`
//! - 单人（ones）频道集合 `{prefix}:channel:user:{id}:{sid}`

use std::collections::HashMap;

use domain::{ServerId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelKeys {
    prefix: String,
}

impl ChannelKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 频道在某个前端服务器上的成员集合键
    pub fn channel_key(&self, name: &str, sid: &ServerId) -> String {
        format!("{}:channel:{}:{}", self.prefix, name, sid)
    }

    /// 用户在某个前端服务器上加入的频道集合键
    pub fn user_key(&self, uid: &UserId, sid: &ServerId) -> String {
        format!("{}:user:{}:{}", self.prefix, uid, sid)
    }

    /// 单人频道的成员集合键
    pub fn ones_channel_key(&self, ones_id: &str, sid: &ServerId) -> String {
        format!("{}:channel:user:{}:{}", self.prefix, ones_id, sid)
    }

    /// 匹配命名空间下所有键的模式
    pub fn clean_pattern(&self) -> String {
        format!("{}*", self.prefix)
    }

    /// 为每个服务器生成房间频道和单人频道的成员集合键
    pub fn channels_by_servers_rooms_ones(
        &self,
        servers: &[ServerId],
        room_ids: &[String],
        ones_ids: &[String],
    ) -> HashMap<ServerId, Vec<String>> {
        servers
            .iter()
            .map(|sid| {
                let keys = room_ids
                    .iter()
                    .map(|room| self.channel_key(room, sid))
                    .chain(ones_ids.iter().map(|ones| self.ones_channel_key(ones, sid)))
                    .collect();
                (sid.clone(), keys)
            })
            .collect()
    }

    /// 为每个服务器生成给定频道名的成员集合键
    pub fn channel_keys_by_names(
        &self,
        servers: &[ServerId],
        names: &[String],
    ) -> HashMap<ServerId, Vec<String>> {
        servers
            .iter()
            .map(|sid| {
                let keys = names.iter().map(|name| self.channel_key(name, sid)).collect();
                (sid.clone(), keys)
            })
            .collect()
    }
}
