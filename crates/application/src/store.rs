//! 频道成员存储
//!
//! 每个前端服务器维护两组互为镜像的集合：
//! 频道 -> 成员（正向索引）与 用户 -> 已加入频道（反向索引）。

use std::collections::HashMap;

use async_trait::async_trait;
use domain::{ServerId, UserId};

use crate::error::StoreResult;
use crate::keys::ChannelKeys;

#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// 建立存储连接
    async fn start(&self) -> StoreResult<()>;

    /// 释放存储连接，可重复调用
    async fn stop(&self) -> StoreResult<()>;

    /// 删除命名空间下的所有键，仅用于启动时清理
    async fn clean(&self) -> StoreResult<()>;

    /// 把用户加入频道，同时写入正向与反向索引
    async fn add(&self, name: &str, uid: &UserId, sid: &ServerId) -> StoreResult<()>;

    /// 把用户移出频道，同时更新正向与反向索引
    async fn leave(&self, name: &str, uid: &UserId, sid: &ServerId) -> StoreResult<()>;

    /// 把用户移出其在该服务器上加入的所有频道，并删除反向索引
    async fn leave_all(&self, uid: &UserId, sid: &ServerId) -> StoreResult<()>;

    /// 删除频道在所有前端服务器上的成员集合，不清理反向索引
    async fn destroy_channel(&self, name: &str) -> StoreResult<()>;

    /// 频道在指定服务器上的成员，不存在时返回空
    async fn get_members_by_sid(&self, name: &str, sid: &ServerId) -> StoreResult<Vec<UserId>>;

    /// 用户在指定服务器上加入的频道（反向索引）
    async fn get_channels_by_uid(&self, uid: &UserId, sid: &ServerId) -> StoreResult<Vec<String>>;

    /// 按服务器求多个频道成员集合的并集，并去掉 `exclude`
    async fn get_members_by_multi_channel(
        &self,
        server_ids: &[ServerId],
        channels: &HashMap<ServerId, Vec<String>>,
        exclude: Option<&UserId>,
    ) -> StoreResult<HashMap<ServerId, Vec<UserId>>>;

    fn keys(&self) -> &ChannelKeys;

    fn get_channels_by_servers_rooms_ones(
        &self,
        servers: &[ServerId],
        room_ids: &[String],
        ones_ids: &[String],
    ) -> HashMap<ServerId, Vec<String>> {
        self.keys()
            .channels_by_servers_rooms_ones(servers, room_ids, ones_ids)
    }

    fn get_channel_keys_by_channel_names(
        &self,
        servers: &[ServerId],
        names: &[String],
    ) -> HashMap<ServerId, Vec<String>> {
        self.keys().channel_keys_by_names(servers, names)
    }
}

/// 内存实现的成员存储（用于测试和单进程部署）
///
/// 与 Redis 集合语义保持一致：集合为空时键被删除。
pub mod memory {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use tokio::sync::RwLock;

    use crate::error::StoreError;
    use crate::registry::ServerRegistry;

    pub struct MemoryChannelStore {
        keys: ChannelKeys,
        registry: Arc<dyn ServerRegistry>,
        sets: RwLock<HashMap<String, HashSet<String>>>,
        started: AtomicBool,
    }

    impl MemoryChannelStore {
        pub fn new(prefix: impl Into<String>, registry: Arc<dyn ServerRegistry>) -> Self {
            Self {
                keys: ChannelKeys::new(prefix),
                registry,
                sets: RwLock::new(HashMap::new()),
                started: AtomicBool::new(false),
            }
        }

        /// 当前存在的键数量
        pub async fn key_count(&self) -> usize {
            self.sets.read().await.len()
        }

        /// 直接写入一个集合成员，绕过双索引（用于构造测试数据）
        pub async fn insert_raw(&self, key: impl Into<String>, member: impl Into<String>) {
            self.sets
                .write()
                .await
                .entry(key.into())
                .or_default()
                .insert(member.into());
        }

        fn ensure_started(&self) -> StoreResult<()> {
            if self.started.load(Ordering::Acquire) {
                Ok(())
            } else {
                Err(StoreError::NotStarted)
            }
        }

        fn remove_member(sets: &mut HashMap<String, HashSet<String>>, key: &str, member: &str) {
            if let Some(set) = sets.get_mut(key) {
                set.remove(member);
                if set.is_empty() {
                    sets.remove(key);
                }
            }
        }

        fn members_of(sets: &HashMap<String, HashSet<String>>, key: &str) -> Vec<String> {
            sets.get(key)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChannelStore for MemoryChannelStore {
        async fn start(&self) -> StoreResult<()> {
            self.started.store(true, Ordering::Release);
            Ok(())
        }

        async fn stop(&self) -> StoreResult<()> {
            self.started.store(false, Ordering::Release);
            Ok(())
        }

        async fn clean(&self) -> StoreResult<()> {
            self.ensure_started()?;
            let prefix = self.keys.prefix();
            self.sets
                .write()
                .await
                .retain(|key, _| !key.starts_with(prefix));
            Ok(())
        }

        async fn add(&self, name: &str, uid: &UserId, sid: &ServerId) -> StoreResult<()> {
            self.ensure_started()?;
            let mut sets = self.sets.write().await;
            sets.entry(self.keys.channel_key(name, sid))
                .or_default()
                .insert(uid.to_string());
            sets.entry(self.keys.user_key(uid, sid))
                .or_default()
                .insert(name.to_string());
            Ok(())
        }

        async fn leave(&self, name: &str, uid: &UserId, sid: &ServerId) -> StoreResult<()> {
            self.ensure_started()?;
            let mut sets = self.sets.write().await;
            Self::remove_member(&mut sets, &self.keys.channel_key(name, sid), uid.as_str());
            Self::remove_member(&mut sets, &self.keys.user_key(uid, sid), name);
            Ok(())
        }

        async fn leave_all(&self, uid: &UserId, sid: &ServerId) -> StoreResult<()> {
            self.ensure_started()?;
            let mut sets = self.sets.write().await;
            let user_key = self.keys.user_key(uid, sid);
            let channels = sets.remove(&user_key).unwrap_or_default();
            for name in channels {
                Self::remove_member(&mut sets, &self.keys.channel_key(&name, sid), uid.as_str());
            }
            Ok(())
        }

        async fn destroy_channel(&self, name: &str) -> StoreResult<()> {
            self.ensure_started()?;
            let frontends = self.registry.frontend_server_ids();
            let mut sets = self.sets.write().await;
            for sid in frontends {
                sets.remove(&self.keys.channel_key(name, &sid));
            }
            Ok(())
        }

        async fn get_members_by_sid(
            &self,
            name: &str,
            sid: &ServerId,
        ) -> StoreResult<Vec<UserId>> {
            self.ensure_started()?;
            let sets = self.sets.read().await;
            Ok(Self::members_of(&sets, &self.keys.channel_key(name, sid))
                .into_iter()
                .map(UserId::from)
                .collect())
        }

        async fn get_channels_by_uid(
            &self,
            uid: &UserId,
            sid: &ServerId,
        ) -> StoreResult<Vec<String>> {
            self.ensure_started()?;
            let sets = self.sets.read().await;
            Ok(Self::members_of(&sets, &self.keys.user_key(uid, sid)))
        }

        async fn get_members_by_multi_channel(
            &self,
            server_ids: &[ServerId],
            channels: &HashMap<ServerId, Vec<String>>,
            exclude: Option<&UserId>,
        ) -> StoreResult<HashMap<ServerId, Vec<UserId>>> {
            self.ensure_started()?;
            let sets = self.sets.read().await;
            let mut users = HashMap::with_capacity(server_ids.len());
            for sid in server_ids {
                let mut union: HashSet<&str> = channels
                    .get(sid)
                    .into_iter()
                    .flatten()
                    .filter_map(|key| sets.get(key))
                    .flatten()
                    .map(String::as_str)
                    .collect();
                if let Some(uid) = exclude {
                    union.remove(uid.as_str());
                }
                users.insert(sid.clone(), union.into_iter().map(UserId::from).collect());
            }
            Ok(users)
        }

        fn keys(&self) -> &ChannelKeys {
            &self.keys
        }
    }
}
