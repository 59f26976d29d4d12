//! 全局频道服务
//!
//! 在成员存储之上增加生命周期守卫（INITED -> STARTED -> CLOSED）和跨前端服务器的广播编排。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use domain::{ServerId, UserId};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::error::{ChannelError, ChannelResult, StoreError};
use crate::fan_out::PushFanOut;
use crate::latch::CountDownLatch;
use crate::registry::ServerRegistry;
use crate::remote::ChannelRemote;
use crate::store::ChannelStore;

/// 服务生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Inited = 0,
    Started = 1,
    Closed = 2,
}

impl From<u8> for ServiceState {
    fn from(value: u8) -> Self {
        match value {
            0 => ServiceState::Inited,
            1 => ServiceState::Started,
            _ => ServiceState::Closed,
        }
    }
}

/// 默认的单服务器任务超时
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_millis(10_000);

/// 服务选项
#[derive(Debug, Clone)]
pub struct ChannelServiceOptions {
    /// 启动成功后清空存储命名空间
    pub clean_on_startup: bool,
    /// 单个服务器任务的超时时间，`None` 表示不限时
    pub rpc_timeout: Option<Duration>,
}

impl Default for ChannelServiceOptions {
    fn default() -> Self {
        Self {
            clean_on_startup: false,
            rpc_timeout: Some(DEFAULT_RPC_TIMEOUT),
        }
    }
}

type MembersSender = Arc<Mutex<Option<oneshot::Sender<ChannelResult<Vec<UserId>>>>>>;

pub struct GlobalChannelService {
    store: Arc<dyn ChannelStore>,
    registry: Arc<dyn ServerRegistry>,
    remote: Arc<dyn ChannelRemote>,
    options: ChannelServiceOptions,
    state: AtomicU8,
}

impl GlobalChannelService {
    pub fn new(
        store: Arc<dyn ChannelStore>,
        registry: Arc<dyn ServerRegistry>,
        remote: Arc<dyn ChannelRemote>,
        options: ChannelServiceOptions,
    ) -> Self {
        Self {
            store,
            registry,
            remote,
            options,
            state: AtomicU8::new(ServiceState::Inited as u8),
        }
    }

    pub fn state(&self) -> ServiceState {
        ServiceState::from(self.state.load(Ordering::Acquire))
    }

    fn ensure_started(&self) -> ChannelResult<()> {
        if self.state() == ServiceState::Started {
            Ok(())
        } else {
            Err(ChannelError::InvalidState)
        }
    }

    /// 启动存储连接；配置了启动清理时在就绪前清空命名空间
    pub async fn start(&self) -> ChannelResult<()> {
        if self.state() != ServiceState::Inited {
            return Err(ChannelError::InvalidState);
        }

        self.store.start().await?;

        self.state
            .compare_exchange(
                ServiceState::Inited as u8,
                ServiceState::Started as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| ChannelError::InvalidState)?;

        if self.options.clean_on_startup {
            self.store.clean().await?;
            info!(prefix = %self.store.keys().prefix(), "global channel store cleaned on startup");
        }

        info!("global channel service started");
        Ok(())
    }

    /// 任意状态下都可调用，先进入 CLOSED 再释放存储连接
    pub async fn stop(&self) -> ChannelResult<()> {
        self.state
            .store(ServiceState::Closed as u8, Ordering::Release);
        self.store.stop().await?;
        info!("global channel service stopped");
        Ok(())
    }

    pub async fn destroy_channel(&self, name: &str) -> ChannelResult<()> {
        self.ensure_started()?;
        Ok(self.store.destroy_channel(name).await?)
    }

    pub async fn add(&self, name: &str, uid: &UserId, sid: &ServerId) -> ChannelResult<()> {
        self.ensure_started()?;
        Ok(self.store.add(name, uid, sid).await?)
    }

    pub async fn leave(&self, name: &str, uid: &UserId, sid: &ServerId) -> ChannelResult<()> {
        self.ensure_started()?;
        Ok(self.store.leave(name, uid, sid).await?)
    }

    pub async fn leave_all(&self, uid: &UserId, sid: &ServerId) -> ChannelResult<()> {
        self.ensure_started()?;
        Ok(self.store.leave_all(uid, sid).await?)
    }

    pub async fn get_members_by_sid(
        &self,
        name: &str,
        sid: &ServerId,
    ) -> ChannelResult<Vec<UserId>> {
        self.ensure_started()?;
        Ok(self.store.get_members_by_sid(name, sid).await?)
    }

    /// 用户在指定服务器上加入的频道
    pub async fn get_channels_by_uid(
        &self,
        uid: &UserId,
        sid: &ServerId,
    ) -> ChannelResult<Vec<String>> {
        self.ensure_started()?;
        Ok(self.store.get_channels_by_uid(uid, sid).await?)
    }

    /// 汇总频道在某类服务器上的全部成员
    ///
    /// 任一服务器查询失败时立即返回该错误，其余任务照常完成计数。
    pub async fn get_members_by_channel_name(
        &self,
        server_type: &str,
        name: &str,
    ) -> ChannelResult<Vec<UserId>> {
        self.ensure_started()?;

        let servers = self.registry.servers_by_type(server_type);
        if servers.is_empty() {
            return Ok(Vec::new());
        }

        let members = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = oneshot::channel();
        let sender: MembersSender = Arc::new(Mutex::new(Some(tx)));

        let finisher_members = members.clone();
        let finisher_sender = sender.clone();
        let latch = Arc::new(CountDownLatch::new(servers.len(), move || {
            let collected = std::mem::take(
                &mut *finisher_members
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            send_once(&finisher_sender, Ok(collected));
        }));

        for server in servers {
            let store = self.store.clone();
            let name = name.to_string();
            let timeout = self.options.rpc_timeout;
            let members = members.clone();
            let sender = sender.clone();
            let latch = latch.clone();
            tokio::spawn(async move {
                let sid = server.id;
                let lookup = store.get_members_by_sid(&name, &sid);
                let result = match timeout {
                    Some(limit) => tokio::time::timeout(limit, lookup)
                        .await
                        .unwrap_or_else(|_| {
                            Err(StoreError::connection(format!(
                                "get members from {sid} timed out"
                            )))
                        }),
                    None => lookup.await,
                };
                match result {
                    Ok(list) => members
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend(list),
                    Err(e) => send_once(&sender, Err(e.into())),
                }
                latch.done();
            });
        }
        drop(latch);

        rx.await
            .map_err(|_| ChannelError::internal("member lookup tasks exited before completion"))?
    }

    /// 通过单个频道推送消息
    ///
    /// 返回投递失败的用户；所有服务器都推送失败时返回 `AllServersFailed`。
    pub async fn push_message(
        &self,
        server_type: &str,
        route: &str,
        msg: Value,
        channel_name: &str,
    ) -> ChannelResult<Vec<UserId>> {
        self.ensure_started()?;

        let server_ids = self.server_ids_by_type(server_type);
        if server_ids.is_empty() {
            debug!(server_type = %server_type, "no frontend servers, nothing to push");
            return Ok(Vec::new());
        }

        let store = self.store.clone();
        let name = channel_name.to_string();
        PushFanOut::new(self.remote.clone(), self.options.rpc_timeout, route, msg)
            .run(server_ids, move |sid| {
                let store = store.clone();
                let name = name.clone();
                async move { store.get_members_by_sid(&name, &sid).await }
            })
            .await
    }

    /// 推送给与 `uid` 同在房间或单人频道中的在线用户，不包括 `uid` 自己
    pub async fn push_message_to_related_users(
        &self,
        server_type: &str,
        room_ids: &[String],
        ones_ids: &[String],
        route: &str,
        msg: Value,
        uid: &UserId,
    ) -> ChannelResult<Vec<UserId>> {
        self.ensure_started()?;

        let server_ids = self.server_ids_by_type(server_type);
        if server_ids.is_empty() {
            return Ok(Vec::new());
        }

        let channels = self
            .store
            .get_channels_by_servers_rooms_ones(&server_ids, room_ids, ones_ids);
        let users = self
            .store
            .get_members_by_multi_channel(&server_ids, &channels, Some(uid))
            .await?;

        self.push_to_resolved(server_ids, users, route, msg).await
    }

    /// 推送给多个频道的成员并集
    pub async fn push_message_to_multiple_channels(
        &self,
        server_type: &str,
        route: &str,
        msg: Value,
        channel_names: &[String],
    ) -> ChannelResult<Vec<UserId>> {
        self.ensure_started()?;

        let server_ids = self.server_ids_by_type(server_type);
        if server_ids.is_empty() {
            return Ok(Vec::new());
        }

        let channels = self
            .store
            .get_channel_keys_by_channel_names(&server_ids, channel_names);
        let users = self
            .store
            .get_members_by_multi_channel(&server_ids, &channels, None)
            .await?;

        self.push_to_resolved(server_ids, users, route, msg).await
    }

    async fn push_to_resolved(
        &self,
        server_ids: Vec<ServerId>,
        users: HashMap<ServerId, Vec<UserId>>,
        route: &str,
        msg: Value,
    ) -> ChannelResult<Vec<UserId>> {
        if users.values().all(Vec::is_empty) {
            debug!(route = %route, "no related users online, nothing to push");
            return Ok(Vec::new());
        }

        let users = Arc::new(users);
        PushFanOut::new(self.remote.clone(), self.options.rpc_timeout, route, msg)
            .run(server_ids, move |sid| {
                let uids = users.get(&sid).cloned().unwrap_or_default();
                async move { Ok::<_, StoreError>(uids) }
            })
            .await
    }

    fn server_ids_by_type(&self, server_type: &str) -> Vec<ServerId> {
        self.registry
            .servers_by_type(server_type)
            .into_iter()
            .map(|server| server.id)
            .collect()
    }
}

fn send_once(sender: &MembersSender, result: ChannelResult<Vec<UserId>>) {
    let tx = sender.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(tx) = tx {
        let _ = tx.send(result);
    }
}
