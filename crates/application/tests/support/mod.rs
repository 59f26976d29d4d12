//! 频道服务测试用的假实现：服务器注册表、远程推送、可注入故障的存储

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use application::{
    ChannelKeys, ChannelRemote, ChannelServiceOptions, ChannelStore, GlobalChannelService,
    MemoryChannelStore, RpcError, ServerRegistry, StoreError, StoreResult,
};
use async_trait::async_trait;
use domain::{RemoteRequest, ServerDescriptor, ServerId, UserId};

pub const PREFIX: &str = "TEST:CHANNEL";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn uids(ids: &[&str]) -> Vec<UserId> {
    ids.iter().map(|id| UserId::from(*id)).collect()
}

pub fn sorted(mut list: Vec<UserId>) -> Vec<UserId> {
    list.sort();
    list
}

/// 固定服务器列表的注册表
pub struct FakeRegistry {
    servers: Vec<ServerDescriptor>,
}

impl FakeRegistry {
    pub fn new(servers: Vec<ServerDescriptor>) -> Self {
        Self { servers }
    }

    /// `connector` 类型的前端服务器
    pub fn connectors(ids: &[&str]) -> Self {
        Self::new(
            ids.iter()
                .map(|id| ServerDescriptor::frontend(*id, "connector"))
                .collect(),
        )
    }
}

impl ServerRegistry for FakeRegistry {
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

/// 远程推送的模拟行为
#[derive(Debug, Clone)]
pub enum RemoteBehavior {
    /// 推送成功，返回投递失败的用户
    Deliver(Vec<UserId>),
    /// 推送调用失败
    Fail,
    /// 永不返回
    Hang,
}

/// 记录每次调用的远程推送
#[derive(Default)]
pub struct FakeRemote {
    behaviors: Mutex<HashMap<ServerId, RemoteBehavior>>,
    calls: Mutex<Vec<(ServerId, RemoteRequest)>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, sid: &str, behavior: RemoteBehavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(ServerId::from(sid), behavior);
    }

    pub fn calls(&self) -> Vec<(ServerId, RemoteRequest)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_servers(&self) -> Vec<ServerId> {
        let mut servers: Vec<_> = self.calls().into_iter().map(|(sid, _)| sid).collect();
        servers.sort();
        servers
    }

    /// 某个服务器收到的推送用户（排序后）
    pub fn pushed_uids(&self, sid: &str) -> Option<Vec<UserId>> {
        self.calls()
            .into_iter()
            .find(|(called, _)| called.as_str() == sid)
            .map(|(_, request)| sorted(request.args.uids))
    }
}

#[async_trait]
impl ChannelRemote for FakeRemote {
    async fn invoke(
        &self,
        server_id: &ServerId,
        request: RemoteRequest,
    ) -> Result<Vec<UserId>, RpcError> {
        self.calls
            .lock()
            .unwrap()
            .push((server_id.clone(), request));
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(server_id)
            .cloned()
            .unwrap_or(RemoteBehavior::Deliver(Vec::new()));

        match behavior {
            RemoteBehavior::Deliver(failed) => Ok(failed),
            RemoteBehavior::Fail => Err(RpcError::failed(server_id.clone(), "connection reset")),
            RemoteBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
        }
    }
}

/// 包装内存存储，可按服务器注入成员查询失败
pub struct FlakyStore {
    inner: MemoryChannelStore,
    failing_sids: Mutex<HashSet<ServerId>>,
    failing_multi: Mutex<bool>,
}

impl FlakyStore {
    pub fn new(registry: Arc<dyn ServerRegistry>) -> Self {
        Self {
            inner: MemoryChannelStore::new(PREFIX, registry),
            failing_sids: Mutex::new(HashSet::new()),
            failing_multi: Mutex::new(false),
        }
    }

    pub fn fail_members_on(&self, sid: &str) {
        self.failing_sids
            .lock()
            .unwrap()
            .insert(ServerId::from(sid));
    }

    pub fn fail_multi_channel(&self) {
        *self.failing_multi.lock().unwrap() = true;
    }
}

#[async_trait]
impl ChannelStore for FlakyStore {
    async fn start(&self) -> StoreResult<()> {
        self.inner.start().await
    }

    async fn stop(&self) -> StoreResult<()> {
        self.inner.stop().await
    }

    async fn clean(&self) -> StoreResult<()> {
        self.inner.clean().await
    }

    async fn add(&self, name: &str, uid: &UserId, sid: &ServerId) -> StoreResult<()> {
        self.inner.add(name, uid, sid).await
    }

    async fn leave(&self, name: &str, uid: &UserId, sid: &ServerId) -> StoreResult<()> {
        self.inner.leave(name, uid, sid).await
    }

    async fn leave_all(&self, uid: &UserId, sid: &ServerId) -> StoreResult<()> {
        self.inner.leave_all(uid, sid).await
    }

    async fn destroy_channel(&self, name: &str) -> StoreResult<()> {
        self.inner.destroy_channel(name).await
    }

    async fn get_members_by_sid(&self, name: &str, sid: &ServerId) -> StoreResult<Vec<UserId>> {
        if self.failing_sids.lock().unwrap().contains(sid) {
            return Err(StoreError::connection("connection refused"));
        }
        self.inner.get_members_by_sid(name, sid).await
    }

    async fn get_channels_by_uid(&self, uid: &UserId, sid: &ServerId) -> StoreResult<Vec<String>> {
        self.inner.get_channels_by_uid(uid, sid).await
    }

    async fn get_members_by_multi_channel(
        &self,
        server_ids: &[ServerId],
        channels: &HashMap<ServerId, Vec<String>>,
        exclude: Option<&UserId>,
    ) -> StoreResult<HashMap<ServerId, Vec<UserId>>> {
        if *self.failing_multi.lock().unwrap() {
            return Err(StoreError::connection("connection refused"));
        }
        self.inner
            .get_members_by_multi_channel(server_ids, channels, exclude)
            .await
    }

    fn keys(&self) -> &ChannelKeys {
        self.inner.keys()
    }
}

/// 组装好的测试环境
pub struct TestHarness {
    pub service: Arc<GlobalChannelService>,
    pub store: Arc<FlakyStore>,
    pub remote: Arc<FakeRemote>,
}

impl TestHarness {
    pub fn new(registry: FakeRegistry) -> Self {
        Self::with_options(
            registry,
            ChannelServiceOptions {
                clean_on_startup: false,
                rpc_timeout: Some(Duration::from_secs(5)),
            },
        )
    }

    pub fn with_options(registry: FakeRegistry, options: ChannelServiceOptions) -> Self {
        init_tracing();
        let registry: Arc<dyn ServerRegistry> = Arc::new(registry);
        let store = Arc::new(FlakyStore::new(registry.clone()));
        let remote = Arc::new(FakeRemote::new());
        let service = Arc::new(GlobalChannelService::new(
            store.clone(),
            registry,
            remote.clone(),
            options,
        ));
        Self {
            service,
            store,
            remote,
        }
    }

    /// 创建并启动
    pub async fn started(registry: FakeRegistry) -> Self {
        let harness = Self::new(registry);
        harness.service.start().await.unwrap();
        harness
    }
}
