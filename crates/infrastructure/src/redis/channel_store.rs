//! Redis 实现的频道成员存储
//!
//! 正向索引和反向索引都是 Redis Set，多键修改通过 MULTI/EXEC 管道一次提交。

use std::collections::HashMap;
use std::sync::Arc;

use application::{ChannelKeys, ChannelStore, ServerRegistry, StoreResult};
use async_trait::async_trait;
use config::RedisConfig;
use domain::{ServerId, UserId};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::error::{map_redis_err, RedisStoreError};

pub struct RedisChannelStore {
    config: RedisConfig,
    keys: ChannelKeys,
    registry: Arc<dyn ServerRegistry>,
    connection: RwLock<Option<MultiplexedConnection>>,
}

impl RedisChannelStore {
    pub fn new(
        config: RedisConfig,
        prefix: impl Into<String>,
        registry: Arc<dyn ServerRegistry>,
    ) -> Self {
        Self {
            config,
            keys: ChannelKeys::new(prefix),
            registry,
            connection: RwLock::new(None),
        }
    }

    /// 获取连接（多路复用连接克隆成本很低）
    async fn get_connection(&self) -> StoreResult<MultiplexedConnection> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or_else(|| RedisStoreError::NotConnected.into())
    }
}

/// 由配置字段直接构造连接参数，密码不经过 URL 编码
pub fn connection_info(config: &RedisConfig) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
        redis: RedisConnectionInfo {
            db: config.db,
            password: config.auth_pass.clone(),
            ..RedisConnectionInfo::default()
        },
    }
}

#[async_trait]
impl ChannelStore for RedisChannelStore {
    async fn start(&self) -> StoreResult<()> {
        if self.connection.read().await.is_some() {
            debug!("redis channel store already connected");
            return Ok(());
        }

        // 连接建立期间不持有锁
        let client = redis::Client::open(connection_info(&self.config)).map_err(map_redis_err)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_err)?;

        let mut slot = self.connection.write().await;
        if slot.is_some() {
            debug!("redis channel store connected concurrently, dropping extra connection");
            return Ok(());
        }
        *slot = Some(conn);

        info!(
            host = %self.config.host,
            port = self.config.port,
            db = self.config.db,
            "redis channel store connected"
        );
        Ok(())
    }

    async fn stop(&self) -> StoreResult<()> {
        if self.connection.write().await.take().is_some() {
            info!("redis channel store connection released");
        }
        Ok(())
    }

    async fn clean(&self) -> StoreResult<()> {
        let mut conn = self.get_connection().await?;
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(self.keys.clean_pattern())
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;

        if keys.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in &keys {
            pipe.del(key).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(map_redis_err)?;

        info!(prefix = %self.keys.prefix(), removed = keys.len(), "channel namespace cleaned");
        Ok(())
    }

    async fn add(&self, name: &str, uid: &UserId, sid: &ServerId) -> StoreResult<()> {
        let mut conn = self.get_connection().await?;
        let channel_key = self.keys.channel_key(name, sid);
        let user_key = self.keys.user_key(uid, sid);

        let _: () = redis::pipe()
            .atomic()
            .sadd(&channel_key, uid.as_str()) // 频道成员集合
            .ignore()
            .sadd(&user_key, name) // 用户已加入频道集合
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;

        debug!(channel = %name, uid = %uid, sid = %sid, "user joined channel");
        Ok(())
    }

    async fn leave(&self, name: &str, uid: &UserId, sid: &ServerId) -> StoreResult<()> {
        let mut conn = self.get_connection().await?;
        let channel_key = self.keys.channel_key(name, sid);
        let user_key = self.keys.user_key(uid, sid);

        let _: () = redis::pipe()
            .atomic()
            .srem(&channel_key, uid.as_str())
            .ignore()
            .srem(&user_key, name)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;

        debug!(channel = %name, uid = %uid, sid = %sid, "user left channel");
        Ok(())
    }

    async fn leave_all(&self, uid: &UserId, sid: &ServerId) -> StoreResult<()> {
        let mut conn = self.get_connection().await?;
        let user_key = self.keys.user_key(uid, sid);

        let channels: Vec<String> = conn.smembers(&user_key).await.map_err(map_redis_err)?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        // 从每个频道成员集合中移除这个用户
        for name in &channels {
            pipe.srem(self.keys.channel_key(name, sid), uid.as_str())
                .ignore();
        }
        pipe.del(&user_key).ignore();

        let _: () = pipe.query_async(&mut conn).await.map_err(map_redis_err)?;

        info!(uid = %uid, sid = %sid, channels = channels.len(), "user left all channels");
        Ok(())
    }

    async fn destroy_channel(&self, name: &str) -> StoreResult<()> {
        // TODO: 同时清理受影响用户的反向索引（需要先读取各服务器上的频道成员）
        let frontends = self.registry.frontend_server_ids();
        if frontends.is_empty() {
            return Ok(());
        }

        let mut conn = self.get_connection().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for sid in &frontends {
            pipe.del(self.keys.channel_key(name, sid)).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(map_redis_err)?;

        info!(channel = %name, servers = frontends.len(), "channel destroyed");
        Ok(())
    }

    async fn get_members_by_sid(&self, name: &str, sid: &ServerId) -> StoreResult<Vec<UserId>> {
        let mut conn = self.get_connection().await?;
        let members: Vec<String> = conn
            .smembers(self.keys.channel_key(name, sid))
            .await
            .map_err(map_redis_err)?;

        Ok(members.into_iter().map(UserId::from).collect())
    }

    async fn get_channels_by_uid(&self, uid: &UserId, sid: &ServerId) -> StoreResult<Vec<String>> {
        let mut conn = self.get_connection().await?;
        let channels: Vec<String> = conn
            .smembers(self.keys.user_key(uid, sid))
            .await
            .map_err(map_redis_err)?;

        Ok(channels)
    }

    async fn get_members_by_multi_channel(
        &self,
        server_ids: &[ServerId],
        channels: &HashMap<ServerId, Vec<String>>,
        exclude: Option<&UserId>,
    ) -> StoreResult<HashMap<ServerId, Vec<UserId>>> {
        let mut users: HashMap<ServerId, Vec<UserId>> = server_ids
            .iter()
            .map(|sid| (sid.clone(), Vec::new()))
            .collect();

        // SUNION 至少需要一个键，没有频道的服务器直接得到空结果
        let mut pipe = redis::pipe();
        pipe.atomic();
        let mut queried = Vec::new();
        for sid in server_ids {
            if let Some(keys) = channels.get(sid).filter(|keys| !keys.is_empty()) {
                pipe.sunion(keys);
                queried.push(sid);
            }
        }

        if queried.is_empty() {
            return Ok(users);
        }

        let mut conn = self.get_connection().await?;
        let replies: Vec<Vec<String>> = pipe.query_async(&mut conn).await.map_err(map_redis_err)?;

        let exclude = exclude.map(UserId::as_str);
        for (sid, members) in queried.into_iter().zip(replies) {
            let members = members
                .into_iter()
                .filter(|member| Some(member.as_str()) != exclude)
                .map(UserId::from)
                .collect();
            users.insert(sid.clone(), members);
        }

        Ok(users)
    }

    fn keys(&self) -> &ChannelKeys {
        &self.keys
    }
}
