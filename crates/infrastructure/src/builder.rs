use std::sync::Arc;

use application::{
    ChannelError, ChannelRemote, ChannelServiceOptions, GlobalChannelService, ServerRegistry,
};
use config::{ChannelConfig, ConfigError};
use thiserror::Error;
use tracing::info;

use crate::redis::RedisChannelStore;

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("channel service error: {0}")]
    Channel(#[from] ChannelError),
}

/// 由配置组装出的 Redis 存储与全局频道服务
#[derive(Clone)]
pub struct Infrastructure {
    pub store: Arc<RedisChannelStore>,
    pub channel_service: Arc<GlobalChannelService>,
}

impl Infrastructure {
    /// 只组装不连接，服务处于 INITED 状态
    pub fn build(
        config: &ChannelConfig,
        registry: Arc<dyn ServerRegistry>,
        remote: Arc<dyn ChannelRemote>,
    ) -> Result<Self, InfrastructureError> {
        config.validate()?;

        let store = Arc::new(RedisChannelStore::new(
            config.redis.clone(),
            config.prefix.clone(),
            registry.clone(),
        ));
        let channel_service = Arc::new(GlobalChannelService::new(
            store.clone(),
            registry,
            remote,
            options_from_config(config),
        ));

        Ok(Self {
            store,
            channel_service,
        })
    }

    /// 组装并启动频道服务
    pub async fn connect(
        config: &ChannelConfig,
        registry: Arc<dyn ServerRegistry>,
        remote: Arc<dyn ChannelRemote>,
    ) -> Result<Self, InfrastructureError> {
        let infra = Self::build(config, registry, remote)?;
        infra.channel_service.start().await?;

        info!(config = %config.sanitized(), "global channel infrastructure ready");
        Ok(infra)
    }
}

pub fn options_from_config(config: &ChannelConfig) -> ChannelServiceOptions {
    ChannelServiceOptions {
        clean_on_startup: config.clean_on_startup,
        rpc_timeout: config.rpc_timeout(),
    }
}
