//! 基础设施层实现。
//!
//! 提供 Redis 频道成员存储、静态服务器注册表，以及按配置组装全局频道服务的构建器。

pub mod builder;
pub mod redis;
pub mod registry;

pub use builder::{options_from_config, Infrastructure, InfrastructureError};
pub use self::redis::{RedisChannelStore, RedisStoreError, RedisStoreResult};
pub use registry::StaticServerRegistry;
