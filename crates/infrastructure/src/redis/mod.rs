//! Redis 频道存储模块
//!
//! 频道成员正向集合与用户反向集合都存放在 Redis 中，供所有服务器共享。

pub mod channel_store;
pub mod error;

// 重新导出
pub use channel_store::RedisChannelStore;
pub use error::{RedisStoreError, RedisStoreResult};
