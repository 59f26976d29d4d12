//! 应用层实现。
//!
//! 全局频道的成员存储抽象、生命周期受控的频道服务、跨前端服务器的广播编排，
//! 以及对外部适配器（服务器注册表、远程调用、会话查询）的抽象。

pub mod channel_service;
pub mod error;
pub mod fan_out;
pub mod keys;
pub mod latch;
pub mod registry;
pub mod remote;
pub mod session_events;
pub mod store;

pub use channel_service::{
    ChannelServiceOptions, GlobalChannelService, ServiceState, DEFAULT_RPC_TIMEOUT,
};
pub use error::{ChannelError, ChannelResult, RpcError, StoreError, StoreResult};
pub use fan_out::PushAggregate;
pub use keys::ChannelKeys;
pub use latch::CountDownLatch;
pub use registry::ServerRegistry;
pub use remote::ChannelRemote;
pub use session_events::{ClosedSession, SessionDirectory, SessionEvents};
pub use store::{memory::MemoryChannelStore, ChannelStore};
