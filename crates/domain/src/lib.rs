//! 全局频道核心领域模型
//!
//! 包含用户、前端服务器标识，服务器描述，以及推送到前端服务器的 RPC 负载。

pub mod push;
pub mod server;
pub mod value_objects;

// 重新导出常用类型
pub use push::*;
pub use server::*;
pub use value_objects::*;
