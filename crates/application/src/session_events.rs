//! 会话关闭事件处理
//!
//! 用户在某个前端服务器上的最后一个会话断开时，把用户移出其在该服务器上加入的所有频道。

use std::sync::Arc;

use domain::{ServerId, UserId};
use tracing::{debug, error};

use crate::channel_service::GlobalChannelService;

/// 宿主应用的本地会话查询
pub trait SessionDirectory: Send + Sync {
    /// 用户在本前端服务器上是否仍有会话
    fn has_sessions(&self, uid: &UserId) -> bool;
}

/// 已关闭的会话
#[derive(Debug, Clone)]
pub struct ClosedSession {
    /// 未绑定用户的会话为 `None`
    pub uid: Option<UserId>,
    pub frontend_id: ServerId,
}

pub struct SessionEvents {
    channels: Arc<GlobalChannelService>,
    sessions: Arc<dyn SessionDirectory>,
}

impl SessionEvents {
    pub fn new(channels: Arc<GlobalChannelService>, sessions: Arc<dyn SessionDirectory>) -> Self {
        Self { channels, sessions }
    }

    pub async fn on_session_closed(&self, session: &ClosedSession) {
        let Some(uid) = &session.uid else {
            return;
        };

        if self.sessions.has_sessions(uid) {
            debug!(
                uid = %uid,
                sid = %session.frontend_id,
                "at least another session exists for this user on this frontend"
            );
            return;
        }

        if let Err(e) = self.channels.leave_all(uid, &session.frontend_id).await {
            error!(
                uid = %uid,
                sid = %session.frontend_id,
                error = %e,
                "failed to kick user from global channels on session close"
            );
        }
    }
}
