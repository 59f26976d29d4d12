//! 向多个前端服务器并发推送并汇总结果
//!
//! 每个服务器一个任务，无论成功、失败、超时还是没有成员，都会对门闩计数一次；
//! 至少一个服务器推送成功即视为整体成功，投递失败的用户累积到结果中。

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use domain::{RemoteRequest, ServerId, UserId};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::error::{ChannelError, ChannelResult, RpcError, StoreResult};
use crate::latch::CountDownLatch;
use crate::remote::ChannelRemote;

/// 推送汇总状态：是否有服务器成功，以及累积的失败用户
#[derive(Debug, Default)]
pub struct PushAggregate {
    any_success: AtomicBool,
    failed: Mutex<Vec<UserId>>,
}

impl PushAggregate {
    pub fn record_success(&self, failed: Vec<UserId>) {
        if !failed.is_empty() {
            self.failed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(failed);
        }
        self.any_success.store(true, Ordering::Release);
    }

    pub fn any_success(&self) -> bool {
        self.any_success.load(Ordering::Acquire)
    }

    /// 汇总结果：没有任何服务器成功时返回 `AllServersFailed`
    pub fn outcome(&self) -> ChannelResult<Vec<UserId>> {
        if !self.any_success() {
            return Err(ChannelError::AllServersFailed);
        }
        Ok(self
            .failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// 一次推送扇出
pub(crate) struct PushFanOut {
    remote: Arc<dyn ChannelRemote>,
    timeout: Option<Duration>,
    route: String,
    msg: Value,
}

impl PushFanOut {
    pub(crate) fn new(
        remote: Arc<dyn ChannelRemote>,
        timeout: Option<Duration>,
        route: impl Into<String>,
        msg: Value,
    ) -> Self {
        Self {
            remote,
            timeout,
            route: route.into(),
            msg,
        }
    }

    /// 对每个服务器先用 `resolve` 取得成员，再发起推送
    pub(crate) async fn run<R, Fut>(
        self,
        servers: Vec<ServerId>,
        resolve: R,
    ) -> ChannelResult<Vec<UserId>>
    where
        R: Fn(ServerId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StoreResult<Vec<UserId>>> + Send + 'static,
    {
        let aggregate = Arc::new(PushAggregate::default());
        let (tx, rx) = oneshot::channel();
        let finisher_aggregate = aggregate.clone();
        let latch = Arc::new(CountDownLatch::new(servers.len(), move || {
            let _ = tx.send(finisher_aggregate.outcome());
        }));

        let fan_out = Arc::new(self);
        let resolve = Arc::new(resolve);
        for sid in servers {
            let fan_out = fan_out.clone();
            let resolve = resolve.clone();
            let aggregate = aggregate.clone();
            let latch = latch.clone();
            tokio::spawn(async move {
                fan_out.push_to_server(sid, resolve.as_ref(), &aggregate).await;
                latch.done();
            });
        }
        drop(latch);

        rx.await
            .map_err(|_| ChannelError::internal("push tasks exited before completion"))?
    }

    async fn push_to_server<R, Fut>(&self, sid: ServerId, resolve: &R, aggregate: &PushAggregate)
    where
        R: Fn(ServerId) -> Fut,
        Fut: Future<Output = StoreResult<Vec<UserId>>>,
    {
        let task = async {
            let uids = match resolve(sid.clone()).await {
                Ok(uids) => uids,
                Err(e) => {
                    error!(sid = %sid, error = %e, "[pushMessage] fail to get members");
                    return None;
                }
            };
            if uids.is_empty() {
                debug!(sid = %sid, "no channel members on server, skip push");
                return None;
            }
            let request = RemoteRequest::push_message(self.route.clone(), self.msg.clone(), uids);
            Some(self.remote.invoke(&sid, request).await)
        };

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(result) => result,
                Err(_) => Some(Err(RpcError::Timeout {
                    server_id: sid.clone(),
                })),
            },
            None => task.await,
        };

        match result {
            Some(Ok(failed)) => aggregate.record_success(failed),
            Some(Err(e)) => {
                error!(sid = %sid, route = %self.route, error = %e, "[pushMessage] fail to dispatch msg");
            }
            None => {}
        }
    }
}
