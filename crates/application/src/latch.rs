//! 倒计数门闩
//!
//! 等待固定数量的独立完成信号，第 N 次 `done()` 时在调用方任务上同步执行收尾回调，且只执行一次。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::warn;

type Finisher = Box<dyn FnOnce() + Send>;

pub struct CountDownLatch {
    remaining: AtomicUsize,
    finisher: Mutex<Option<Finisher>>,
}

impl CountDownLatch {
    /// 创建等待 `count` 次完成的门闩
    ///
    /// `count` 为 0 时收尾回调在构造时立即执行。
    pub fn new<F>(count: usize, finisher: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let latch = Self {
            remaining: AtomicUsize::new(count),
            finisher: Mutex::new(Some(Box::new(finisher))),
        };
        if count == 0 {
            latch.fire();
        }
        latch
    }

    /// 记录一次完成；返回本次调用是否触发了收尾回调
    ///
    /// 超出计数的调用属于调用方错误：debug 构建下断言失败，release 构建下忽略。
    pub fn done(&self) -> bool {
        match self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(1) => {
                self.fire();
                true
            }
            Ok(_) => false,
            Err(_) => {
                warn!("count down latch already released, extra done() ignored");
                debug_assert!(false, "done() called more times than the latch count");
                false
            }
        }
    }

    /// 剩余未完成的数量
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    fn fire(&self) {
        let finisher = self
            .finisher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(finisher) = finisher {
            finisher();
        }
    }
}

impl std::fmt::Debug for CountDownLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountDownLatch")
            .field("remaining", &self.remaining())
            .finish()
    }
}
