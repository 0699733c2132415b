//! 协作式取消
//!
//! 没有抢占：状态机必须在离散步骤之间轮询 `active()`。
//! 取消延迟的上界是一次在途页面操作的时长。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 会话标志
///
/// active 只会从 true 变为 false，恰好一次，不会回退。
/// 克隆共享同一个标志。
#[derive(Clone, Debug)]
pub struct Session(Arc<AtomicBool>);

impl Session {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// 会话是否仍然活跃
    pub fn active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// 请求停止（幂等）
    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
