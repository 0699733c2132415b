//! 虚拟用户外壳
//!
//! ## 职责
//!
//! 1. **生命周期**：started → running → (failed)? → stopped，
//!    stopped 事件在任何退出路径上恰好发出一次
//! 2. **协作式取消**：状态机在离散步骤之间轮询 [`Session`]
//! 3. **节奏与计时**：think 暂停、带标签的操作计时
//! 4. **刷新重试**：页面操作超时时截图、刷新、重做，
//!    这是系统中唯一的重试策略
//!
//! 具体旅程（教师/学生）通过 [`Journey`] 接口注入，
//! 共享行为作为协作对象组合，不做继承。

use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::SessionStopped;
use crate::infrastructure::page_driver::is_timeout_error;
use crate::infrastructure::SharedPage;
use crate::services::{Instrument, PageRecorder, Pacing, Session};

/// 生命周期事件类别
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VuEventKind {
    Started,
    Failed(String),
    Stopped,
}

/// 发给 Runner 的生命周期事件
#[derive(Clone, Debug)]
pub struct VuEvent {
    pub id: String,
    pub kind: VuEventKind,
}

/// 一条具体的虚拟用户旅程
///
/// 实现者需要可变状态时使用内部可变性（重试闭包要求 `&self`）。
#[async_trait]
pub trait Journey: Send + Sync {
    async fn run(&self, vu: &VirtualUser, page: &SharedPage) -> Result<()>;
}

/// 虚拟用户
pub struct VirtualUser {
    id: String,
    session: Session,
    pacing: Pacing,
    instrument: Instrument,
    recorder: Option<PageRecorder>,
    events: mpsc::UnboundedSender<VuEvent>,
}

impl VirtualUser {
    pub fn new(
        id: String,
        session: Session,
        pacing: Pacing,
        instrument: Instrument,
        recorder: Option<PageRecorder>,
        events: mpsc::UnboundedSender<VuEvent>,
    ) -> Self {
        Self {
            id,
            session,
            pacing,
            instrument,
            recorder,
            events,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    /// 会话是否仍然活跃（状态机在每个离散步骤之间轮询）
    pub fn session_active(&self) -> bool {
        self.session.active()
    }

    /// 默认基准的 think 暂停
    pub async fn think(&self) {
        self.pacing.think().await;
    }

    /// 指定基准的 think 暂停
    pub async fn think_for(&self, base_secs: f64) {
        self.pacing.think_for(base_secs).await;
    }

    /// 计时执行一段操作，见 [`Instrument::time`]
    pub async fn time<T, Fut>(&self, label: &str, primary: bool, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        self.instrument.time(label, primary, fut).await
    }

    /// 累加一个业务计数
    pub fn count(&self, name: &str) {
        self.instrument.count(name);
    }

    /// 刷新重试包装
    ///
    /// 运行 `f`；遇到页面驱动的超时类错误且会话仍活跃时，
    /// 采集现场、刷新页面、从头重试，循环直到成功。
    /// 其它错误立即向上传播；会话停止后把挂起的错误标记为取消上抛。
    /// 没有重试次数上限，只受会话活跃度约束。
    pub async fn retry_refreshing<T, Fut, F>(&self, page: &SharedPage, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        while self.session_active() {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !self.session_active() {
                        return Err(e.context(SessionStopped));
                    }

                    if let Some(recorder) = &self.recorder {
                        recorder.record(page.as_ref(), &self.id).await;
                    }

                    if is_timeout_error(&e) {
                        warn!("[VU {}] ⚠️ 页面操作超时，刷新后重试: {:#}", self.id, e);
                        page.reload().await?;
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(SessionStopped.into())
    }

    /// 启动虚拟用户并驱动其旅程到终点
    ///
    /// 事件顺序保证：started 一次；失败时 failed 一次；
    /// 无论正常结束、出错还是 panic，stopped 恰好一次。
    pub async fn start(self, journey: Box<dyn Journey>, page: SharedPage) {
        info!("[VU {}] ▶️ 启动", self.id);
        self.emit(VuEventKind::Started);

        match AssertUnwindSafe(journey.run(&self, &page)).catch_unwind().await {
            Ok(Ok(())) => {
                info!("[VU {}] ✅ 会话正常结束", self.id);
            }
            Ok(Err(e)) if is_cooperative_stop(&e) => {
                info!("[VU {}] 🛑 会话被协作式停止", self.id);
            }
            Ok(Err(e)) => {
                error!("[VU {}] ❌ 运行失败: {:#}", self.id, e);
                self.emit(VuEventKind::Failed(format!("{:#}", e)));
            }
            Err(_) => {
                error!("[VU {}] ❌ 任务 panic", self.id);
                self.emit(VuEventKind::Failed("panic".to_string()));
            }
        }

        self.emit(VuEventKind::Stopped);
    }

    fn emit(&self, kind: VuEventKind) {
        // Runner 先退出时事件无处投递，忽略即可
        let _ = self.events.send(VuEvent {
            id: self.id.clone(),
            kind,
        });
    }
}

/// 错误链中是否包含协作式取消标记
fn is_cooperative_stop(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| cause.is::<SessionStopped>())
}
