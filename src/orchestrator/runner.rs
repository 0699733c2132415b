//! 压测编排器
//!
//! Runner 拥有页面池和所有虚拟用户的会话句柄，职责：
//!
//! 1. **派发**：按名单逐班启动虚拟用户，班级之间、学生之间
//!    留出节奏间隔；新班级的学生挂在班级代码广播上延迟启动
//! 2. **生命周期收口**：单个事件循环消费虚拟用户的事件，
//!    维护 running gauge，终止后恰好一次释放对应页面
//! 3. **停机扇入**：stop() 广播协作式停止，所有会话退出后
//!    恰好一次落定 stopped
//!
//! 单个虚拟用户失败只影响它自己，绝不触发整体停机。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::browser::PageMap;
use crate::config::{RunnerConfig, VuConfig};
use crate::error::LoadError;
use crate::infrastructure::SharedPage;
use crate::metrics::{
    SharedSink, CLASSES_STARTED, RUNNING_CLASSES, RUNNING_VUS, VUS_FAILED, VUS_STARTED,
};
use crate::model::{Account, Classroom};
use crate::services::{draw_think_time_factor, ClassLog, Instrument, PageRecorder, Pacing, Session};
use crate::vus::{Journey, VirtualPupil, VirtualTeacher, VirtualUser, VuEvent, VuEventKind};

/// 压测编排器（可克隆的共享句柄）
#[derive(Clone)]
pub struct Runner {
    inner: Arc<RunnerInner>,
}

struct RunnerInner {
    config: RunnerConfig,
    roster: Vec<Classroom>,
    metrics: SharedSink,
    /// 账号身份键 → 页面；释放时移出，保证恰好关闭一次
    pages: Mutex<PageMap>,
    /// 活跃的虚拟用户会话
    sessions: Mutex<HashMap<String, Session>>,
    /// 名单是否已全部派发
    dispatch_complete: AtomicBool,
    /// 实际启动过的班级数（停机可能打断派发，名单长度不可靠）
    classes_started: AtomicUsize,
    /// 是否已请求停机
    stopping: AtomicBool,
    stopped_tx: watch::Sender<bool>,
    events_tx: mpsc::UnboundedSender<VuEvent>,
}

impl Runner {
    pub fn new(
        config: RunnerConfig,
        roster: Vec<Classroom>,
        pages: PageMap,
        metrics: SharedSink,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stopped_tx, _) = watch::channel(false);

        let inner = Arc::new(RunnerInner {
            config,
            roster,
            metrics,
            pages: Mutex::new(pages),
            sessions: Mutex::new(HashMap::new()),
            dispatch_complete: AtomicBool::new(false),
            classes_started: AtomicUsize::new(0),
            stopping: AtomicBool::new(false),
            stopped_tx,
            events_tx,
        });

        tokio::spawn(RunnerInner::handle_events(inner.clone(), events_rx));

        Self { inner }
    }

    /// 按名单派发所有班级
    pub async fn start(&self) -> Result<()> {
        let inner = &self.inner;
        info!("🚀 压测启动: {} 个班级", inner.roster.len());

        for (index, classroom) in inner.roster.iter().enumerate() {
            if inner.stopping.load(Ordering::Acquire) {
                info!("派发中途收到停机请求，剩余班级不再启动");
                break;
            }
            if index > 0 {
                sleep(Duration::from_secs(inner.config.classroom_start_delay_secs)).await;
            }

            info!(
                "📦 启动班级 \"{}\"（{} 名学生，{}）",
                classroom.name,
                classroom.pupils.len(),
                if classroom.prepared {
                    "预置账号"
                } else {
                    "现场开班"
                }
            );
            inner.classes_started.fetch_add(1, Ordering::AcqRel);
            inner.metrics.increment(CLASSES_STARTED, &[]);
            inner.metrics.gauge_delta(RUNNING_CLASSES, 1.0, &[]);

            if classroom.prepared {
                self.start_prepared_classroom(classroom).await?;
            } else {
                self.start_new_classroom(classroom).await?;
            }
        }

        inner.dispatch_complete.store(true, Ordering::Release);
        info!("✓ 名单派发完毕");
        inner.maybe_finish();
        Ok(())
    }

    /// 广播协作式停止
    pub fn stop(&self) {
        let inner = &self.inner;
        if inner.stopping.swap(true, Ordering::AcqRel) {
            return;
        }

        let sessions = lock(&inner.sessions);
        info!("🛑 请求停止 {} 个虚拟用户", sessions.len());
        for (id, session) in sessions.iter() {
            info!("[VU {}] 停止中", id);
            session.stop();
        }
        drop(sessions);

        let started = inner.classes_started.load(Ordering::Acquire);
        inner
            .metrics
            .gauge_delta(RUNNING_CLASSES, -(started as f64), &[]);
        inner.maybe_finish();
    }

    /// 等待所有虚拟用户退出
    pub async fn wait_stopped(&self) {
        let mut rx = self.inner.stopped_tx.subscribe();
        // wait_for 先检查当前值，已落定时立即返回
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    // ========== 派发 ==========

    /// 预置班级：教师先启动，学生按间隔跟上，全部直接登录
    async fn start_prepared_classroom(&self, classroom: &Classroom) -> Result<()> {
        let inner = &self.inner;
        let page_url = inner.config.target_url.clone();

        let teacher_page = inner.page_for(classroom.teacher.identity())?;
        let config = VuConfig {
            page_url: page_url.clone(),
            think_time_factor: draw_think_time_factor(),
            ..Default::default()
        };
        let teacher = VirtualTeacher::new(classroom.teacher.clone(), config.clone())?;
        self.spawn_vu(
            &classroom.name,
            classroom.teacher.identity(),
            &config,
            Box::new(teacher),
            teacher_page,
        )?;

        for pupil in &classroom.pupils {
            sleep(Duration::from_secs(inner.config.pupil_start_delay_secs)).await;

            let page = inner.page_for(pupil.identity())?;
            let config = VuConfig {
                page_url: page_url.clone(),
                think_time_factor: draw_think_time_factor(),
                ..Default::default()
            };
            let vu = VirtualPupil::new(pupil.clone(), config.clone());
            self.spawn_vu(&classroom.name, pupil.identity(), &config, Box::new(vu), page)?;
        }
        Ok(())
    }

    /// 现场开班：教师注册并创建班级，学生等班级代码发布后
    /// 才从 join 页面注册进来
    async fn start_new_classroom(&self, classroom: &Classroom) -> Result<()> {
        let inner = &self.inner;
        let class_log = Arc::new(ClassLog::new(classroom.pupils.len()));

        // 页面先全部解析出来：页面池缺口是致命的启动配置错误
        let teacher_page = inner.page_for(classroom.teacher.identity())?;
        let mut pupil_pages = Vec::with_capacity(classroom.pupils.len());
        for pupil in &classroom.pupils {
            pupil_pages.push((pupil.clone(), inner.page_for(pupil.identity())?));
        }

        let config = VuConfig {
            page_url: inner.config.target_url.clone(),
            think_time_factor: draw_think_time_factor(),
            class_name: Some(classroom.name.clone()),
            class_size: Some(classroom.pupils.len()),
            class_log: Some(class_log.clone()),
            join_code: None,
        };
        let teacher = VirtualTeacher::new(classroom.teacher.clone(), config.clone())?;
        self.spawn_vu(
            &classroom.name,
            classroom.teacher.identity(),
            &config,
            Box::new(teacher),
            teacher_page,
        )?;

        // 每个学生各挂一个"班级创建后"续体，互不阻塞
        let join_url = join_url(&inner.config.target_url);
        for (index, (pupil, page)) in pupil_pages.into_iter().enumerate() {
            let subscription = class_log.subscribe();
            let runner = self.clone();
            let class_name = classroom.name.clone();
            let page_url = join_url.clone();
            let start_delay =
                Duration::from_secs(inner.config.pupil_start_delay_secs * index as u64);

            tokio::spawn(async move {
                let join_code = match subscription.wait().await {
                    Ok(code) => code,
                    Err(e) => {
                        warn!("学生 {} 没有等到班级代码: {:#}", pupil.identity(), e);
                        return;
                    }
                };
                sleep(start_delay).await;

                let identity = pupil.identity().to_string();
                let config = VuConfig {
                    page_url,
                    think_time_factor: draw_think_time_factor(),
                    join_code: Some(join_code),
                    ..Default::default()
                };
                let vu = VirtualPupil::new(pupil, config.clone());
                if let Err(e) =
                    runner.spawn_vu(&class_name, &identity, &config, Box::new(vu), page)
                {
                    error!("学生 {} 启动失败: {:#}", identity, e);
                }
            });
        }
        Ok(())
    }

    /// 登记会话并启动虚拟用户任务
    fn spawn_vu(
        &self,
        class_name: &str,
        identity: &str,
        config: &VuConfig,
        journey: Box<dyn Journey>,
        page: SharedPage,
    ) -> Result<()> {
        let inner = &self.inner;
        if inner.stopping.load(Ordering::Acquire) {
            debug!("[VU {}] 停机中，不再启动", identity);
            return Ok(());
        }

        let session = Session::new();
        let pacing = Pacing::new(config.think_time_factor)?;
        let instrument = Instrument::new(
            inner.metrics.clone(),
            vec![
                ("vu".to_string(), identity.to_string()),
                ("class".to_string(), class_name.to_string()),
            ],
        );
        let recorder = (!inner.config.screenshot_dir.is_empty())
            .then(|| PageRecorder::new(inner.config.screenshot_dir.clone()));

        let vu = VirtualUser::new(
            identity.to_string(),
            session.clone(),
            pacing,
            instrument,
            recorder,
            inner.events_tx.clone(),
        );

        lock(&inner.sessions).insert(identity.to_string(), session);
        tokio::spawn(vu.start(journey, page));
        Ok(())
    }
}

impl RunnerInner {
    /// 生命周期事件循环：gauge 维护、页面释放、停机扇入
    async fn handle_events(inner: Arc<RunnerInner>, mut events: mpsc::UnboundedReceiver<VuEvent>) {
        while let Some(event) = events.recv().await {
            let vu_tag = [("vu".to_string(), event.id.clone())];
            match event.kind {
                VuEventKind::Started => {
                    inner.metrics.gauge_delta(RUNNING_VUS, 1.0, &[]);
                    inner.metrics.increment(VUS_STARTED, &vu_tag);
                }
                VuEventKind::Failed(reason) => {
                    // 单个失败不影响其他虚拟用户
                    error!("[VU {}] 已失败: {}", event.id, reason);
                    inner.metrics.increment(VUS_FAILED, &vu_tag);
                }
                VuEventKind::Stopped => {
                    inner.metrics.gauge_delta(RUNNING_VUS, -1.0, &[]);
                    inner.release_page(&event.id).await;
                    lock(&inner.sessions).remove(&event.id);
                    inner.maybe_finish();
                }
            }
        }
    }

    fn page_for(&self, identity: &str) -> Result<SharedPage, LoadError> {
        lock(&self.pages)
            .get(identity)
            .cloned()
            .ok_or_else(|| LoadError::NotEnoughPages {
                identity: identity.to_string(),
            })
    }

    /// 释放页面，恰好一次：从池中移出后关闭，重复释放是空操作
    async fn release_page(&self, identity: &str) {
        let page = lock(&self.pages).remove(identity);
        match page {
            Some(page) => {
                if let Err(e) = page.close().await {
                    warn!("[VU {}] 释放页面失败（可能已关闭）: {}", identity, e);
                } else {
                    debug!("[VU {}] 页面已释放", identity);
                }
            }
            None => debug!("[VU {}] 页面已释放过", identity),
        }
    }

    /// 停机扇入：名单派发完毕或已请求停机，且所有会话退出时落定
    fn maybe_finish(&self) {
        let drained = lock(&self.sessions).is_empty();
        let terminal = self.stopping.load(Ordering::Acquire)
            || self.dispatch_complete.load(Ordering::Acquire);
        if drained && terminal && !*self.stopped_tx.borrow() {
            info!("✅ 所有虚拟用户已退出，压测结束");
            let _ = self.stopped_tx.send(true);
        }
    }
}

/// 学生自助注册的入口 URL
fn join_url(base: &str) -> String {
    format!("{}/join", base.trim_end_matches('/'))
}

/// 锁中毒说明某个持锁路径 panic 了；数据仍然可用，继续跑
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_appends_segment() {
        assert_eq!(join_url("http://localhost:8080"), "http://localhost:8080/join");
        assert_eq!(join_url("http://localhost:8080/"), "http://localhost:8080/join");
    }
}
