//! 指标输出 - 基础设施层
//!
//! 按照依赖注入的方式暴露一个 `MetricsSink` 接口：
//! Runner 和虚拟用户只依赖接口，进程级的实现（`metrics` facade）
//! 只在组装入口（main）处出现，深层调用点不引用全局客户端。

use std::sync::Arc;
use std::time::Duration;

use metrics::Label;

// ========== 指标名称 ==========

/// 正在运行的虚拟用户数（gauge）
pub const RUNNING_VUS: &str = "running.vus";
/// 正在运行的班级数（gauge）
pub const RUNNING_CLASSES: &str = "running.classes";
/// 已启动的班级数
pub const CLASSES_STARTED: &str = "classes.started";
/// 已启动的虚拟用户数（带 vu 标签）
pub const VUS_STARTED: &str = "vus.started";
/// 已失败的虚拟用户数（带 vu 标签）
pub const VUS_FAILED: &str = "vus.failed";
/// 主要操作计数
pub const OPS: &str = "ops";
/// 主要操作失败计数
pub const ERRORS: &str = "errors";
/// 已提交的任务系列数
pub const TASK_SERIES_SUBMITTED: &str = "taskseries.submitted";
/// 已提交的练习数
pub const EXERCISES_SUBMITTED: &str = "exercises.submitted";

/// 指标输出接口
///
/// 职责：
/// - 计数器 / gauge / 耗时分布三种形态
/// - 不关心具体的导出协议（statsd / prometheus 由部署决定）
/// - 测试中用内存实现替换
pub trait MetricsSink: Send + Sync {
    /// 计数器累加
    fn count(&self, name: &str, delta: u64, tags: &[(String, String)]);

    /// gauge 增减
    fn gauge_delta(&self, name: &str, delta: f64, tags: &[(String, String)]);

    /// 记录一次带标签的耗时
    fn timing(&self, name: &str, duration: Duration, tags: &[(String, String)]);

    /// 计数器 +1
    fn increment(&self, name: &str, tags: &[(String, String)]) {
        self.count(name, 1, tags);
    }
}

/// 基于 `metrics` facade 的生产实现
///
/// 所有指标统一带上 run_id 标签，便于区分多次压测。
pub struct FacadeSink {
    run_id: String,
}

impl FacadeSink {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    fn labels(&self, tags: &[(String, String)]) -> Vec<Label> {
        let mut labels = Vec::with_capacity(tags.len() + 1);
        labels.push(Label::new("run_id", self.run_id.clone()));
        for (k, v) in tags {
            labels.push(Label::new(k.clone(), v.clone()));
        }
        labels
    }
}

impl MetricsSink for FacadeSink {
    fn count(&self, name: &str, delta: u64, tags: &[(String, String)]) {
        metrics::counter!(name.to_owned(), self.labels(tags)).increment(delta);
    }

    fn gauge_delta(&self, name: &str, delta: f64, tags: &[(String, String)]) {
        metrics::gauge!(name.to_owned(), self.labels(tags)).increment(delta);
    }

    fn timing(&self, name: &str, duration: Duration, tags: &[(String, String)]) {
        metrics::histogram!(name.to_owned(), self.labels(tags)).record(duration.as_secs_f64());
    }
}

/// 丢弃所有指标的空实现
pub struct NullSink;

impl MetricsSink for NullSink {
    fn count(&self, _name: &str, _delta: u64, _tags: &[(String, String)]) {}
    fn gauge_delta(&self, _name: &str, _delta: f64, _tags: &[(String, String)]) {}
    fn timing(&self, _name: &str, _duration: Duration, _tags: &[(String, String)]) {}
}

/// 便捷类型别名：共享的指标出口
pub type SharedSink = Arc<dyn MetricsSink>;
