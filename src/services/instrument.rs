//! 操作计时
//!
//! 以"带标签的工作单元"为粒度记录吞吐与延迟。
//! 主要操作（primary）额外累加 ops 计数，失败时累加 errors 计数，
//! 原始错误原样向上传播。

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use std::future::Future;

use crate::metrics::{MetricsSink, ERRORS, OPS};

/// 虚拟用户的计时器
#[derive(Clone)]
pub struct Instrument {
    metrics: Arc<dyn MetricsSink>,
    tags: Vec<(String, String)>,
}

impl Instrument {
    pub fn new(metrics: Arc<dyn MetricsSink>, tags: Vec<(String, String)>) -> Self {
        Self { metrics, tags }
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    /// 执行一段操作并记录耗时
    ///
    /// 成功和失败都会记录耗时分布；primary 操作另计 ops/errors。
    pub async fn time<T, Fut>(&self, label: &str, primary: bool, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        if primary {
            self.metrics.increment(OPS, &self.tags);
        }

        let start = Instant::now();
        let outcome = fut.await;
        self.metrics.timing(label, start.elapsed(), &self.tags);

        if primary && outcome.is_err() {
            self.metrics.increment(ERRORS, &self.tags);
        }
        outcome
    }

    /// 累加一个业务计数（如提交的练习数）
    pub fn count(&self, name: &str) {
        self.metrics.increment(name, &self.tags);
    }
}
