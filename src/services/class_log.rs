//! 班级代码广播
//!
//! 单生产者、多消费者、一次性落定：教师发布恰好一次班级代码，
//! 每个学生订阅一次并取到同一个值。在发布之前订阅的学生会
//! 挂起等待；之后订阅的仍能拿到已缓存的值。
//!
//! 用 watch 通道的"当前值"语义直接表达落定一次的合同，
//! 单生产者假设下不需要任何锁。

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::warn;

/// 一个班级范围内的代码广播
pub struct ClassLog {
    tx: watch::Sender<Option<String>>,
    class_size: usize,
}

impl ClassLog {
    /// 容量等于班级人数（用于日志与一致性检查）
    pub fn new(class_size: usize) -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx, class_size }
    }

    pub fn class_size(&self) -> usize {
        self.class_size
    }

    /// 发布班级代码（恰好一次；重复发布被忽略并告警）
    pub fn publish(&self, class_code: &str) {
        let already = self.tx.borrow().is_some();
        if already {
            warn!("班级代码已经发布过，忽略重复发布: {}", class_code);
            return;
        }
        // 没有订阅者也不算错误：晚订阅的学生读取缓存值
        let _ = self.tx.send(Some(class_code.to_string()));
    }

    /// 订阅班级创建事件
    pub fn subscribe(&self) -> ClassCreated {
        ClassCreated(self.tx.subscribe())
    }
}

/// 一次订阅：等待（或立即取得）已发布的班级代码
pub struct ClassCreated(watch::Receiver<Option<String>>);

impl ClassCreated {
    /// 等待班级代码
    ///
    /// 发布者在发布前被丢弃（教师在创建班级前失败）时返回错误。
    pub async fn wait(mut self) -> Result<String> {
        let value = self
            .0
            .wait_for(Option::is_some)
            .await
            .context("教师在发布班级代码前已退出")?;
        // wait_for 保证值已落定
        Ok(value.as_deref().unwrap_or_default().to_string())
    }
}
