//! 页面驱动能力接口
//!
//! 虚拟用户的状态机只依赖这个接口，不认识 chromiumoxide。
//! 测试中用内存实现替换真实浏览器。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// 页面驱动错误
///
/// `Timeout` 是唯一可重试的错误类别，`is_timeout` 是重试策略的依据。
#[derive(Debug, Error)]
pub enum DriverError {
    /// 等待元素出现超时
    #[error("等待元素超时: {selector} ({timeout:?})")]
    Timeout { selector: String, timeout: Duration },

    /// 导航失败
    #[error("导航到 {url} 失败: {message}")]
    Navigation { url: String, message: String },

    /// 元素存在但内容/属性缺失
    #[error("元素内容缺失: {selector}")]
    MissingContent { selector: String },

    /// 浏览器协议层错误
    #[error("浏览器协议错误: {message}")]
    Protocol { message: String },

    /// 页面已关闭
    #[error("页面已关闭")]
    Closed,
}

impl DriverError {
    /// 是否是可重试的超时类错误
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }

    pub(crate) fn protocol(e: impl std::fmt::Display) -> Self {
        DriverError::Protocol {
            message: e.to_string(),
        }
    }
}

/// 页面驱动能力
///
/// 约定：
/// - 所有接受选择器的操作先等待元素出现（内部超时），再执行动作
/// - 每个调用都是一个挂起点，状态机在调用之间轮询会话标志
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// 导航到指定 URL
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    /// 重新加载当前页面
    async fn reload(&self) -> Result<(), DriverError>;

    /// 等待元素出现
    async fn wait_for(&self, selector: &str) -> Result<(), DriverError>;

    /// 等待多个元素中最先出现的一个，返回其下标
    async fn wait_for_any(&self, selectors: &[&str]) -> Result<usize, DriverError>;

    /// 元素当前是否存在（不等待）
    async fn exists(&self, selector: &str) -> Result<bool, DriverError>;

    /// 等待并点击元素
    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    /// 等待并一次性填入文本
    async fn fill(&self, selector: &str, text: &str) -> Result<(), DriverError>;

    /// 模拟人工逐键输入
    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        per_key_delay: Duration,
    ) -> Result<(), DriverError>;

    /// 读取元素属性
    async fn attribute(&self, selector: &str, name: &str)
        -> Result<Option<String>, DriverError>;

    /// 读取元素文本
    async fn inner_text(&self, selector: &str) -> Result<String, DriverError>;

    /// 鼠标拖拽：从 source 元素中心拖到 target 元素中心
    async fn drag(&self, source: &str, target: &str) -> Result<(), DriverError>;

    /// 在页面上下文中执行 JS
    async fn eval(&self, js: &str) -> Result<JsonValue, DriverError>;

    /// 全页截图
    async fn screenshot(&self, path: &Path) -> Result<(), DriverError>;

    /// 保存当前页面 HTML
    async fn html_dump(&self, path: &Path) -> Result<(), DriverError>;

    /// 释放页面资源
    ///
    /// 由 Runner 在虚拟用户终止后调用，恰好一次；
    /// 重复关闭返回错误，由调用方按警告吞掉。
    async fn close(&self) -> Result<(), DriverError>;
}

/// 共享的页面驱动句柄
///
/// 虚拟用户在运行期间独占使用；Runner 保留一个克隆用于最终释放。
pub type SharedPage = Arc<dyn PageDriver>;

/// 判断 anyhow 错误链中是否是可重试的驱动超时
pub fn is_timeout_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<DriverError>()
        .is_some_and(DriverError::is_timeout)
}
