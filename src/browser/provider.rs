//! 浏览器与页面池预分配
//!
//! 在压测开始前，为名单中的每个账号分配一个独立页面，
//! 以账号身份键索引交给 Runner。之后页面的独占使用权
//! 属于对应的虚拟用户，释放由 Runner 统一负责。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::config::RunnerConfig;
use crate::infrastructure::{ChromeDriver, SharedPage};
use crate::model::{Account, Classroom};

/// 账号身份键 → 页面驱动
pub type PageMap = HashMap<String, SharedPage>;

/// 页面提供者
pub struct PageProvider {
    browser: Browser,
    wait_timeout: Duration,
}

impl PageProvider {
    /// 启动无头浏览器
    pub async fn launch(config: &RunnerConfig) -> Result<Self> {
        info!("🚀 启动无头浏览器...");

        let browser_config = BrowserConfig::builder()
            .new_headless_mode()
            .args(vec![
                "--no-sandbox",            // 容器环境下防止权限问题导致的崩溃
                "--disable-gpu",
                "--disable-dev-shm-usage", // 防止共享内存不足
            ])
            .build()
            .map_err(|e| anyhow!("配置无头浏览器失败: {}", e))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            error!("启动无头浏览器失败: {}", e);
            anyhow!("启动无头浏览器失败: {}", e)
        })?;
        debug!("无头浏览器启动成功");

        // 在后台处理浏览器事件
        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        // 添加短暂延迟以等待浏览器状态同步
        sleep(Duration::from_millis(300)).await;

        Ok(Self {
            browser,
            wait_timeout: Duration::from_secs(config.selector_timeout_secs),
        })
    }

    /// 连接到已有浏览器的调试端口
    pub async fn connect(config: &RunnerConfig, port: u16) -> Result<Self> {
        let browser_url = format!("http://localhost:{}", port);
        info!("正在连接到浏览器: {}", browser_url);

        let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
            error!("连接浏览器失败: {}", e);
            anyhow!("连接浏览器失败 (端口: {}): {}", port, e)
        })?;
        debug!("浏览器连接成功");

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        sleep(Duration::from_millis(300)).await;

        Ok(Self {
            browser,
            wait_timeout: Duration::from_secs(config.selector_timeout_secs),
        })
    }

    /// 按配置选择启动或连接
    pub async fn from_config(config: &RunnerConfig) -> Result<Self> {
        match config.browser_debug_port {
            Some(port) => Self::connect(config, port).await,
            None => Self::launch(config).await,
        }
    }

    /// 为名单中的每个账号预分配一个页面
    ///
    /// 教师页面先于同班学生页面创建。
    pub async fn provide(&self, roster: &[Classroom]) -> Result<PageMap> {
        let mut pages: PageMap = HashMap::new();

        for classroom in roster {
            self.allocate(&mut pages, classroom.teacher.identity())
                .await?;
            for pupil in &classroom.pupils {
                self.allocate(&mut pages, pupil.identity()).await?;
            }
        }

        info!("✓ 页面池就绪: 共 {} 个页面", pages.len());
        Ok(pages)
    }

    async fn allocate(&self, pages: &mut PageMap, identity: &str) -> Result<()> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("为账号 {} 创建页面失败: {}", identity, e))?;
        debug!("已为账号 {} 分配页面", identity);
        pages.insert(
            identity.to_string(),
            Arc::new(ChromeDriver::new(page, self.wait_timeout)),
        );
        Ok(())
    }
}
