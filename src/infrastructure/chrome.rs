//! chromiumoxide 页面驱动实现
//!
//! 唯一的 Page 持有者。等待语义通过轮询实现：
//! chromiumoxide 没有内置的 wait-for-selector，这里以固定间隔
//! 轮询 querySelector，超过配置的时限返回 `DriverError::Timeout`。

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Element, Page};
use serde_json::Value as JsonValue;
use tokio::time::{sleep, Instant};

use super::page_driver::{DriverError, PageDriver};

/// 元素轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// chromiumoxide 页面驱动
pub struct ChromeDriver {
    page: Page,
    wait_timeout: Duration,
}

impl ChromeDriver {
    pub fn new(page: Page, wait_timeout: Duration) -> Self {
        Self { page, wait_timeout }
    }

    /// 轮询等待元素出现
    async fn wait_for_element(&self, selector: &str) -> Result<Element, DriverError> {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    selector: selector.to_string(),
                    timeout: self.wait_timeout,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn dispatch_mouse(
        &self,
        kind: DispatchMouseEventType,
        x: f64,
        y: f64,
        button: Option<MouseButton>,
    ) -> Result<(), DriverError> {
        let mut builder = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(x)
            .y(y);
        if let Some(button) = button {
            builder = builder.button(button);
        }
        let params = builder.build().map_err(DriverError::protocol)?;
        self.page
            .execute(params)
            .await
            .map_err(DriverError::protocol)?;
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn reload(&self) -> Result<(), DriverError> {
        self.page.reload().await.map_err(DriverError::protocol)?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str) -> Result<(), DriverError> {
        self.wait_for_element(selector).await?;
        Ok(())
    }

    async fn wait_for_any(&self, selectors: &[&str]) -> Result<usize, DriverError> {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            for (index, selector) in selectors.iter().enumerate() {
                if self.page.find_element(*selector).await.is_ok() {
                    return Ok(index);
                }
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    selector: selectors.join(" | "),
                    timeout: self.wait_timeout,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn exists(&self, selector: &str) -> Result<bool, DriverError> {
        Ok(self.page.find_element(selector).await.is_ok())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let element = self.wait_for_element(selector).await?;
        element.click().await.map_err(DriverError::protocol)?;
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), DriverError> {
        let element = self.wait_for_element(selector).await?;
        element.click().await.map_err(DriverError::protocol)?;
        element.type_str(text).await.map_err(DriverError::protocol)?;
        Ok(())
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        per_key_delay: Duration,
    ) -> Result<(), DriverError> {
        let element = self.wait_for_element(selector).await?;
        element.click().await.map_err(DriverError::protocol)?;
        // 目标应用在输入时异步校验用户名是否存在，必须逐键输入
        let mut buffer = [0u8; 4];
        for ch in text.chars() {
            element
                .type_str(&*ch.encode_utf8(&mut buffer))
                .await
                .map_err(DriverError::protocol)?;
            sleep(per_key_delay).await;
        }
        Ok(())
    }

    async fn attribute(
        &self,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let element = self.wait_for_element(selector).await?;
        element.attribute(name).await.map_err(DriverError::protocol)
    }

    async fn inner_text(&self, selector: &str) -> Result<String, DriverError> {
        let element = self.wait_for_element(selector).await?;
        let text = element
            .inner_text()
            .await
            .map_err(DriverError::protocol)?
            .ok_or_else(|| DriverError::MissingContent {
                selector: selector.to_string(),
            })?;
        Ok(text)
    }

    async fn drag(&self, source: &str, target: &str) -> Result<(), DriverError> {
        let source_element = self.wait_for_element(source).await?;
        let target_element = self.wait_for_element(target).await?;
        let from = source_element
            .clickable_point()
            .await
            .map_err(DriverError::protocol)?;
        let to = target_element
            .clickable_point()
            .await
            .map_err(DriverError::protocol)?;

        self.dispatch_mouse(DispatchMouseEventType::MouseMoved, from.x, from.y, None)
            .await?;
        self.dispatch_mouse(
            DispatchMouseEventType::MousePressed,
            from.x,
            from.y,
            Some(MouseButton::Left),
        )
        .await?;
        self.dispatch_mouse(
            DispatchMouseEventType::MouseMoved,
            to.x,
            to.y,
            Some(MouseButton::Left),
        )
        .await?;
        self.dispatch_mouse(
            DispatchMouseEventType::MouseReleased,
            to.x,
            to.y,
            Some(MouseButton::Left),
        )
        .await?;
        Ok(())
    }

    async fn eval(&self, js: &str) -> Result<JsonValue, DriverError> {
        let result = self
            .page
            .evaluate(js)
            .await
            .map_err(DriverError::protocol)?;
        result.into_value().map_err(DriverError::protocol)
    }

    async fn screenshot(&self, path: &Path) -> Result<(), DriverError> {
        self.page
            .save_screenshot(
                ScreenshotParams::builder().full_page(true).build(),
                path,
            )
            .await
            .map_err(DriverError::protocol)?;
        Ok(())
    }

    async fn html_dump(&self, path: &Path) -> Result<(), DriverError> {
        let html = self.page.content().await.map_err(DriverError::protocol)?;
        tokio::fs::write(path, html)
            .await
            .map_err(DriverError::protocol)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(DriverError::protocol)?;
        Ok(())
    }
}
