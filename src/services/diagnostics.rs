//! 失败现场采集
//!
//! 可重试的失败发生时，把页面 HTML 和截图落盘。
//! 采集失败只记警告，绝不升级进重试流程。

use std::path::PathBuf;

use tracing::warn;

use crate::infrastructure::PageDriver;

/// 现场记录器
#[derive(Clone, Debug)]
pub struct PageRecorder {
    dir: PathBuf,
}

impl PageRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 记录 `{dir}/{id}-{timestamp}.html` 和 `.png`
    pub async fn record(&self, page: &dyn PageDriver, id: &str) {
        let stamp = chrono::Local::now().format("%Y%m%dT%H%M%S%.3f");
        let base = self.dir.join(format!("{}-{}", id, stamp));

        if let Err(e) = page.html_dump(&base.with_extension("html")).await {
            warn!("[VU {}] ⚠️ HTML 快照写入失败: {}", id, e);
        }
        if let Err(e) = page.screenshot(&base.with_extension("png")).await {
            warn!("[VU {}] ⚠️ 截图失败: {}", id, e);
        }
    }
}
