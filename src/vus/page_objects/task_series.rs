//! 任务系列
//!
//! 学生视角的一个"订单"：一串练习加一次整体提交。
//! 做题循环在会话停止或系列提交按钮出现时结束；
//! 循环体里 10% 概率发一条聊天消息制造额外负载。

use anyhow::{anyhow, Result};
use rand::Rng;
use tracing::info;

use crate::infrastructure::SharedPage;
use crate::metrics::{EXERCISES_SUBMITTED, TASK_SERIES_SUBMITTED};
use crate::vus::page_objects::{exercises, ExerciseRegistry};
use crate::vus::VirtualUser;

// ========== 选择器 ==========

const SERIES_HEADING: &str = "h1";
const SERIES_SUBMIT_BUTTON: &str = ".taskSeries__submitButton";
const PROCEED_MARKER: &str = ".proceed";
const NEXT_BUTTON: &str = "button:has-text('Weiter')";
const ORDERS_TEXT: &str = "text='Aufträge'";

/// 最后一个练习主体的类型元素
const EXERCISE_TYPE: &str = ".exercise:last-of-type > div > div:nth-of-type(3)";

const MESSAGES_LINK: &str = "a:has-text('Nachrichten')";
const CHAT_TEXTAREA: &str = ".chat textarea";
const CHAT_SEND_BUTTON: &str = ".chat button";

/// 一个打开中的任务系列
pub struct TaskSeries<'a> {
    vu: &'a VirtualUser,
    page: &'a SharedPage,
    registry: &'a ExerciseRegistry,
}

impl<'a> TaskSeries<'a> {
    pub fn new(vu: &'a VirtualUser, page: &'a SharedPage, registry: &'a ExerciseRegistry) -> Self {
        Self { vu, page, registry }
    }

    /// 读取系列标题（仅用于日志与续做判断，不计入主要操作）
    pub async fn heading(&self) -> Result<String> {
        let heading = self
            .vu
            .time("taskseries_heading", false, async {
                Ok(self.page.inner_text(SERIES_HEADING).await?)
            })
            .await?;
        Ok(heading.trim().to_string())
    }

    /// 做完整个系列并提交
    pub async fn work(&self) -> Result<()> {
        while self.vu.session_active() && !self.page.exists(SERIES_SUBMIT_BUTTON).await? {
            if rand::rng().random_bool(0.1) {
                self.send_chat_message().await?;
            }
            self.vu.think_for(2.0).await;

            // proceed 标记表示当前练习已做完、只差翻页
            if !self.page.exists(PROCEED_MARKER).await? {
                self.work_current_exercise().await?;
            }
            self.page.click(NEXT_BUTTON).await?;
        }

        self.vu.think_for(2.0).await;
        info!("[VU {}] 📤 提交任务系列", self.vu.id());
        self.vu
            .time("taskseries_submit", true, self.submit())
            .await?;
        self.vu.count(TASK_SERIES_SUBMITTED);
        Ok(())
    }

    async fn work_current_exercise(&self) -> Result<()> {
        let exercise = self.next_exercise().await?;
        exercise
            .work(self.page.as_ref(), self.vu.pacing())
            .await?;
        exercises::consume_hints(self.page.as_ref(), self.vu.pacing()).await?;

        // 评判不通过不是错误，重做直到被接受
        loop {
            let accepted = self
                .vu
                .time("exercise_submit", true, exercise.submit(self.page.as_ref()))
                .await?;
            if accepted {
                break;
            }
            info!("[VU {}] ✏️ 练习未通过，重做", self.vu.id());
            self.vu.think_for(2.0).await;
        }

        info!("[VU {}] ✓ 练习已提交", self.vu.id());
        self.vu.count(EXERCISES_SUBMITTED);
        self.vu.think_for(2.0).await;
        Ok(())
    }

    async fn next_exercise(&self) -> Result<Box<dyn exercises::Exercise>> {
        let type_tag = self
            .vu
            .time("exercise_type", false, async {
                Ok(self.page.attribute(EXERCISE_TYPE, "class").await?)
            })
            .await?
            .ok_or_else(|| anyhow!("练习主体没有类型标签"))?;

        self.registry
            .create(&type_tag)
            .ok_or_else(|| anyhow!("未注册的练习类型: \"{}\"", type_tag))
    }

    async fn submit(&self) -> Result<()> {
        self.page.click(SERIES_SUBMIT_BUTTON).await?;
        self.page.wait_for(ORDERS_TEXT).await?;
        Ok(())
    }

    async fn send_chat_message(&self) -> Result<()> {
        info!("[VU {}] 💬 发一条聊天消息", self.vu.id());
        self.page.click(MESSAGES_LINK).await?;
        self.page.fill(CHAT_TEXTAREA, "asdfghjkl").await?;
        self.page.click(CHAT_SEND_BUTTON).await?;
        self.page.click(MESSAGES_LINK).await?;
        Ok(())
    }
}
