//! 虚拟学生旅程
//!
//! 新班级模式：等 Runner 拿到班级代码后启动，走注册 + 创办公司。
//! 预置班级模式：直接登录已有账号。
//! 之后循环领取任务系列、逐题作答、提交，间或聊天、求助、投资。
//!
//! 每轮任务系列整体包在刷新重试里；为了让刷新后能接着做同一个
//! 系列，当前系列标题记录在内部状态里。

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::VuConfig;
use crate::infrastructure::SharedPage;
use crate::model::Pupil;
use crate::vus::page_objects::{ExerciseRegistry, TaskSeries};
use crate::vus::{Journey, VirtualUser};

/// 学生逐键输入的间隔（比教师慢，模拟更生疏的打字）
const TYPING_DELAY: Duration = Duration::from_millis(200);

// ========== 选择器 ==========

const LOGIN_LINK: &str = "text='Einloggen'";
const LOGIN_BUTTON: &str = "button:has-text('Einloggen')";
const USERNAME_INPUT: &str = "[placeholder='Nutzername/Email']";
const PASSWORD_INPUT: &str = "[placeholder='Passwort']";
const LOGIN_FAILED_TEXT: &str = "text='Einloggen nicht möglich!'";
const ORDERS_TEXT: &str = "text='Aufträge'";

const JOIN_CODE_INPUT: &str = "[placeholder='Code']";
const JOIN_NEXT_BUTTON: &str = "button:has-text('Weiter')";
const REGISTER_USERNAME_INPUT: &str = "[placeholder='Nutzername']";
const REGISTER_BUTTON: &str = "button:has-text('Registrieren')";
const COMPANY_NAME_INPUT: &str = "[placeholder='Name des Unternehmens']";
const FOUND_COMPANY_BUTTON: &str = "button:has-text('Unternehmen gründen')";

const ACCEPT_SERIES_BUTTON: &str = "text=Annehmen";
const TASK_SERIES_AREA: &str = "#taskSeries";
const DISMISS_BUTTON: &str = "button:has-text('OK')";

const OFFICE: &str = ".office";
const OFFICE_SELECTION_BUTTON: &str = ".officeSelection__button";
const BACK_TO_JOBS: &str = "#jobs__0";

/// 办公室高亮脉冲表示有可用投资
const INVESTMENT_CHECK_JS: &str = "(() => { \
     const office = document.querySelector('.office'); \
     return office !== null && office.parentElement.className.includes('-pulse'); \
 })()";

/// 虚拟学生
pub struct VirtualPupil {
    account: Pupil,
    config: VuConfig,
    registry: ExerciseRegistry,
    /// 正在做的任务系列标题，用于刷新重试后续做
    current_series: Mutex<Option<String>>,
}

impl VirtualPupil {
    pub fn new(account: Pupil, config: VuConfig) -> Self {
        Self {
            account,
            config,
            registry: ExerciseRegistry::default(),
            current_series: Mutex::new(None),
        }
    }

    fn current_series(&self) -> Option<String> {
        self.current_series
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_current_series(&self, value: Option<String>) {
        *self
            .current_series
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = value;
    }

    // ========== 注册 ==========

    async fn register(&self, vu: &VirtualUser, page: &SharedPage, join_code: &str) -> Result<()> {
        info!(
            "[VU {}] 📝 用班级代码 {} 注册学生账号",
            vu.id(),
            join_code
        );
        page.fill(JOIN_CODE_INPUT, join_code).await?;
        page.click(JOIN_NEXT_BUTTON).await?;

        page.type_text(REGISTER_USERNAME_INPUT, &self.account.username, TYPING_DELAY)
            .await?;
        page.type_text(PASSWORD_INPUT, &self.account.password, TYPING_DELAY)
            .await?;

        vu.time("register", true, async {
            Ok(page.click(REGISTER_BUTTON).await?)
        })
        .await?;
        vu.think().await;

        self.found_company(vu, page).await
    }

    /// 注册之后的第一步是给自己的公司起名
    async fn found_company(&self, vu: &VirtualUser, page: &SharedPage) -> Result<()> {
        info!("[VU {}] 🏢 创办公司 \"{}\"", vu.id(), self.account.company);
        vu.time("company_found", true, self.do_found_company(page))
            .await?;
        vu.think().await;
        Ok(())
    }

    async fn do_found_company(&self, page: &SharedPage) -> Result<()> {
        page.fill(COMPANY_NAME_INPUT, &self.account.company).await?;
        page.click(FOUND_COMPANY_BUTTON).await?;
        page.wait_for(ORDERS_TEXT).await?;
        Ok(())
    }

    // ========== 登录 ==========

    async fn login(&self, vu: &VirtualUser, page: &SharedPage) -> Result<()> {
        info!("[VU {}] 🔑 登录: {}", vu.id(), self.account.username);
        vu.think().await;
        page.click(LOGIN_LINK).await?;

        page.type_text(USERNAME_INPUT, &self.account.username, TYPING_DELAY)
            .await?;
        page.type_text(PASSWORD_INPUT, &self.account.password, TYPING_DELAY)
            .await?;

        vu.time("login", true, self.confirm_login(page)).await?;
        vu.think().await;
        Ok(())
    }

    async fn confirm_login(&self, page: &SharedPage) -> Result<()> {
        page.click(LOGIN_BUTTON).await?;
        let landed = page.wait_for_any(&[LOGIN_FAILED_TEXT, ORDERS_TEXT]).await?;
        if landed != 1 {
            bail!("登录被拒绝: {}", self.account.username);
        }
        Ok(())
    }

    // ========== 做题 ==========

    /// 领取并完成一个任务系列（刷新重试的重做单元）
    async fn play(&self, vu: &VirtualUser, page: &SharedPage) -> Result<()> {
        let series = TaskSeries::new(vu, page, &self.registry);

        let resuming = self.current_series();
        if resuming.is_none() {
            vu.think().await;
            vu.time("taskseries_accept", true, self.accept_task_series(page))
                .await?;
        }

        let heading = series.heading().await?;
        match &resuming {
            Some(previous) if *previous == heading => {
                info!("[VU {}] 🔁 续做任务系列 \"{}\"", vu.id(), heading);
            }
            _ => info!("[VU {}] 📋 开始任务系列 \"{}\"", vu.id(), heading),
        }
        self.set_current_series(Some(heading));

        series.work().await?;
        self.set_current_series(None);

        // 系列提交后的确认弹窗
        page.click(DISMISS_BUTTON).await?;

        if self.investment_available(page).await? {
            self.invest(vu, page).await?;
        }

        vu.think().await;
        Ok(())
    }

    async fn accept_task_series(&self, page: &SharedPage) -> Result<()> {
        page.click(ACCEPT_SERIES_BUTTON).await?;
        page.wait_for(TASK_SERIES_AREA).await?;
        Ok(())
    }

    // ========== 投资 ==========

    async fn investment_available(&self, page: &SharedPage) -> Result<bool> {
        let value = page.eval(INVESTMENT_CHECK_JS).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn invest(&self, vu: &VirtualUser, page: &SharedPage) -> Result<()> {
        info!("[VU {}] 💰 把挣到的钱投进办公室", vu.id());
        vu.time("investment", true, async {
            page.click(OFFICE).await?;
            page.click(OFFICE_SELECTION_BUTTON).await?;
            Ok(page.click(BACK_TO_JOBS).await?)
        })
        .await?;
        vu.think().await;
        Ok(())
    }
}

#[async_trait]
impl Journey for VirtualPupil {
    async fn run(&self, vu: &VirtualUser, page: &SharedPage) -> Result<()> {
        vu.think().await;
        page.goto(&self.config.page_url).await?;

        if let Some(join_code) = &self.config.join_code {
            vu.retry_refreshing(page, || self.register(vu, page, join_code))
                .await?;
        } else {
            vu.retry_refreshing(page, || self.login(vu, page)).await?;
        }

        while vu.session_active() {
            vu.retry_refreshing(page, || self.play(vu, page)).await?;
        }
        Ok(())
    }
}
