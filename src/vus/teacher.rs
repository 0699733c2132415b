//! 虚拟教师旅程
//!
//! 新班级模式：注册账号（含拖拽验证码）→ 登录 → 创建班级 →
//! 发布班级代码 → 添加教学单元 → 循环授课。
//! 预置班级模式：直接登录 → 循环授课。
//!
//! 授课循环在"工作台批改"和"巡视教室"之间交替，
//! 每轮整体包在刷新重试里。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::VuConfig;
use crate::error::LoadError;
use crate::infrastructure::SharedPage;
use crate::model::Teacher;
use crate::vus::{Journey, VirtualUser};

/// 班级人数的合法区间（目标应用的下拉框只提供这些档位）
pub const MIN_CLASS_SIZE: usize = 2;
pub const MAX_CLASS_SIZE: usize = 40;

/// 教师逐键输入的间隔
const TYPING_DELAY: Duration = Duration::from_millis(100);

/// 新班级默认添加的教学单元
const UNITS: [&str; 4] = ["aiImpact", "aiIntro", "mlIntro", "mlPrincipals"];

// ========== 选择器 ==========

const LOGIN_LINK: &str = "text='Einloggen'";
const LOGIN_BUTTON: &str = "button:has-text('Einloggen')";
const LOGIN_EMAIL_INPUT: &str = "[placeholder='Nutzername/Email']";
const LOGIN_PASSWORD_INPUT: &str = "[placeholder='Passwort']";
const LOGIN_FAILED_TEXT: &str = "text='Einloggen nicht möglich!'";
const HOME_TEXT: &str = "text='Home'";

const REGISTER_BUTTON: &str = "button:has-text('Registrieren')";
const AS_TEACHER_OPTION: &str = "text='als Lehrer:in'";
const REGISTER_EMAIL_INPUT: &str = "[placeholder='Email']";
const REGISTER_PASSWORD_INPUT: &str = "[placeholder='Passwort']";
const REGISTER_PASSWORD_REPEAT_INPUT: &str = "[placeholder='Passwort wiederholen']";
const TERMS_CHECKBOX: &str = "label.checkbox:nth-of-type(2)";
const SKIP_DSGVO_BUTTON: &str = "#skipDsgvoButton";
const ACCEPT_DSGVO_BUTTON: &str = "#acceptDsgvoButton";
const READY_BUTTON: &str = "button:has-text('Bereit?')";
const CAPTCHA_SOURCE: &str = "[data-id=haveFun]";
const CAPTCHA_TARGET: &str = "[data-id=whilePlaying]";

const CREATE_CLASS_BUTTON: &str = "button:has-text('Klasse erstellen')";
const CLASS_NAME_INPUT: &str = "[placeholder='Klassenname']";
const GRADE_DROPDOWN: &str = "div[name=grade]";
const COUNT_DROPDOWN: &str = "div[name=count]";
const SUBMIT_BUTTON: &str = "button[type=submit]";
const CLASS_CODE_HEADING: &str = ".classCode h1";

const PREPARE_DROPDOWN: &str = ".customDropdown:has-text('Vorbereiten')";
const MATERIAL_TAB: &str = "h4:has-text('Material')";
const ADD_TO_CLASS_BUTTON: &str = "button:has-text('Zur Klasse hinzufügen')";
const HOME_LINK: &str = "a:has-text('Home')";

const TEACH_LINK: &str = "text='Unterrichten'";
const WORKSPACE_TAB: &str = "h4:has-text('Arbeitsplatz')";
const CLASSROOM_TAB: &str = "h4:has-text('Klassenraum')";
const WORKSPACE_AREA: &str = "#teacherWorkspaceArea";
const NOTHING_TO_DO_TEXT: &str = "text='Gerade nichts zu tun'";
const GRADE_TEXTAREA: &str = "#teacherWorkspaceArea textarea";
const GRADE_BUTTON: &str = "button:has-text('Bewerten')";
const GRADE_CONFIRM_BUTTON: &str = "button:has-text('ja')";

/// 虚拟教师
pub struct VirtualTeacher {
    account: Teacher,
    config: VuConfig,
    /// 授课循环的交替计数（偶数轮批改，奇数轮巡视）
    rounds: AtomicU64,
}

impl VirtualTeacher {
    /// 创建虚拟教师；新班级模式下校验开班参数
    pub fn new(account: Teacher, config: VuConfig) -> Result<Self, LoadError> {
        if config.class_log.is_some()
            && (config.class_name.is_none() || config.class_size.is_none())
        {
            return Err(LoadError::MissingClassParams);
        }
        if let Some(size) = config.class_size {
            if !(MIN_CLASS_SIZE..=MAX_CLASS_SIZE).contains(&size) {
                return Err(LoadError::InvalidClassSize { size });
            }
        }
        Ok(Self {
            account,
            config,
            rounds: AtomicU64::new(0),
        })
    }

    // ========== 注册 ==========

    async fn sign_up(&self, vu: &VirtualUser, page: &SharedPage) -> Result<()> {
        info!("[VU {}] 📝 注册教师账号", vu.id());
        page.click(REGISTER_BUTTON).await?;
        page.click(AS_TEACHER_OPTION).await?;

        page.type_text(REGISTER_EMAIL_INPUT, &self.account.email, TYPING_DELAY)
            .await?;
        page.type_text(REGISTER_PASSWORD_INPUT, &self.account.password, TYPING_DELAY)
            .await?;
        page.type_text(
            REGISTER_PASSWORD_REPEAT_INPUT,
            &self.account.password,
            TYPING_DELAY,
        )
        .await?;

        page.click(TERMS_CHECKBOX).await?;
        page.click(SKIP_DSGVO_BUTTON).await?;
        page.click(ACCEPT_DSGVO_BUTTON).await?;
        page.click(READY_BUTTON).await?;

        // 拖拽式验证码：把"haveFun"卡片拖进"whilePlaying"槽位
        vu.time("captcha", true, async {
            Ok(page.drag(CAPTCHA_SOURCE, CAPTCHA_TARGET).await?)
        })
        .await?;
        vu.think().await;
        Ok(())
    }

    // ========== 登录 ==========

    async fn login(&self, vu: &VirtualUser, page: &SharedPage) -> Result<()> {
        info!("[VU {}] 🔑 登录: {}", vu.id(), self.account.email);
        vu.think().await;
        page.click(LOGIN_LINK).await?;

        page.type_text(LOGIN_EMAIL_INPUT, &self.account.email, TYPING_DELAY)
            .await?;
        page.type_text(LOGIN_PASSWORD_INPUT, &self.account.password, TYPING_DELAY)
            .await?;

        vu.time("login", true, self.confirm_login(page)).await?;
        vu.think().await;
        Ok(())
    }

    async fn confirm_login(&self, page: &SharedPage) -> Result<()> {
        page.click(LOGIN_BUTTON).await?;
        let landed = page.wait_for_any(&[LOGIN_FAILED_TEXT, HOME_TEXT]).await?;
        if landed != 1 {
            bail!("登录被拒绝: {}", self.account.email);
        }
        Ok(())
    }

    // ========== 开班 ==========

    async fn create_class(
        &self,
        vu: &VirtualUser,
        page: &SharedPage,
        name: &str,
        size: usize,
    ) -> Result<String> {
        info!("[VU {}] 🏫 创建班级 \"{}\"（{} 人）", vu.id(), name, size);
        let code = vu
            .time("class_create", true, self.do_create_class(page, name, size))
            .await?;
        info!("[VU {}] ✓ 班级代码: {}", vu.id(), code);
        vu.think().await;
        Ok(code)
    }

    async fn do_create_class(
        &self,
        page: &SharedPage,
        name: &str,
        size: usize,
    ) -> Result<String> {
        page.click(CREATE_CLASS_BUTTON).await?;
        page.fill(CLASS_NAME_INPUT, name).await?;

        page.click(GRADE_DROPDOWN).await?;
        page.click(&format!("{} [role=option]:has-text('6')", GRADE_DROPDOWN))
            .await?;
        page.click(COUNT_DROPDOWN).await?;
        page.click(&format!(
            "{} [role=option]:has-text('{}')",
            COUNT_DROPDOWN, size
        ))
        .await?;

        page.click(SUBMIT_BUTTON).await?;

        let code = page.inner_text(CLASS_CODE_HEADING).await?;
        let code = code.trim();
        if code.is_empty() {
            bail!("页面上没有出现班级代码");
        }
        Ok(code.to_string())
    }

    /// 把教学单元逐个加进新班级
    async fn add_units(&self, vu: &VirtualUser, page: &SharedPage) -> Result<()> {
        info!("[VU {}] 📚 添加 {} 个教学单元", vu.id(), UNITS.len());
        page.click(PREPARE_DROPDOWN).await?;
        page.click(MATERIAL_TAB).await?;

        for unit in UNITS {
            page.click(&format!("#{}", unit)).await?;
            page.click(ADD_TO_CLASS_BUTTON).await?;
            vu.think().await;
            vu.think().await;
        }

        page.click(HOME_LINK).await?;
        Ok(())
    }

    // ========== 授课 ==========

    async fn teach_once(&self, vu: &VirtualUser, page: &SharedPage) -> Result<()> {
        page.click(TEACH_LINK).await?;

        if self.rounds.fetch_add(1, Ordering::Relaxed) % 2 == 0 {
            page.click(WORKSPACE_TAB).await?;
            self.grade_pending(vu, page).await?;
        } else {
            page.click(CLASSROOM_TAB).await?;
        }

        vu.think().await;
        vu.think().await;
        Ok(())
    }

    async fn grade_pending(&self, vu: &VirtualUser, page: &SharedPage) -> Result<()> {
        let landed = page
            .wait_for_any(&[WORKSPACE_AREA, NOTHING_TO_DO_TEXT])
            .await?;
        if landed == 0 {
            info!("[VU {}] 📝 批改待处理的提交", vu.id());
            vu.time("grade", true, self.do_grade(page)).await?;
        }
        Ok(())
    }

    async fn do_grade(&self, page: &SharedPage) -> Result<()> {
        page.fill(GRADE_TEXTAREA, "abcdefghijklmnopqrstuvwxyz!!!")
            .await?;
        page.click(GRADE_BUTTON).await?;
        page.click(GRADE_CONFIRM_BUTTON).await?;
        Ok(())
    }
}

#[async_trait]
impl Journey for VirtualTeacher {
    async fn run(&self, vu: &VirtualUser, page: &SharedPage) -> Result<()> {
        vu.think().await;
        page.goto(&self.config.page_url).await?;

        // 新班级模式需要先注册教师账号
        if self.config.class_log.is_some() {
            vu.retry_refreshing(page, || self.sign_up(vu, page)).await?;
        }
        // 目标应用注册完成后不会自动登录，总是走一遍登录
        vu.retry_refreshing(page, || self.login(vu, page)).await?;

        if let Some(class_log) = &self.config.class_log {
            let name = self
                .config
                .class_name
                .as_deref()
                .ok_or(LoadError::MissingClassParams)?;
            let size = self.config.class_size.ok_or(LoadError::MissingClassParams)?;

            let code = vu
                .retry_refreshing(page, || self.create_class(vu, page, name, size))
                .await?;
            class_log.publish(&code);

            vu.retry_refreshing(page, || self.add_units(vu, page)).await?;
        }

        while vu.session_active() {
            vu.retry_refreshing(page, || self.teach_once(vu, page)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use serde_json::Value as JsonValue;

    use super::*;
    use crate::infrastructure::page_driver::{DriverError, PageDriver};
    use crate::metrics::NullSink;
    use crate::services::{Instrument, Pacing, Session};

    /// 所有操作立即成功的空驱动
    struct YieldingPage;

    #[async_trait]
    impl PageDriver for YieldingPage {
        async fn goto(&self, _url: &str) -> Result<(), DriverError> {
            Ok(())
        }
        async fn reload(&self) -> Result<(), DriverError> {
            Ok(())
        }
        async fn wait_for(&self, _selector: &str) -> Result<(), DriverError> {
            Ok(())
        }
        async fn wait_for_any(&self, _selectors: &[&str]) -> Result<usize, DriverError> {
            Ok(0)
        }
        async fn exists(&self, _selector: &str) -> Result<bool, DriverError> {
            Ok(false)
        }
        async fn click(&self, _selector: &str) -> Result<(), DriverError> {
            Ok(())
        }
        async fn fill(&self, _selector: &str, _text: &str) -> Result<(), DriverError> {
            Ok(())
        }
        async fn type_text(
            &self,
            _selector: &str,
            _text: &str,
            _per_key_delay: Duration,
        ) -> Result<(), DriverError> {
            Ok(())
        }
        async fn attribute(
            &self,
            _selector: &str,
            _name: &str,
        ) -> Result<Option<String>, DriverError> {
            Ok(None)
        }
        async fn inner_text(&self, _selector: &str) -> Result<String, DriverError> {
            Ok(String::new())
        }
        async fn drag(&self, _source: &str, _target: &str) -> Result<(), DriverError> {
            Ok(())
        }
        async fn eval(&self, _js: &str) -> Result<JsonValue, DriverError> {
            Ok(JsonValue::Null)
        }
        async fn screenshot(&self, _path: &Path) -> Result<(), DriverError> {
            Ok(())
        }
        async fn html_dump(&self, _path: &Path) -> Result<(), DriverError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    fn pacing_vu(factor: f64) -> VirtualUser {
        let (events_tx, _events_rx) = tokio::sync::mpsc::unbounded_channel();
        VirtualUser::new(
            "lehrer-test".to_string(),
            Session::new(),
            Pacing::new(factor).expect("因子合法"),
            Instrument::new(Arc::new(NullSink), vec![]),
            None,
            events_tx,
        )
    }

    fn teacher_account() -> Teacher {
        Teacher {
            email: "lehrer@example.com".to_string(),
            password: "geheim".to_string(),
        }
    }

    fn new_class_config(size: usize) -> VuConfig {
        VuConfig {
            page_url: "http://localhost:8080".to_string(),
            think_time_factor: 1.0,
            class_name: Some("Klasse 6b".to_string()),
            class_size: Some(size),
            class_log: Some(std::sync::Arc::new(
                crate::services::ClassLog::new(size),
            )),
            join_code: None,
        }
    }

    #[test]
    fn test_class_size_bounds_accepted() {
        assert!(VirtualTeacher::new(teacher_account(), new_class_config(2)).is_ok());
        assert!(VirtualTeacher::new(teacher_account(), new_class_config(40)).is_ok());
    }

    #[test]
    fn test_class_size_out_of_bounds_rejected() {
        for size in [0, 1, 41, 100] {
            let err = VirtualTeacher::new(teacher_account(), new_class_config(size))
                .err()
                .expect("越界的班级人数必须被拒绝");
            assert!(matches!(err, LoadError::InvalidClassSize { .. }));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_units_pauses_twice_per_unit() {
        let factor = 0.01;
        let vu = pacing_vu(factor);
        let page: SharedPage = Arc::new(YieldingPage);
        let teacher =
            VirtualTeacher::new(teacher_account(), new_class_config(10)).expect("配置合法");

        let begin = tokio::time::Instant::now();
        for _ in 0..3 {
            teacher
                .add_units(&vu, &page)
                .await
                .expect("添加单元应该成功");
        }

        // 3 轮 × 4 单元 × 2 次停顿。总时长必须超过每单元
        // 只停一次时的严格上界 12 × 1.5 × 10s × 因子
        let floor = Duration::from_secs_f64(180.0 * factor);
        assert!(
            begin.elapsed() >= floor,
            "每个单元后应有两次停顿，实际用时 {:?}",
            begin.elapsed()
        );
    }

    #[test]
    fn test_new_class_requires_name_and_size() {
        let mut config = new_class_config(10);
        config.class_name = None;
        let err = VirtualTeacher::new(teacher_account(), config)
            .err()
            .expect("缺少班级名称必须被拒绝");
        assert!(matches!(err, LoadError::MissingClassParams));
    }

    #[test]
    fn test_prepared_class_skips_size_check() {
        let config = VuConfig {
            page_url: "http://localhost:8080".to_string(),
            think_time_factor: 1.0,
            ..Default::default()
        };
        assert!(VirtualTeacher::new(teacher_account(), config).is_ok());
    }
}
