//! 练习类型
//!
//! 每种练习有一个平均作答时长和自己的提交方式。提交分两类结局：
//! - 直接提交（自由文本、问卷）：总是被接受
//! - 带评判的提交（选择题、填空题）：页面三选一竞速——
//!   成功对勾 / 阻塞弹窗 / 提示面板，前两者算通过，后者要重做

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use rand::Rng;
use tracing::info;

use crate::infrastructure::PageDriver;
use crate::services::Pacing;

// ========== 选择器 ==========

const SUCCESS_CHECKMARK: &str = "svg.success__checkmark";
const BLOCKING_MODAL: &str = ".ppSwal";
const HINT_PANEL: &str = ".exerciseHints";
const DISMISS_BUTTON: &str = "button:has-text('OK')";
const HINT_BUTTON: &str = ".exerciseHints button";

const HELP_BUTTON: &str = "button:has-text('Fragen')";
const HELP_TEXTAREA: &str = ".ppSwal textarea";
const HELP_SUBMIT: &str = "text='Frage stellen!'";

const FREE_TEXT_EDITOR: &str = ".ql-editor";
const HAND_IN_BUTTON: &str = "button:has-text('Abgeben')";

const SURVEY_BODY: &str = ".survey > div";
const SURVEY_CHOICE: &str = ".survey .checkboxesContainer";
const VOTE_BUTTON: &str = "button:has-text('Abstimmen')";

const CHECK_BUTTON: &str = "button:has-text('Überprüfen')";
const INPUT_FIELD: &str = "#input";

/// 提示面板一次最多点掉的提示数（防御页面异常时死循环）
const MAX_HINTS: usize = 10;

/// 拖动问卷滑块的脚本（触发 change 让前端框架感知）
const SLIDER_JS: &str = "(() => { \
     const slider = document.querySelector('.rangeSlider input[type=range]'); \
     slider.stepUp(); \
     slider.dispatchEvent(new Event('change', { bubbles: true })); \
 })()";

/// 一类练习的作答与提交行为
#[async_trait]
pub trait Exercise: Send + Sync {
    /// 练习主体元素上的类型标签
    fn type_tag(&self) -> &'static str;

    /// 平均作答时长（秒），作为 think 抽样的基准
    fn avg_work_duration_secs(&self) -> f64;

    /// 作答：默认只是按平均时长 think
    async fn work(&self, _page: &dyn PageDriver, pacing: &Pacing) -> Result<()> {
        pacing.think_for(self.avg_work_duration_secs()).await;
        Ok(())
    }

    /// 提交；返回是否被接受（未接受时调用方继续重做）
    async fn submit(&self, page: &dyn PageDriver) -> Result<bool>;
}

/// 等待提交的三种结局之一
///
/// 成功对勾直接通过；阻塞弹窗点掉后也算通过；提示面板表示答错。
pub async fn evaluate(page: &dyn PageDriver) -> Result<bool> {
    let landed = page
        .wait_for_any(&[SUCCESS_CHECKMARK, BLOCKING_MODAL, HINT_PANEL])
        .await?;
    match landed {
        0 => Ok(true),
        1 => {
            page.click(DISMISS_BUTTON).await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// 把当前可见的提示逐个点掉
pub async fn consume_hints(page: &dyn PageDriver, pacing: &Pacing) -> Result<()> {
    for _ in 0..MAX_HINTS {
        if !page.exists(HINT_BUTTON).await? {
            return Ok(());
        }
        page.click(HINT_BUTTON).await?;
        pacing.think_for(2.0).await;
    }
    Ok(())
}

/// 向教师提一个问题
async fn request_help(page: &dyn PageDriver) -> Result<()> {
    info!("❓ 向教师求助");
    page.click(HELP_BUTTON).await?;
    page.fill(HELP_TEXTAREA, "qwertyuiopasdfghjkl").await?;
    page.click(HELP_SUBMIT).await?;
    Ok(())
}

// ========== 自由文本 ==========

/// 长篇自由文本练习：作答最久，30% 概率先求助
pub struct FreeText;

#[async_trait]
impl Exercise for FreeText {
    fn type_tag(&self) -> &'static str {
        "freeText"
    }

    fn avg_work_duration_secs(&self) -> f64 {
        300.0
    }

    async fn work(&self, page: &dyn PageDriver, pacing: &Pacing) -> Result<()> {
        if rand::rng().random_bool(0.3) {
            request_help(page).await?;
        }
        pacing.think_for(self.avg_work_duration_secs()).await;
        page.fill(
            FREE_TEXT_EDITOR,
            "Lorem ipsum dolor sit amet, consectetur adipisici elit, sed eiusmod \
             tempor incidunt ut labore et dolore magna aliqua.",
        )
        .await?;
        Ok(())
    }

    async fn submit(&self, page: &dyn PageDriver) -> Result<bool> {
        // 自由文本交给教师批改，没有机器评判
        page.click(HAND_IN_BUTTON).await?;
        Ok(true)
    }
}

// ========== 问卷 ==========

/// 问卷练习：按子类型选一项或拖滑块，投票即通过
pub struct Survey;

#[async_trait]
impl Exercise for Survey {
    fn type_tag(&self) -> &'static str {
        "survey"
    }

    fn avg_work_duration_secs(&self) -> f64 {
        60.0
    }

    async fn work(&self, page: &dyn PageDriver, pacing: &Pacing) -> Result<()> {
        if rand::rng().random_bool(0.2) {
            request_help(page).await?;
        }
        pacing.think_for(self.avg_work_duration_secs()).await;

        let subtype = page
            .attribute(SURVEY_BODY, "class")
            .await?
            .unwrap_or_default();
        if subtype.contains("multipleChoice") {
            page.click(SURVEY_CHOICE).await?;
        } else if subtype.contains("rangeSlider") {
            page.eval(SLIDER_JS).await?;
        } else {
            bail!("未知的问卷子类型: \"{}\"", subtype);
        }
        Ok(())
    }

    async fn submit(&self, page: &dyn PageDriver) -> Result<bool> {
        page.click(VOTE_BUTTON).await?;
        Ok(true)
    }
}

// ========== 选择题 ==========

/// 选择题练习：20% 概率求助，提交后走三选一评判
pub struct MultipleChoice;

#[async_trait]
impl Exercise for MultipleChoice {
    fn type_tag(&self) -> &'static str {
        "multipleChoice"
    }

    fn avg_work_duration_secs(&self) -> f64 {
        60.0
    }

    async fn work(&self, page: &dyn PageDriver, pacing: &Pacing) -> Result<()> {
        if rand::rng().random_bool(0.2) {
            request_help(page).await?;
        }
        pacing.think_for(self.avg_work_duration_secs()).await;
        Ok(())
    }

    async fn submit(&self, page: &dyn PageDriver) -> Result<bool> {
        page.click(CHECK_BUTTON).await?;
        evaluate(page).await
    }
}

// ========== 填空 ==========

/// 单行填空练习：最快的一类，提交后走三选一评判
pub struct InputField;

#[async_trait]
impl Exercise for InputField {
    fn type_tag(&self) -> &'static str {
        "input__Field"
    }

    fn avg_work_duration_secs(&self) -> f64 {
        20.0
    }

    async fn work(&self, page: &dyn PageDriver, pacing: &Pacing) -> Result<()> {
        pacing.think_for(self.avg_work_duration_secs()).await;
        page.fill(INPUT_FIELD, "1").await?;
        Ok(())
    }

    async fn submit(&self, page: &dyn PageDriver) -> Result<bool> {
        page.click(CHECK_BUTTON).await?;
        evaluate(page).await
    }
}

// ========== 注册表 ==========

type ExerciseCtor = fn() -> Box<dyn Exercise>;

/// 练习类型注册表
///
/// 页面上的类型标签映射到练习实现；未注册的标签是致命错误，
/// 意味着目标应用出现了压测脚本不认识的练习。
pub struct ExerciseRegistry {
    ctors: HashMap<&'static str, ExerciseCtor>,
}

impl ExerciseRegistry {
    pub fn empty() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    pub fn register(&mut self, tag: &'static str, ctor: ExerciseCtor) {
        self.ctors.insert(tag, ctor);
    }

    /// class 属性可能带有额外的修饰类，按空白拆分后精确匹配
    pub fn create(&self, tag: &str) -> Option<Box<dyn Exercise>> {
        tag.split_whitespace()
            .find_map(|class| self.ctors.get(class))
            .map(|ctor| ctor())
    }
}

impl Default for ExerciseRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("freeText", || Box::new(FreeText));
        registry.register("survey", || Box::new(Survey));
        registry.register("multipleChoice", || Box::new(MultipleChoice));
        registry.register("input__Field", || Box::new(InputField));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_knows_all_stock_types() {
        let registry = ExerciseRegistry::default();
        for tag in ["freeText", "survey", "multipleChoice", "input__Field"] {
            let exercise = registry.create(tag);
            assert!(exercise.is_some(), "库存类型 {} 应该已注册", tag);
            assert_eq!(exercise.unwrap().type_tag(), tag);
        }
    }

    #[test]
    fn test_registry_matches_decorated_tags() {
        let registry = ExerciseRegistry::default();
        let exercise = registry
            .create("exerciseBody freeText active")
            .expect("带修饰类的标签也应匹配");
        assert_eq!(exercise.type_tag(), "freeText");
    }

    #[test]
    fn test_registry_rejects_unknown_tag() {
        let registry = ExerciseRegistry::default();
        assert!(registry.create("codeEditor").is_none());
    }

    #[test]
    fn test_work_duration_ordering() {
        // 自由文本最久，填空最快
        assert!(FreeText.avg_work_duration_secs() > Survey.avg_work_duration_secs());
        assert!(Survey.avg_work_duration_secs() > InputField.avg_work_duration_secs());
    }
}
