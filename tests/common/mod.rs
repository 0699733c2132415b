//! 集成测试共用的内存替身
//!
//! - `FakeDriver` - 脚本化的页面驱动：按"存在的选择器集合"应答，
//!   记录所有操作，计数 reload / close
//! - `RecordingSink` - 按顺序记录所有指标事件

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use classroom_loadrunner::infrastructure::page_driver::DriverError;
use classroom_loadrunner::{MetricsSink, PageDriver};

// ========== FakeDriver ==========

/// 脚本化的内存页面驱动
///
/// 点击/填写总是成功（假页面无限顺从）；等待类操作只对
/// "存在集合"里的选择器成功，其余立刻按超时失败。
pub struct FakeDriver {
    present: Mutex<HashSet<String>>,
    texts: Mutex<HashMap<String, String>>,
    attributes: Mutex<HashMap<String, String>>,
    eval_result: Mutex<JsonValue>,
    ops: Mutex<Vec<String>>,
    reloads: AtomicUsize,
    close_calls: AtomicUsize,
    fail_close: bool,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self {
            present: Mutex::new(HashSet::new()),
            texts: Mutex::new(HashMap::new()),
            attributes: Mutex::new(HashMap::new()),
            eval_result: Mutex::new(json!(false)),
            ops: Mutex::new(Vec::new()),
            reloads: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            fail_close: false,
        }
    }
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记这些选择器在页面上存在
    pub fn with_present(self, selectors: &[&str]) -> Self {
        {
            let mut present = self.present.lock().unwrap();
            for s in selectors {
                present.insert((*s).to_string());
            }
        }
        self
    }

    /// 给选择器一个固定的文本内容
    pub fn with_text(self, selector: &str, text: &str) -> Self {
        self.texts
            .lock()
            .unwrap()
            .insert(selector.to_string(), text.to_string());
        self
    }

    /// 给选择器一个固定的 class 属性
    pub fn with_attribute(self, selector: &str, value: &str) -> Self {
        self.attributes
            .lock()
            .unwrap()
            .insert(selector.to_string(), value.to_string());
        self
    }

    /// 让 close() 总是失败
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn log(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }

    fn has(&self, selector: &str) -> bool {
        self.present.lock().unwrap().contains(selector)
    }

    fn timeout(selector: &str) -> DriverError {
        DriverError::Timeout {
            selector: selector.to_string(),
            timeout: Duration::from_millis(1),
        }
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.log(format!("goto {}", url));
        Ok(())
    }

    async fn reload(&self) -> Result<(), DriverError> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        self.log("reload".to_string());
        Ok(())
    }

    async fn wait_for(&self, selector: &str) -> Result<(), DriverError> {
        self.log(format!("wait_for {}", selector));
        if self.has(selector) {
            Ok(())
        } else {
            Err(Self::timeout(selector))
        }
    }

    async fn wait_for_any(&self, selectors: &[&str]) -> Result<usize, DriverError> {
        self.log(format!("wait_for_any {}", selectors.join(" | ")));
        selectors
            .iter()
            .position(|s| self.has(s))
            .ok_or_else(|| Self::timeout(&selectors.join(" | ")))
    }

    async fn exists(&self, selector: &str) -> Result<bool, DriverError> {
        Ok(self.has(selector))
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.log(format!("click {}", selector));
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), DriverError> {
        self.log(format!("fill {} {}", selector, text));
        Ok(())
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        _per_key_delay: Duration,
    ) -> Result<(), DriverError> {
        self.log(format!("type {} {}", selector, text));
        Ok(())
    }

    async fn attribute(
        &self,
        selector: &str,
        _name: &str,
    ) -> Result<Option<String>, DriverError> {
        Ok(self.attributes.lock().unwrap().get(selector).cloned())
    }

    async fn inner_text(&self, selector: &str) -> Result<String, DriverError> {
        Ok(self
            .texts
            .lock()
            .unwrap()
            .get(selector)
            .cloned()
            .unwrap_or_else(|| "Beispieltext".to_string()))
    }

    async fn drag(&self, source: &str, target: &str) -> Result<(), DriverError> {
        self.log(format!("drag {} -> {}", source, target));
        Ok(())
    }

    async fn eval(&self, _js: &str) -> Result<JsonValue, DriverError> {
        Ok(self.eval_result.lock().unwrap().clone())
    }

    async fn screenshot(&self, _path: &Path) -> Result<(), DriverError> {
        self.log("screenshot".to_string());
        Ok(())
    }

    async fn html_dump(&self, _path: &Path) -> Result<(), DriverError> {
        self.log("html_dump".to_string());
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.log("close".to_string());
        if self.fail_close {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }
}

// ========== RecordingSink ==========

/// 一条记录下来的指标事件
#[derive(Clone, Debug)]
pub enum MetricEvent {
    Count {
        name: String,
        delta: u64,
        tags: Vec<(String, String)>,
    },
    Gauge {
        name: String,
        delta: f64,
    },
    Timing {
        name: String,
    },
}

/// 按顺序记录所有指标事件的内存出口
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().unwrap().clone()
    }

    /// 某个计数器的累计值
    pub fn count_total(&self, name: &str) -> u64 {
        self.events()
            .iter()
            .filter_map(|e| match e {
                MetricEvent::Count {
                    name: n, delta, ..
                } if n == name => Some(*delta),
                _ => None,
            })
            .sum()
    }

    /// 某个计数器在给定标签下的累计值
    pub fn count_with_tag(&self, name: &str, key: &str, value: &str) -> u64 {
        self.events()
            .iter()
            .filter_map(|e| match e {
                MetricEvent::Count {
                    name: n,
                    delta,
                    tags,
                } if n == name
                    && tags.iter().any(|(k, v)| k == key && v == value) =>
                {
                    Some(*delta)
                }
                _ => None,
            })
            .sum()
    }

    /// 某个计数器按发生顺序排列的标签值
    pub fn tag_sequence(&self, name: &str, key: &str) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                MetricEvent::Count { name: n, tags, .. } if n == name => tags
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.clone()),
                _ => None,
            })
            .collect()
    }

    /// 某个 gauge 的净值
    pub fn gauge_net(&self, name: &str) -> f64 {
        self.events()
            .iter()
            .filter_map(|e| match e {
                MetricEvent::Gauge { name: n, delta } if n == name => Some(*delta),
                _ => None,
            })
            .sum()
    }

    /// 某个 gauge 收到给定方向变化的次数
    pub fn gauge_changes(&self, name: &str, positive: bool) -> usize {
        self.events()
            .iter()
            .filter(|e| match e {
                MetricEvent::Gauge { name: n, delta } if n == name => {
                    (*delta > 0.0) == positive
                }
                _ => false,
            })
            .count()
    }
}

impl MetricsSink for RecordingSink {
    fn count(&self, name: &str, delta: u64, tags: &[(String, String)]) {
        self.events.lock().unwrap().push(MetricEvent::Count {
            name: name.to_string(),
            delta,
            tags: tags.to_vec(),
        });
    }

    fn gauge_delta(&self, name: &str, delta: f64, _tags: &[(String, String)]) {
        self.events.lock().unwrap().push(MetricEvent::Gauge {
            name: name.to_string(),
            delta,
        });
    }

    fn timing(&self, name: &str, _duration: Duration, _tags: &[(String, String)]) {
        self.events.lock().unwrap().push(MetricEvent::Timing {
            name: name.to_string(),
        });
    }
}

// ========== 名单构造 ==========

use classroom_loadrunner::{Classroom, Pupil, Teacher};

/// 一个班级的测试名单
pub fn classroom(name: &str, prepared: bool, pupil_count: usize) -> Classroom {
    Classroom {
        name: name.to_string(),
        prepared,
        teacher: Teacher {
            email: format!("lehrer-{}@example.com", name),
            password: "geheim".to_string(),
        },
        pupils: (0..pupil_count)
            .map(|i| Pupil {
                username: format!("schueler-{}-{}", name, i),
                password: "geheim".to_string(),
                company: format!("Firma {}", i),
            })
            .collect(),
    }
}

// ========== 页面池构造 ==========

use std::sync::Arc;

use classroom_loadrunner::model::Account;
use classroom_loadrunner::PageMap;

/// 一个能走通教师/学生全旅程的脚本化页面
///
/// 存在集合让登录落在成功分支、教师工作台保持空闲、
/// 学生的任务系列立即可提交。
pub fn scripted_driver() -> FakeDriver {
    FakeDriver::new()
        .with_present(&[
            "text='Home'",
            "text='Aufträge'",
            "text='Gerade nichts zu tun'",
            "#taskSeries",
            ".taskSeries__submitButton",
        ])
        .with_text(".classCode h1", "ABC123")
        .with_text("h1", "Auftrag 1")
}

/// 为名单中的每个账号建一个脚本化页面
pub fn scripted_pages(roster: &[Classroom]) -> (PageMap, Vec<(String, Arc<FakeDriver>)>) {
    let mut pages = PageMap::new();
    let mut drivers = Vec::new();
    for classroom in roster {
        for identity in classroom.identities() {
            let driver = Arc::new(scripted_driver());
            pages.insert(identity.to_string(), driver.clone());
            drivers.push((identity.to_string(), driver));
        }
    }
    (pages, drivers)
}
