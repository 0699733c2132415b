//! # Classroom Loadrunner
//!
//! 一个面向课堂教学 Web 应用的浏览器级压力测试工具：
//! 驱动成群的虚拟教师和虚拟学生在真实浏览器页面里
//! 登录、开班、做题、批改，给目标部署制造贴近真实的负载。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（浏览器页面），只暴露能力
//! - `PageDriver` - 页面驱动接口，`ChromeDriver` 是唯一的 CDP 实现
//! - `browser/` - 浏览器启动/连接与页面池预分配
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 虚拟用户共用的注入式协作对象
//! - `Session` / `Pacing` / `Instrument` / `PageRecorder` / `ClassLog`
//!
//! ### ③ 旅程层（Journeys）
//! - `vus/` - 虚拟用户外壳与两条具体旅程（教师 / 学生）
//! - `page_objects/` - 任务系列与练习的页面对象
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/` - Runner：派发班级、收口生命周期、停机扇入
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod services;
pub mod vus;

// 重新导出常用类型
pub use browser::{PageMap, PageProvider};
pub use config::{RunnerConfig, VuConfig};
pub use error::LoadError;
pub use infrastructure::{ChromeDriver, PageDriver, SharedPage};
pub use metrics::{FacadeSink, MetricsSink, NullSink, SharedSink};
pub use model::{Account, Classroom, Pupil, Teacher};
pub use orchestrator::Runner;
pub use services::{ClassLog, Pacing, Session};
pub use vus::{Journey, VirtualPupil, VirtualTeacher, VirtualUser, VuEvent, VuEventKind};
