//! 业务能力层
//!
//! 虚拟用户共用的注入式协作对象，每个模块只暴露一种能力：
//!
//! - `session` - 协作式取消标志
//! - `pacing` - 人类节奏模拟（think 时间抖动）
//! - `instrument` - 操作计时与吞吐指标
//! - `diagnostics` - 失败现场截图 / HTML 快照
//! - `class_log` - 班级代码的一次性广播

pub mod class_log;
pub mod diagnostics;
pub mod instrument;
pub mod pacing;
pub mod session;

pub use class_log::{ClassCreated, ClassLog};
pub use diagnostics::PageRecorder;
pub use instrument::Instrument;
pub use pacing::{draw_think_time_factor, Pacing};
pub use session::Session;
