//! 虚拟用户层
//!
//! - `vu` - 虚拟用户的通用外壳：生命周期事件、节奏、计时、刷新重试
//! - `teacher` / `pupil` - 两条具体的应用旅程（状态机）
//! - `page_objects` - 页面对象层：任务系列与练习的交互封装

pub mod page_objects;
pub mod pupil;
pub mod teacher;
pub mod vu;

pub use pupil::VirtualPupil;
pub use teacher::VirtualTeacher;
pub use vu::{Journey, VirtualUser, VuEvent, VuEventKind};
