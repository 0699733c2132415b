//! 基础设施层
//!
//! 持有稀缺资源（浏览器页面），只向上暴露能力：
//!
//! - `page_driver` - 页面驱动能力接口（导航、等待、点击、填写……），
//!   超时错误与其它错误严格区分，重试策略依赖这一区分
//! - `chrome` - chromiumoxide 实现，唯一的 Page 持有者

pub mod chrome;
pub mod page_driver;

pub use chrome::ChromeDriver;
pub use page_driver::{is_timeout_error, DriverError, PageDriver, SharedPage};
