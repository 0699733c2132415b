//! 日志初始化
//!
//! 基于 tracing + tracing-subscriber，默认 info 级别，
//! 可通过 RUST_LOG 环境变量覆盖。

use tracing_subscriber::EnvFilter;

/// 初始化全局日志订阅者
///
/// 重复调用是安全的（第二次初始化会被忽略）。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
