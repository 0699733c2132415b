use thiserror::Error;

/// 致命的启动/配置错误
///
/// 这一类错误在启动阶段同步抛出，直接终止整个压测；
/// 与单个虚拟用户运行期间的错误（只终止该用户）严格区分。
#[derive(Debug, Error)]
pub enum LoadError {
    /// 页面池耗尽：账号没有分配到页面
    #[error("页面不足: 账号 {identity} 没有分配到页面")]
    NotEnoughPages { identity: String },

    /// 班级人数超出范围
    #[error("班级人数 {size} 无效: 必须在 2 到 40 之间（含边界）")]
    InvalidClassSize { size: usize },

    /// 创建新班级缺少必要参数
    #[error("创建新班级需要提供 class_name 和 class_size")]
    MissingClassParams,

    /// think 时间因子无效
    #[error("think 时间因子 {factor} 无效: 必须大于 0")]
    InvalidThinkTimeFactor { factor: f64 },

    /// 名单解析失败
    #[error("无法解析班级名单: {reason}")]
    RosterParseFailed { reason: String },

    /// 环境变量配置错误
    #[error("环境变量 {var_name} 配置错误: {reason}")]
    BadEnvVar { var_name: String, reason: String },
}

/// 虚拟用户会话被停止
///
/// `retry_refreshing` 在会话不再活跃时用它包装挂起的错误，
/// 让调用方能区分"业务失败"和"协作式取消"。
#[derive(Debug, Error)]
#[error("虚拟用户会话已停止")]
pub struct SessionStopped;
