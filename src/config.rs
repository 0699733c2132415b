use crate::error::LoadError;

/// 压测程序配置
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// 本次压测的标识（用于日志和指标标签）
    pub run_id: String,
    /// 目标部署的基础 URL
    pub target_url: String,
    /// 班级名单：内联 JSON（ACCOUNTS）或文件路径（ACCOUNTS_FILE）
    pub accounts_json: Option<String>,
    pub accounts_file: Option<String>,
    /// 失败截图/HTML 快照目录，为空则不采集
    pub screenshot_dir: String,
    /// 浏览器调试端口：设置后连接现有浏览器，否则启动无头浏览器
    pub browser_debug_port: Option<u16>,
    /// 班级之间的启动间隔（秒），避免同时登录风暴
    pub classroom_start_delay_secs: u64,
    /// 同一班级内学生之间的启动间隔（秒）
    pub pupil_start_delay_secs: u64,
    /// 等待页面元素出现的超时（秒）
    pub selector_timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            run_id: "local".to_string(),
            target_url: "http://localhost:8080".to_string(),
            accounts_json: None,
            accounts_file: None,
            screenshot_dir: String::new(),
            browser_debug_port: None,
            classroom_start_delay_secs: 15,
            pupil_start_delay_secs: 3,
            selector_timeout_secs: 30,
        }
    }
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self, LoadError> {
        let default = Self::default();
        Ok(Self {
            run_id: std::env::var("RUN_ID").unwrap_or(default.run_id),
            target_url: std::env::var("URL").unwrap_or(default.target_url),
            accounts_json: std::env::var("ACCOUNTS").ok(),
            accounts_file: std::env::var("ACCOUNTS_FILE").ok(),
            screenshot_dir: std::env::var("SCREENSHOT_DIR").unwrap_or(default.screenshot_dir),
            browser_debug_port: parse_env("BROWSER_DEBUG_PORT")?,
            classroom_start_delay_secs: parse_env("CLASSROOM_START_DELAY_SECS")?
                .unwrap_or(default.classroom_start_delay_secs),
            pupil_start_delay_secs: parse_env("PUPIL_START_DELAY_SECS")?
                .unwrap_or(default.pupil_start_delay_secs),
            selector_timeout_secs: parse_env("SELECTOR_TIMEOUT_SECS")?
                .unwrap_or(default.selector_timeout_secs),
        })
    }
}

/// 解析可选的数值环境变量，格式错误视为致命配置错误
fn parse_env<T: std::str::FromStr>(var_name: &str) -> Result<Option<T>, LoadError> {
    match std::env::var(var_name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| LoadError::BadEnvVar {
                var_name: var_name.to_string(),
                reason: format!("无法解析值 '{}'", raw),
            }),
        Err(_) => Ok(None),
    }
}

/// 每个虚拟用户的配置，由 Runner 从班级描述构造，构造后不可变
#[derive(Clone, Default)]
pub struct VuConfig {
    /// 入口页面 URL（新班级的学生指向 join 页面）
    pub page_url: String,
    /// think 时间因子
    pub think_time_factor: f64,
    /// 新班级名称（仅创建班级的教师需要）
    pub class_name: Option<String>,
    /// 新班级人数（仅创建班级的教师需要）
    pub class_size: Option<usize>,
    /// 学生自助注册用的班级代码
    pub join_code: Option<String>,
    /// 教师向学生广播班级代码的通道
    pub class_log: Option<std::sync::Arc<crate::services::ClassLog>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.run_id, "local");
        assert!(config.screenshot_dir.is_empty());
        assert!(config.browser_debug_port.is_none());
    }
}
