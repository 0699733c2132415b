//! 班级名单加载
//!
//! 名单是一个 JSON 数组，来自环境变量内联内容或文件。

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::RunnerConfig;
use crate::error::LoadError;
use crate::model::Classroom;

/// 解析名单 JSON
pub fn parse_roster(raw: &str) -> Result<Vec<Classroom>, LoadError> {
    serde_json::from_str(raw).map_err(|e| LoadError::RosterParseFailed {
        reason: e.to_string(),
    })
}

/// 按配置加载名单：优先内联 JSON，其次文件
pub fn load_roster(config: &RunnerConfig) -> Result<Vec<Classroom>> {
    let raw = if let Some(inline) = &config.accounts_json {
        inline.clone()
    } else if let Some(path) = &config.accounts_file {
        std::fs::read_to_string(path).with_context(|| format!("读取名单文件失败: {}", path))?
    } else {
        bail!("请通过 ACCOUNTS 或 ACCOUNTS_FILE 提供班级名单");
    };

    let roster = parse_roster(&raw)?;
    info!(
        "✓ 名单加载完成: {} 个班级, {} 个账号",
        roster.len(),
        roster.iter().map(|c| 1 + c.pupils.len()).sum::<usize>()
    );
    Ok(roster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Account;

    const SAMPLE: &str = r#"[
        {
            "name": "Klasse 6b",
            "prepared": false,
            "teacher": { "email": "lehrer@example.com", "password": "pw" },
            "pupils": [
                { "username": "schueler1", "password": "pw", "company": "Limo AG" },
                { "username": "schueler2", "password": "pw", "company": "Brause GmbH" }
            ]
        }
    ]"#;

    #[test]
    fn test_parse_roster() {
        let roster = parse_roster(SAMPLE).expect("名单应该能解析");
        assert_eq!(roster.len(), 1);
        let classroom = &roster[0];
        assert!(!classroom.prepared);
        assert_eq!(classroom.teacher.identity(), "lehrer@example.com");
        assert_eq!(classroom.pupils.len(), 2);
        assert_eq!(
            classroom.identities(),
            vec!["lehrer@example.com", "schueler1", "schueler2"]
        );
    }

    #[test]
    fn test_parse_roster_rejects_garbage() {
        assert!(parse_roster("not json").is_err());
    }

    #[test]
    fn test_load_roster_from_file() {
        let dir = tempfile::tempdir().expect("临时目录");
        let path = dir.path().join("accounts.json");
        std::fs::write(&path, SAMPLE).expect("写入名单文件");

        let config = RunnerConfig {
            accounts_file: Some(path.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let roster = load_roster(&config).expect("应该能从文件加载");
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_load_roster_requires_a_source() {
        let config = RunnerConfig::default();
        assert!(load_roster(&config).is_err(), "既无内联也无文件必须报错");
    }
}
