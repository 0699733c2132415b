//! 账号与班级数据模型
//!
//! 名单在启动时一次性加载，加载后不可变。

use serde::Deserialize;

/// 账号的统一能力：提供稳定的身份键
///
/// 教师用邮箱，学生用用户名。页面池和 Runner 的生命周期管理
/// 都以这个键来索引。
pub trait Account {
    fn identity(&self) -> &str;
}

/// 教师账号
#[derive(Clone, Debug, Deserialize)]
pub struct Teacher {
    pub email: String,
    pub password: String,
}

impl Account for Teacher {
    fn identity(&self) -> &str {
        &self.email
    }
}

/// 学生账号
#[derive(Clone, Debug, Deserialize)]
pub struct Pupil {
    pub username: String,
    pub password: String,
    /// 入职流程中"创办公司"使用的名称
    pub company: String,
}

impl Account for Pupil {
    fn identity(&self) -> &str {
        &self.username
    }
}

/// 班级描述
///
/// `prepared = true` 表示账号已在服务端存在，只需登录；
/// `prepared = false` 表示教师需要注册并创建班级，
/// 学生用教师广播的班级代码自助注册。
#[derive(Clone, Debug, Deserialize)]
pub struct Classroom {
    pub name: String,
    pub prepared: bool,
    pub teacher: Teacher,
    pub pupils: Vec<Pupil>,
}

impl Classroom {
    /// 班级内所有账号的身份键，教师在前
    pub fn identities(&self) -> Vec<&str> {
        let mut ids = Vec::with_capacity(1 + self.pupils.len());
        ids.push(self.teacher.identity());
        ids.extend(self.pupils.iter().map(|p| p.identity()));
        ids
    }
}
