//! 页面对象层
//!
//! 把对任务系列和各类练习的页面交互封装成对象，
//! 学生旅程只和这些对象打交道，不直接碰选择器。

pub mod exercises;
pub mod task_series;

pub use exercises::{Exercise, ExerciseRegistry};
pub use task_series::TaskSeries;
