//! think 时间模拟
//!
//! 模拟人类反应节奏，同时错开并发用户的请求，避免同步突发。
//! 每次暂停的时长在 [0.5, 1.5) × 因子 × 基准秒数 内均匀抽取。

use rand::Rng;
use std::time::Duration;

use crate::error::LoadError;

/// 默认基准：10 秒
pub const DEFAULT_THINK_BASE_SECS: f64 = 10.0;

/// think 节奏器
#[derive(Clone, Debug)]
pub struct Pacing {
    think_time_factor: f64,
}

impl Pacing {
    pub fn new(think_time_factor: f64) -> Result<Self, LoadError> {
        if think_time_factor <= 0.0 || !think_time_factor.is_finite() {
            return Err(LoadError::InvalidThinkTimeFactor {
                factor: think_time_factor,
            });
        }
        Ok(Self { think_time_factor })
    }

    pub fn factor(&self) -> f64 {
        self.think_time_factor
    }

    /// 抽取一次暂停时长
    pub fn draw(&self, base_secs: f64) -> Duration {
        let jitter = rand::rng().random_range(0.5..1.5);
        Duration::from_secs_f64(jitter * self.think_time_factor * base_secs)
    }

    /// 默认基准的暂停（因子为 1 时在 5s 到 15s 之间）
    pub async fn think(&self) {
        self.think_for(DEFAULT_THINK_BASE_SECS).await;
    }

    /// 指定基准的暂停
    ///
    /// 只挂起当前虚拟用户的任务，不阻塞其他用户。
    pub async fn think_for(&self, base_secs: f64) {
        tokio::time::sleep(self.draw(base_secs)).await;
    }
}

/// Runner 为每个虚拟用户抽取 think 因子：[0.5, 1.5) 均匀分布
pub fn draw_think_time_factor() -> f64 {
    rand::rng().random_range(0.5..1.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_think_duration_uniform_bounds() {
        let pacing = Pacing::new(1.0).unwrap();
        let base = 10.0;
        let mut sum = 0.0;
        for _ in 0..10_000 {
            let secs = pacing.draw(base).as_secs_f64();
            assert!(secs >= 0.5 * base, "时长 {} 低于下界", secs);
            assert!(secs < 1.5 * base, "时长 {} 超过上界", secs);
            sum += secs;
        }
        // 均值应接近基准（均匀分布的期望），给统计容差
        let mean = sum / 10_000.0;
        assert!((mean - base).abs() < 0.2 * base, "均值 {} 偏离过大", mean);
    }

    #[test]
    fn test_factor_scales_duration() {
        let pacing = Pacing::new(0.1).unwrap();
        for _ in 0..1_000 {
            let secs = pacing.draw(10.0).as_secs_f64();
            assert!((0.5..1.5).contains(&secs));
        }
    }

    #[test]
    fn test_invalid_factor_rejected() {
        assert!(Pacing::new(0.0).is_err());
        assert!(Pacing::new(-1.0).is_err());
        assert!(Pacing::new(f64::NAN).is_err());
        assert!(Pacing::new(1.0).is_ok());
    }

    #[test]
    fn test_draw_think_time_factor_bounds() {
        for _ in 0..1_000 {
            let factor = draw_think_time_factor();
            assert!((0.5..1.5).contains(&factor));
        }
    }
}
