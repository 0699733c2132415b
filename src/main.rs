use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use classroom_loadrunner::model::load_roster;
use classroom_loadrunner::{FacadeSink, PageProvider, Runner, RunnerConfig, SharedSink};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    classroom_loadrunner::logging::init();

    // 加载配置与名单
    let config = RunnerConfig::from_env()?;
    let roster = load_roster(&config)?;
    info!(
        "🚀 压测目标: {}（{} 个班级，runID: {}）",
        config.target_url,
        roster.len(),
        config.run_id
    );

    // 预分配浏览器页面池
    let provider = PageProvider::from_config(&config).await?;
    let pages = provider.provide(&roster).await?;

    let metrics: SharedSink = Arc::new(FacadeSink::new(config.run_id.clone()));
    let runner = Runner::new(config, roster, pages, metrics);

    // SIGINT / SIGTERM 触发优雅停机
    spawn_signal_handler(runner.clone())?;

    runner.start().await?;
    runner.wait_stopped().await;
    Ok(())
}

fn spawn_signal_handler(runner: Runner) -> Result<()> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        info!("收到停机信号，开始优雅停机");
        runner.stop();
    });
    Ok(())
}
