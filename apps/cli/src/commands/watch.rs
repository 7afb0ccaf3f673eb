//! 监控命令
//!
//! 周期性打印条目值，可选地将每帧写入 CSV，Ctrl-C 或到时后退出。

use super::connect::ConnectArgs;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tm_sdk::prelude::{LogMode, Robot};

/// 监控参数
#[derive(Args, Debug)]
pub struct WatchCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 条目名（逗号分隔）
    #[arg(long, value_delimiter = ',', default_values = ["Joint_Angle", "Coord_Base_Tool"])]
    pub items: Vec<String>,

    /// 将每帧写入 CSV 文件
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// 覆盖已有的 CSV 文件（默认追加）
    #[arg(long, requires = "log")]
    pub overwrite: bool,

    /// 运行秒数（默认直到 Ctrl-C）
    #[arg(long)]
    pub seconds: Option<u64>,

    /// 打印频率（Hz）
    #[arg(short, long, default_value_t = 2)]
    pub frequency: u32,
}

impl WatchCommand {
    pub fn execute(&self) -> Result<()> {
        let robot = self.connect.connect(false)?;

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        ctrlc::set_handler(move || {
            flag.store(false, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl-C handler")?;

        if let Some(path) = &self.log {
            let mode = if self.overwrite { LogMode::Overwrite } else { LogMode::Append };
            robot.values().start_logging(path, self.items.clone(), mode)?;
            println!("📝 Logging {} to {}", self.items.join(","), path.display());
        }

        let deadline = self.seconds.map(|s| Instant::now() + Duration::from_secs(s));
        let period = Duration::from_secs_f64(1.0 / f64::from(self.frequency.max(1)));
        while running.load(Ordering::SeqCst) && deadline.is_none_or(|d| Instant::now() < d) {
            if !robot.values().is_healthy() {
                let reason = robot.values().reader_error().unwrap_or_default();
                anyhow::bail!("Connection lost: {}", reason);
            }
            println!("{}", self.render(&robot));
            thread::sleep(period);
        }

        if robot.values().stop_logging() {
            let metrics = robot.values().metrics();
            println!(
                "📝 {} rows logged, {} dropped",
                metrics.rows_logged, metrics.rows_dropped
            );
        }
        robot.close();
        Ok(())
    }

    fn render(&self, robot: &Robot) -> String {
        self.items
            .iter()
            .map(|name| match robot.get(name) {
                Some(value) => format!("{}={}", name, value),
                None => format!("{}=?", name),
            })
            .collect::<Vec<_>>()
            .join("  ")
    }
}
