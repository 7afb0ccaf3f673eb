//! 状态查询命令

use super::connect::ConnectArgs;
use crate::utils::format_pose;
use anyhow::Result;
use clap::Args;

/// 状态查询参数
#[derive(Args, Debug)]
pub struct StatusCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 打印数据表中的全部条目
    #[arg(short, long)]
    pub all: bool,

    /// 同时查询 Listen Node 是否就绪
    #[arg(long)]
    pub listen: bool,
}

impl StatusCommand {
    pub fn execute(&self) -> Result<()> {
        let mut robot = self.connect.connect(self.listen)?;

        let values = robot.values();
        println!("Robot: {} (table {})", robot.ip(), values.schema_path().display());
        match robot.joint_angles() {
            Some(joints) => println!("  Joint_Angle     {}", format_pose(&joints)),
            None => println!("  Joint_Angle     (no data)"),
        }
        match robot.tool_pose() {
            Some(pose) => println!("  Coord_Base_Tool {}", format_pose(&pose)),
            None => println!("  Coord_Base_Tool (no data)"),
        }

        if self.all {
            println!();
            for (name, entry) in values.snapshot() {
                println!("  {:<24} [{}] {}", name, entry.ty.tag(), entry.value);
            }
        }

        let metrics = values.metrics();
        println!();
        println!(
            "Frames: {} received, {} applied, {} echo, {} checksum errors ({:.2}%)",
            metrics.rx_frames_total,
            metrics.rx_frames_applied,
            metrics.echo_frames,
            metrics.checksum_mismatches,
            metrics.checksum_error_rate()
        );

        if self.listen {
            let status = robot.listen_ready()?;
            println!("Listen Node: ready={} tag={}", status.ready, status.tag);
        }

        robot.close();
        Ok(())
    }
}
