//! 运动命令
//!
//! 通过 Listen Node 下发 PTP/Line/PLine/Circle 及相对运动。

use super::connect::ConnectArgs;
use crate::utils::parse_pose;
use anyhow::{Result, bail};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use tm_sdk::prelude::{DataFormat, MotionOptions, Pose};

/// 运动方式
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionMode {
    Ptp,
    Line,
    Pline,
    Circle,
    MovePtp,
    MoveLine,
    MovePline,
}

/// 运动参数
#[derive(Args, Debug)]
pub struct MoveCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 运动方式
    #[arg(value_enum)]
    pub mode: MotionMode,

    /// 目标位姿（可重复；circle 需要途经点和终点两个）
    #[arg(short, long = "pose", required = true, value_parser = parse_pose)]
    pub poses: Vec<Pose>,

    /// 速度（含义取决于数据格式）
    #[arg(short, long, default_value_t = 10.0)]
    pub speed: f64,

    #[command(flatten)]
    pub options: MotionArgs,

    /// 前置 QueueTag
    #[arg(short, long)]
    pub enqueue: bool,
}

/// 运动选项
#[derive(Args, Debug, Clone, Default)]
pub struct MotionArgs {
    /// 数据格式（如 JPP、CPP、CAR）
    #[arg(long)]
    pub format: Option<DataFormat>,

    /// 融合值
    #[arg(long)]
    pub blending: Option<u32>,

    /// 加速时间（ms）
    #[arg(long)]
    pub time_acc: Option<u32>,

    /// 精确定位
    #[arg(long)]
    pub precise: Option<bool>,

    /// 圆弧角度（circle）
    #[arg(long)]
    pub arc_angle: Option<i32>,
}

impl MotionArgs {
    pub fn to_options(&self) -> MotionOptions {
        MotionOptions {
            data_format: self.format,
            blending: self.blending,
            time_acc: self.time_acc,
            precision_positioning: self.precise,
            arc_angle: self.arc_angle,
        }
    }
}

impl MoveCommand {
    pub fn execute(&self) -> Result<()> {
        if self.mode == MotionMode::Circle && self.poses.len() != 2 {
            bail!("circle needs exactly 2 poses (via point and end point)");
        }

        let mut robot = self.connect.connect(true)?;
        let opts = self.options.to_options();
        let (poses, speed, enqueue) = (&self.poses[..], self.speed, self.enqueue);

        let id = match self.mode {
            MotionMode::Ptp => robot.ptp(poses, speed, &opts, enqueue)?,
            MotionMode::Line => robot.line(poses, speed, &opts, enqueue)?,
            MotionMode::Pline => robot.pline(poses, speed, &opts, enqueue)?,
            MotionMode::Circle => robot.circle(&poses[0], &poses[1], speed, &opts, enqueue)?,
            MotionMode::MovePtp => robot.move_ptp(poses, speed, &opts, enqueue)?,
            MotionMode::MoveLine => robot.move_line(poses, speed, &opts, enqueue)?,
            MotionMode::MovePline => robot.move_pline(poses, speed, &opts, enqueue)?,
        };
        println!("🚀 {:?} sent as script {}", self.mode, id);

        robot.close();
        Ok(())
    }
}

/// 回到 Home 位姿
#[derive(Args, Debug)]
pub struct HomeCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 速度百分比
    #[arg(short, long, default_value_t = 10.0)]
    pub speed: f64,
}

impl HomeCommand {
    pub fn execute(&self) -> Result<()> {
        let mut robot = self.connect.connect(true)?;
        let id = robot.go_home(speed_checked(self.speed)?)?;
        println!("🏠 Home sent as script {}", id);
        robot.close();
        Ok(())
    }
}

/// 沿文件中的位姿序列直线运动
#[derive(Args, Debug)]
pub struct PathCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 位姿文件（每行 6 个数值）
    pub file: PathBuf,

    #[arg(short, long, default_value_t = 10.0)]
    pub speed: f64,

    #[command(flatten)]
    pub options: MotionArgs,
}

impl PathCommand {
    pub fn execute(&self) -> Result<()> {
        let mut robot = self.connect.connect(true)?;
        let id = robot.path_from_file(&self.file, speed_checked(self.speed)?, &self.options.to_options())?;
        println!("🛤️  Path {} sent as script {}", self.file.display(), id);
        robot.close();
        Ok(())
    }
}

fn speed_checked(speed: f64) -> Result<f64> {
    if speed.is_nan() || speed <= 0.0 {
        bail!("Speed must be positive, got {}", speed);
    }
    Ok(speed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        cmd: MoveCommand,
    }

    #[test]
    fn test_parse_move_args() {
        let w = Wrapper::try_parse_from([
            "t",
            "ptp",
            "--pose",
            "0,0,90,0,90,0",
            "--speed",
            "20",
            "--format",
            "jpp",
            "--blending",
            "50",
        ])
        .unwrap();
        assert_eq!(w.cmd.mode, MotionMode::Ptp);
        assert_eq!(w.cmd.poses, vec![[0.0, 0.0, 90.0, 0.0, 90.0, 0.0]]);
        let opts = w.cmd.options.to_options();
        assert_eq!(opts.data_format, Some(DataFormat::Jpp));
        assert_eq!(opts.blending, Some(50));
        assert_eq!(opts.time_acc, None);
    }

    #[test]
    fn test_bad_pose_rejected() {
        assert!(Wrapper::try_parse_from(["t", "line", "--pose", "1,2,3"]).is_err());
    }

    #[test]
    fn test_speed_checked() {
        assert!(speed_checked(10.0).is_ok());
        assert!(speed_checked(0.0).is_err());
        assert!(speed_checked(f64::NAN).is_err());
    }
}
