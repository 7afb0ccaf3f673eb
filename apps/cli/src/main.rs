//! # TM CLI
//!
//! Command-line interface for TM robot arms over Ethernet
//! (Ethernet Slave on 5891, Listen Node on 5890).
//!
//! ```bash
//! # 配置默认机器人
//! tm-cli config set --ip 192.168.1.10 --session cell1
//!
//! # 查看状态（新条目交互式选择类型）
//! tm-cli status --all -I
//!
//! # 运动与脚本
//! tm-cli move ptp --pose 0,0,90,0,90,0 --speed 20 --format jpp
//! tm-cli send 'PTP("JPP",0,0,90,0,90,0,35,200,0,false)' --enqueue
//!
//! # 监控并记录
//! tm-cli watch --items dt,Joint_Angle --log joints.csv --seconds 10
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod classify;
mod commands;
mod utils;

use commands::{
    ConfigCommand, ControlCommand, HomeCommand, MoveCommand, PathCommand, ScriptCommand,
    StatusCommand, WatchCommand, WriteCommand,
};

/// TM CLI - 机械臂命令行工具
#[derive(Parser, Debug)]
#[command(name = "tm-cli")]
#[command(about = "Command-line interface for TM robot arm Ethernet control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 查询机器人状态
    Status {
        #[command(flatten)]
        args: StatusCommand,
    },

    /// 下发原始脚本行
    Send {
        #[command(flatten)]
        args: ScriptCommand,
    },

    /// 运动指令
    Move {
        #[command(flatten)]
        args: MoveCommand,
    },

    /// 回到 Home 位姿
    Home {
        #[command(flatten)]
        args: HomeCommand,
    },

    /// 沿文件中的路径运动
    Path {
        #[command(flatten)]
        args: PathCommand,
    },

    /// 写入 Ethernet Slave 条目
    Write {
        #[command(flatten)]
        args: WriteCommand,
    },

    /// 监控（并记录）条目
    Watch {
        #[command(flatten)]
        args: WatchCommand,
    },

    /// 项目流程控制
    #[command(subcommand)]
    Control(ControlCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Status { args } => args.execute(),
        Commands::Send { args } => args.execute(),
        Commands::Move { args } => args.execute(),
        Commands::Home { args } => args.execute(),
        Commands::Path { args } => args.execute(),
        Commands::Write { args } => args.execute(),
        Commands::Watch { args } => args.execute(),
        Commands::Control(cmd) => cmd.execute(),
    }
}
