//! 脚本控制命令

use super::connect::ConnectArgs;
use anyhow::Result;
use clap::Subcommand;

/// 项目流程控制
#[derive(Subcommand, Debug)]
pub enum ControlCommand {
    /// 暂停项目
    Pause {
        #[command(flatten)]
        connect: ConnectArgs,
    },

    /// 恢复项目
    Resume {
        #[command(flatten)]
        connect: ConnectArgs,
    },

    /// 停止运动并清空缓冲区
    Stop {
        #[command(flatten)]
        connect: ConnectArgs,

        /// 停止模式
        #[arg(long)]
        mode: Option<u8>,
    },

    /// 退出 Listen 节点
    Exit {
        #[command(flatten)]
        connect: ConnectArgs,

        #[arg(long)]
        mode: Option<u8>,
    },

    /// 设置队列标签并等待完成
    Tag {
        #[command(flatten)]
        connect: ConnectArgs,

        tag: u8,
    },

    /// 等待队列标签（不指定时等待全部）
    WaitTag {
        #[command(flatten)]
        connect: ConnectArgs,

        tag: Option<u8>,
    },

    /// 在项目中插入等待
    Sleep {
        #[command(flatten)]
        connect: ConnectArgs,

        /// 毫秒
        millis: u32,
    },

    /// 查询 Listen Node 是否就绪
    Ready {
        #[command(flatten)]
        connect: ConnectArgs,
    },
}

impl ControlCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ControlCommand::Pause { connect } => {
                let mut robot = connect.connect(true)?;
                let id = robot.pause()?;
                println!("⏸️  Paused (script {})", id);
                robot.close();
            },
            ControlCommand::Resume { connect } => {
                let mut robot = connect.connect(true)?;
                let id = robot.resume()?;
                println!("▶️  Resumed (script {})", id);
                robot.close();
            },
            ControlCommand::Stop { connect, mode } => {
                let mut robot = connect.connect(true)?;
                let id = robot.stop(mode)?;
                println!("🛑 Stopped (script {})", id);
                robot.close();
            },
            ControlCommand::Exit { connect, mode } => {
                let mut robot = connect.connect(true)?;
                let id = robot.exit(mode)?;
                println!("Listen node exited (script {})", id);
                robot.close();
            },
            ControlCommand::Tag { connect, tag } => {
                let mut robot = connect.connect(true)?;
                let id = robot.queue_tag(tag)?;
                println!("🏷️  QueueTag({}) sent as script {}", tag, id);
                robot.close();
            },
            ControlCommand::WaitTag { connect, tag } => {
                let mut robot = connect.connect(true)?;
                let id = robot.wait_queue_tag(tag)?;
                println!("⏳ WaitQueueTag sent as script {}", id);
                robot.close();
            },
            ControlCommand::Sleep { connect, millis } => {
                let mut robot = connect.connect(true)?;
                let id = robot.wait(millis)?;
                println!("⏳ WaitFor({}) sent as script {}", millis, id);
                robot.close();
            },
            ControlCommand::Ready { connect } => {
                let mut robot = connect.connect(true)?;
                let status = robot.listen_ready()?;
                println!("ready={} tag={}", status.ready, status.tag);
                robot.close();
            },
        }
        Ok(())
    }
}
