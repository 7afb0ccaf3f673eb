//! 原始脚本下发命令

use super::connect::ConnectArgs;
use anyhow::Result;
use clap::Args;

/// 脚本参数
#[derive(Args, Debug)]
pub struct ScriptCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 脚本行，例如 `PTP("JPP",0,0,90,0,90,0,35,200,0,false)`
    #[arg(required = true)]
    pub lines: Vec<String>,

    /// 指定脚本 ID（0-9）
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub id: Option<u8>,

    /// 前置 QueueTag 以便等待完成
    #[arg(short, long)]
    pub enqueue: bool,
}

impl ScriptCommand {
    pub fn execute(&self) -> Result<()> {
        let mut robot = self.connect.connect(true)?;
        let id = robot.send_script(&self.lines, self.id, self.enqueue)?;
        println!("📤 Sent {} line(s) as script {}", self.lines.len(), id);
        robot.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        script: ScriptCommand,
    }

    #[test]
    fn test_parse_args() {
        let w = Wrapper::try_parse_from(["t", "--ip", "10.0.0.1", "--id", "3", "-e", "Pause()"]).unwrap();
        assert_eq!(w.script.id, Some(3));
        assert!(w.script.enqueue);
        assert_eq!(w.script.lines, vec!["Pause()".to_string()]);
    }

    #[test]
    fn test_id_out_of_range() {
        assert!(Wrapper::try_parse_from(["t", "--id", "10", "Pause()"]).is_err());
    }
}
