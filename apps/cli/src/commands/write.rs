//! 条目写入命令

use super::connect::ConnectArgs;
use crate::utils::parse_value;
use anyhow::Result;
use clap::Args;

/// 写入参数
#[derive(Args, Debug)]
pub struct WriteCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 条目名
    pub item: String,

    /// 值（`true`、`42`、`1.5`、`{1,2,3}` 或字符串）
    pub value: String,

    /// 通过 Listen Node 脚本写入，而不是 Ethernet Slave
    #[arg(long)]
    pub via_listen: bool,
}

impl WriteCommand {
    pub fn execute(&self) -> Result<()> {
        let mut robot = self.connect.connect(self.via_listen)?;
        let value = parse_value(&self.value);

        if self.via_listen {
            let id = robot.listen_svr_write(&self.item, value.clone())?;
            println!("✅ {} = {} (script {})", self.item, value, id);
        } else {
            robot.svr_write(&self.item, value.clone())?;
            println!("✅ {} = {}", self.item, value);
        }

        robot.close();
        Ok(())
    }
}
