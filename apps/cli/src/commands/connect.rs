//! 连接参数
//!
//! 命令行参数优先，其次是配置文件。

use super::config::CliConfig;
use crate::classify::PromptClassifier;
use anyhow::{Result, bail};
use clap::Args;
use std::path::PathBuf;
use tm_sdk::prelude::{Robot, RobotBuilder};
use tracing::info;

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// 机器人 IP（覆盖配置）
    #[arg(long)]
    pub ip: Option<String>,

    /// Ethernet Slave 端口
    #[arg(long)]
    pub svr_port: Option<u16>,

    /// Listen Node 端口
    #[arg(long)]
    pub sct_port: Option<u16>,

    /// 数据表会话名（覆盖配置）
    #[arg(long)]
    pub session: Option<String>,

    /// 数据表目录（覆盖配置）
    #[arg(long)]
    pub table_dir: Option<PathBuf>,

    /// 遇到新条目时交互式选择类型
    #[arg(short = 'I', long)]
    pub interactive: bool,
}

impl ConnectArgs {
    /// 合并配置后得到 Builder
    pub fn builder(&self, config: &CliConfig) -> Result<RobotBuilder> {
        let Some(ip) = self.ip.clone().or_else(|| config.robot_ip.clone()) else {
            bail!("No robot IP given, pass --ip or run `tm-cli config set --ip <IP>`");
        };

        let mut builder = RobotBuilder::new(ip);
        if let Some(port) = self.svr_port {
            builder = builder.svr_port(port);
        }
        if let Some(port) = self.sct_port {
            builder = builder.sct_port(port);
        }
        if let Some(session) = self.session.clone().or_else(|| config.session.clone()) {
            builder = builder.session(session);
        }
        if let Some(dir) = self.table_dir.clone().or_else(|| config.table_dir.clone()) {
            builder = builder.table_dir(dir);
        }
        if let Some(home) = config.home {
            builder = builder.home(home);
        }
        if self.interactive {
            builder = builder.classifier(PromptClassifier);
        }
        Ok(builder)
    }

    /// 建立连接（`listen_node` 为 true 时同时连接 Listen Node）
    pub fn connect(&self, listen_node: bool) -> Result<Robot> {
        let config = CliConfig::load()?;
        let mut builder = self.builder(&config)?;
        if listen_node {
            builder = builder.with_listen_node();
        }
        println!("🔌 Connecting...");
        let robot = builder.build()?;
        info!("Connected to {}", robot.ip());
        Ok(robot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_ip_is_error() {
        let args = ConnectArgs::default();
        assert!(args.builder(&CliConfig::default()).is_err());
    }

    #[test]
    fn test_ip_from_config() {
        let args = ConnectArgs::default();
        let config = CliConfig {
            robot_ip: Some("192.168.1.10".into()),
            ..Default::default()
        };
        assert!(args.builder(&config).is_ok());
    }
}
