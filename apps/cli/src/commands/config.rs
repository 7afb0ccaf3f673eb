//! 配置管理命令
//!
//! 默认机器人地址、会话名与数据表目录保存在 `<config_dir>/tm-cli/config.toml`。

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tm_sdk::prelude::Pose;

/// 配置文件路径
pub fn config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine config directory"))?;
    path.push("tm-cli");
    path.push("config.toml");
    Ok(path)
}

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 默认机器人 IP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub robot_ip: Option<String>,

    /// 数据表会话名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,

    /// 数据表目录
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_dir: Option<PathBuf>,

    /// Home 位姿
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<Pose>,
}

impl CliConfig {
    /// 加载默认位置的配置，文件不存在时返回默认值
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, format!("# TM CLI Configuration\n\n{}", content)).context("Failed to write config file")?;
        Ok(())
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 机器人 IP
        #[arg(long)]
        ip: Option<String>,

        /// 数据表会话名
        #[arg(long)]
        session: Option<String>,

        /// 数据表目录
        #[arg(long)]
        table_dir: Option<PathBuf>,

        /// Home 位姿（6 个逗号分隔的数值）
        #[arg(long, value_parser = crate::utils::parse_pose)]
        home: Option<Pose>,
    },

    /// 显示当前配置
    Show,
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        let path = config_file()?;
        match self {
            ConfigCommand::Set {
                ip,
                session,
                table_dir,
                home,
            } => {
                let mut config = CliConfig::load_from(&path)?;
                config.apply(ip, session, table_dir, home);
                config.save_to(&path)?;
                println!("✅ Saved {}", path.display());
                Ok(())
            },
            ConfigCommand::Show => {
                let config = CliConfig::load_from(&path)?;
                println!("Config file: {}", path.display());
                println!("  robot_ip:  {}", config.robot_ip.as_deref().unwrap_or("(unset)"));
                println!("  session:   {}", config.session.as_deref().unwrap_or("(unset)"));
                match &config.table_dir {
                    Some(dir) => println!("  table_dir: {}", dir.display()),
                    None => println!("  table_dir: (unset)"),
                }
                match &config.home {
                    Some(home) => println!("  home:      {:?}", home),
                    None => println!("  home:      (unset)"),
                }
                Ok(())
            },
        }
    }
}

impl CliConfig {
    fn apply(
        &mut self,
        ip: Option<String>,
        session: Option<String>,
        table_dir: Option<PathBuf>,
        home: Option<Pose>,
    ) {
        if ip.is_some() {
            self.robot_ip = ip;
        }
        if session.is_some() {
            self.session = session;
        }
        if table_dir.is_some() {
            self.table_dir = table_dir;
        }
        if home.is_some() {
            self.home = home;
        }
    }
}
