//! Client 层 Robot Builder
//!
//! 建立 Ethernet Slave 通道（必需），可选地同时连接 Listen Node。

use crate::error::Result;
use crate::robot::{ListenNodeConfig, Robot};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tm_driver::{ItemClassifier, PipelineConfig, ValueChannelBuilder};
use tm_protocol::{Pose, SVR_PORT};

/// Robot Builder
///
/// # 示例
///
/// ```rust,no_run
/// use tm_client::RobotBuilder;
/// use tm_protocol::ItemType;
///
/// # fn main() -> Result<(), tm_client::ClientError> {
/// // 仅 Ethernet Slave（读取状态、写入条目）
/// let robot = RobotBuilder::new("192.168.1.10").build()?;
///
/// // 同时连接 Listen Node，新条目按大小分类
/// let robot = RobotBuilder::new("192.168.1.10")
///     .session("cell1")
///     .classifier(|_: &str, size: usize| Some(if size == 1 { ItemType::Bool } else { ItemType::Float }))
///     .with_listen_node()
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RobotBuilder {
    ip: String,
    svr_port: u16,
    session: Option<String>,
    table_dir: Option<PathBuf>,
    create_missing_table: bool,
    classifier: Option<Arc<dyn ItemClassifier>>,
    pipeline_config: Option<PipelineConfig>,
    discovery_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    listen: ListenNodeConfig,
    connect_listen_node: bool,
    home: Option<Pose>,
}

impl RobotBuilder {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            svr_port: SVR_PORT,
            session: None,
            table_dir: None,
            create_missing_table: true,
            classifier: None,
            pipeline_config: None,
            discovery_timeout: None,
            connect_timeout: None,
            listen: ListenNodeConfig::default(),
            connect_listen_node: false,
            home: None,
        }
    }

    /// Ethernet Slave 端口（默认 5891）
    pub fn svr_port(mut self, port: u16) -> Self {
        self.svr_port = port;
        self
    }

    /// Listen Node 端口（默认 5890）
    pub fn sct_port(mut self, port: u16) -> Self {
        self.listen.port = port;
        self
    }

    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn table_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.table_dir = Some(dir.into());
        self
    }

    pub fn create_missing_table(mut self, create: bool) -> Self {
        self.create_missing_table = create;
        self
    }

    pub fn classifier(mut self, classifier: impl ItemClassifier + 'static) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = Some(config);
        self
    }

    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = Some(timeout);
        self
    }

    /// 两个通道共用的连接超时
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self.listen.connect_timeout = timeout;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.listen.query_timeout = timeout;
        self
    }

    /// 构建时同时连接 Listen Node
    pub fn with_listen_node(mut self) -> Self {
        self.connect_listen_node = true;
        self
    }

    pub fn home(mut self, pose: Pose) -> Self {
        self.home = Some(pose);
        self
    }

    pub fn build(self) -> Result<Robot> {
        let mut values = ValueChannelBuilder::new(&self.ip)
            .port(self.svr_port)
            .create_missing_table(self.create_missing_table);
        if let Some(session) = self.session {
            values = values.session(session);
        }
        if let Some(dir) = self.table_dir {
            values = values.table_dir(dir);
        }
        if let Some(classifier) = self.classifier {
            values = values.shared_classifier(classifier);
        }
        if let Some(config) = self.pipeline_config {
            values = values.pipeline_config(config);
        }
        if let Some(timeout) = self.discovery_timeout {
            values = values.discovery_timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            values = values.connect_timeout(timeout);
        }

        let mut robot = Robot::from_channels(self.ip, values.build()?, None).with_listen_config(self.listen);
        if let Some(home) = self.home {
            robot.set_home(home);
        }
        if self.connect_listen_node {
            robot.connect_listen_node()?;
        }
        Ok(robot)
    }
}
