//! Builder 模式实现
//!
//! 提供链式构造两个通道的便捷方式：建立 TCP 连接，再交给
//! [`ValueChannel::open`] / [`CommandChannel::open`]。

use crate::error::DriverError;
use crate::pipeline::PipelineConfig;
use crate::schema::ItemClassifier;
use crate::sct::{CommandChannel, CommandChannelOptions};
use crate::svr::{ValueChannel, ValueChannelOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tm_net::TcpConnection;
use tm_protocol::{SCT_PORT, SVR_PORT};
use tracing::debug;

/// 默认连接超时
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Ethernet Slave 通道 Builder
///
/// # Example
///
/// ```no_run
/// use tm_driver::{StaticClassifier, ValueChannelBuilder};
/// use tm_protocol::ItemType;
///
/// let channel = ValueChannelBuilder::new("192.168.1.10")
///     .session("cell1")
///     .table_dir("ethernet_tables")
///     .classifier(StaticClassifier::new().with("Ctrl_DO0", ItemType::Bool))
///     .build()
///     .unwrap();
/// println!("{:?}", channel.joint_angle());
/// ```
pub struct ValueChannelBuilder {
    ip: String,
    port: u16,
    connect_timeout: Duration,
    options: ValueChannelOptions,
}

impl ValueChannelBuilder {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port: SVR_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            options: ValueChannelOptions::default(),
        }
    }

    /// 端口（默认 5891）
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// 会话名（数据表文件名，默认 `Default`）
    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.options.session = session.into();
        self
    }

    pub fn table_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.table_dir = dir.into();
        self
    }

    /// 数据表文件不存在时是否自动创建（默认是）
    pub fn create_missing_table(mut self, create: bool) -> Self {
        self.options.create_missing_table = create;
        self
    }

    pub fn classifier(mut self, classifier: impl ItemClassifier + 'static) -> Self {
        self.options.classifier = Some(Arc::new(classifier));
        self
    }

    pub fn shared_classifier(mut self, classifier: Arc<dyn ItemClassifier>) -> Self {
        self.options.classifier = Some(classifier);
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.options.pipeline = config;
        self
    }

    /// 等待第一帧数据的上限（默认 5 秒）
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.options.discovery_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn options(&self) -> &ValueChannelOptions {
        &self.options
    }

    pub fn build(self) -> Result<ValueChannel, DriverError> {
        debug!("Connecting to Ethernet Slave at {}:{}", self.ip, self.port);
        let conn = TcpConnection::connect(&self.ip, self.port, self.connect_timeout)?;
        ValueChannel::open(conn, self.options)
    }
}

/// Listen Node 通道 Builder
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use tm_driver::CommandChannelBuilder;
///
/// let mut channel = CommandChannelBuilder::new("192.168.1.10")
///     .query_timeout(Duration::from_secs(2))
///     .build()
///     .unwrap();
/// let id = channel.send(&["Pause()"], None, false).unwrap();
/// ```
pub struct CommandChannelBuilder {
    ip: String,
    port: u16,
    connect_timeout: Duration,
    options: CommandChannelOptions,
}

impl CommandChannelBuilder {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port: SCT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            options: CommandChannelOptions::default(),
        }
    }

    /// 端口（默认 5890）
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `query_ready` 等待应答的上限（默认 5 秒）
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.options.query_timeout = timeout;
        self
    }

    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.options.receive_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<CommandChannel, DriverError> {
        debug!("Connecting to Listen Node at {}:{}", self.ip, self.port);
        let conn = TcpConnection::connect(&self.ip, self.port, self.connect_timeout)?;
        CommandChannel::open(conn, self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_value_builder_chain() {
        let builder = ValueChannelBuilder::new("10.0.0.2")
            .session("cell.json")
            .table_dir("/tmp/tables")
            .create_missing_table(false)
            .discovery_timeout(Duration::from_secs(1));
        assert_eq!(builder.port, SVR_PORT);
        assert_eq!(builder.options().session, "cell.json");
        assert!(!builder.options().create_missing_table);
        assert!(builder.options().classifier.is_none());
    }

    #[test]
    fn test_command_builder_defaults() {
        let builder = CommandChannelBuilder::new("10.0.0.2");
        assert_eq!(builder.port, SCT_PORT);
        assert_eq!(builder.options.query_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_connect_refused() {
        // 绑定后立即释放，端口上没有监听者
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let result = CommandChannelBuilder::new("127.0.0.1")
            .port(port)
            .connect_timeout(Duration::from_millis(200))
            .build();
        assert!(matches!(result, Err(DriverError::Net(_))));
    }

    #[test]
    fn test_command_builder_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut channel = CommandChannelBuilder::new("127.0.0.1").port(port).build().unwrap();
        let (mut peer, _) = listener.accept().unwrap();

        channel.send(&["Pause()"], None, false).unwrap();
        let mut buf = [0u8; 64];
        let n = std::io::Read::read(&mut peer, &mut buf).unwrap();
        assert!(buf[..n].starts_with(b"$TMSCT,"));
    }
}
