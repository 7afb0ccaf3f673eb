//! 机械臂高层接口
//!
//! [`Robot`] 组合两个通道：Ethernet Slave 通道在构造时建立并持续同步状态，
//! Listen Node 通道按需通过 [`Robot::connect_listen_node`] 建立，用于下发运动脚本。

use crate::error::{ClientError, Result};
use crate::path::load_poses;
use std::path::Path;
use std::time::Duration;
use tm_driver::{
    CommandChannel, CommandChannelBuilder, DEFAULT_CONNECT_TIMEOUT, ReadyStatus, ValueChannel,
};
use tm_protocol::motion::{self, MotionKind, MotionOptions, Pose, format_circle, format_motion};
use tm_protocol::{ItemValue, SCT_PORT};
use tracing::{debug, info};

/// Listen Node 连接参数
#[derive(Debug, Clone)]
pub struct ListenNodeConfig {
    pub port: u16,
    pub query_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ListenNodeConfig {
    fn default() -> Self {
        Self {
            port: SCT_PORT,
            query_timeout: Duration::from_secs(5),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// TM 机械臂
///
/// # Example
///
/// ```no_run
/// use tm_client::RobotBuilder;
/// use tm_protocol::motion::MotionOptions;
///
/// let mut robot = RobotBuilder::new("192.168.1.10").session("cell1").build()?;
/// robot.connect_listen_node()?;
/// robot.ptp(&[[0.0, 0.0, 90.0, 0.0, 90.0, 0.0]], 20.0, &MotionOptions::new(), false)?;
/// robot.wait_queue_tag(None)?;
/// println!("joints: {:?}", robot.joint_angles());
/// # Ok::<(), tm_client::ClientError>(())
/// ```
pub struct Robot {
    ip: String,
    values: ValueChannel,
    listen: Option<CommandChannel>,
    listen_config: ListenNodeConfig,
    home: Option<Pose>,
}

impl Robot {
    /// 由已打开的通道组装（测试或自定义传输时使用）
    pub fn from_channels(
        ip: impl Into<String>,
        values: ValueChannel,
        listen: Option<CommandChannel>,
    ) -> Self {
        Self {
            ip: ip.into(),
            values,
            listen,
            listen_config: ListenNodeConfig::default(),
            home: None,
        }
    }

    pub(crate) fn with_listen_config(mut self, config: ListenNodeConfig) -> Self {
        self.listen_config = config;
        self
    }

    /// 设置 Home 位姿（[`Robot::go_home`] 使用）
    pub fn set_home(&mut self, pose: Pose) {
        self.home = Some(pose);
    }

    pub fn home(&self) -> Option<Pose> {
        self.home
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// 建立 Listen Node 连接（已连接时先关闭旧连接）
    pub fn connect_listen_node(&mut self) -> Result<()> {
        if let Some(old) = self.listen.take() {
            old.close();
        }
        let channel = CommandChannelBuilder::new(&self.ip)
            .port(self.listen_config.port)
            .query_timeout(self.listen_config.query_timeout)
            .connect_timeout(self.listen_config.connect_timeout)
            .build()?;
        info!("Connected to Listen Node at {}:{}", self.ip, self.listen_config.port);
        self.listen = Some(channel);
        Ok(())
    }

    /// 使用已打开的 Listen Node 通道
    pub fn attach_listen_node(&mut self, channel: CommandChannel) {
        if let Some(old) = self.listen.replace(channel) {
            old.close();
        }
    }

    pub fn is_listen_node_connected(&self) -> bool {
        self.listen.is_some()
    }

    fn listen(&mut self) -> Result<&mut CommandChannel> {
        self.listen.as_mut().ok_or(ClientError::NotConnected)
    }

    /// 下发任意脚本行，返回脚本 ID
    pub fn send_script<S: AsRef<str>>(
        &mut self,
        lines: &[S],
        explicit_id: Option<u8>,
        enqueue: bool,
    ) -> Result<u8> {
        Ok(self.listen()?.send(lines, explicit_id, enqueue)?)
    }

    fn send_motion(
        &mut self,
        kind: MotionKind,
        poses: &[Pose],
        speed: f64,
        options: &MotionOptions,
        enqueue: bool,
    ) -> Result<u8> {
        let lines = format_motion(kind, poses, speed, options)?;
        debug!("{} x{} at speed {}", kind.profile().command, poses.len(), speed);
        self.send_script(&lines, None, enqueue)
    }

    /// 点到点运动
    pub fn ptp(&mut self, poses: &[Pose], speed: f64, options: &MotionOptions, enqueue: bool) -> Result<u8> {
        self.send_motion(MotionKind::Ptp, poses, speed, options, enqueue)
    }

    /// 直线运动
    pub fn line(&mut self, poses: &[Pose], speed: f64, options: &MotionOptions, enqueue: bool) -> Result<u8> {
        self.send_motion(MotionKind::Line, poses, speed, options, enqueue)
    }

    /// 经过多个点的平滑路径
    pub fn pline(&mut self, poses: &[Pose], speed: f64, options: &MotionOptions, enqueue: bool) -> Result<u8> {
        self.send_motion(MotionKind::PLine, poses, speed, options, enqueue)
    }

    /// 圆弧运动
    pub fn circle(
        &mut self,
        mid: &Pose,
        end: &Pose,
        speed: f64,
        options: &MotionOptions,
        enqueue: bool,
    ) -> Result<u8> {
        let line = format_circle(mid, end, speed, options)?;
        self.send_script(&[line], None, enqueue)
    }

    /// 相对点到点运动
    pub fn move_ptp(&mut self, poses: &[Pose], speed: f64, options: &MotionOptions, enqueue: bool) -> Result<u8> {
        self.send_motion(MotionKind::MovePtp, poses, speed, options, enqueue)
    }

    /// 相对直线运动
    pub fn move_line(&mut self, poses: &[Pose], speed: f64, options: &MotionOptions, enqueue: bool) -> Result<u8> {
        self.send_motion(MotionKind::MoveLine, poses, speed, options, enqueue)
    }

    /// 相对平滑路径
    pub fn move_pline(&mut self, poses: &[Pose], speed: f64, options: &MotionOptions, enqueue: bool) -> Result<u8> {
        self.send_motion(MotionKind::MovePLine, poses, speed, options, enqueue)
    }

    /// 以默认参数点到点回到 Home 位姿
    pub fn go_home(&mut self, speed: f64) -> Result<u8> {
        let home = self.home.ok_or(ClientError::NoHomePose)?;
        self.ptp(&[home], speed, &MotionOptions::new(), false)
    }

    /// 从文件读取位姿序列并以直线运动执行
    pub fn path_from_file(&mut self, path: impl AsRef<Path>, speed: f64, options: &MotionOptions) -> Result<u8> {
        let poses = load_poses(path)?;
        self.line(&poses, speed, options, false)
    }

    /// 设置队列标签并等待其完成
    pub fn queue_tag(&mut self, tag: u8) -> Result<u8> {
        self.send_script(&[motion::queue_tag(tag, 1)], None, false)
    }

    /// 等待队列标签（`None` 等待全部）
    pub fn wait_queue_tag(&mut self, tag: Option<u8>) -> Result<u8> {
        self.send_script(&[motion::wait_queue_tag(tag)], None, false)
    }

    /// 停止运动并清空缓冲区
    pub fn stop(&mut self, mode: Option<u8>) -> Result<u8> {
        self.send_script(&[motion::stop_and_clear_buffer(mode)], None, false)
    }

    /// 退出 Listen Node
    pub fn exit(&mut self, mode: Option<u8>) -> Result<u8> {
        self.send_script(&[motion::script_exit(mode)], None, false)
    }

    pub fn pause(&mut self) -> Result<u8> {
        self.send_script(&[motion::pause()], None, false)
    }

    pub fn resume(&mut self) -> Result<u8> {
        self.send_script(&[motion::resume()], None, false)
    }

    /// 在脚本中等待 `millis` 毫秒
    pub fn wait(&mut self, millis: u32) -> Result<u8> {
        self.send_script(&[motion::wait_for(millis)], None, false)
    }

    /// 查询 Listen Node 状态
    pub fn listen_ready(&mut self) -> Result<ReadyStatus> {
        Ok(self.listen()?.query_ready()?)
    }

    /// 通过 Ethernet Slave 通道写入条目
    pub fn svr_write(&self, item: &str, value: impl Into<ItemValue>) -> Result<()> {
        Ok(self.values.send(item, value)?)
    }

    /// 通过 Listen Node 脚本写入条目
    pub fn listen_svr_write(&mut self, item: &str, value: impl Into<ItemValue>) -> Result<u8> {
        let line = motion::svr_write(item, &value.into());
        self.send_script(&[line], None, false)
    }

    /// 关节角（度）
    pub fn joint_angles(&self) -> Option<Pose> {
        self.values.joint_angle()
    }

    /// 基座标系下的工具位姿
    pub fn tool_pose(&self) -> Option<Pose> {
        self.values.coord_base_tool()
    }

    pub fn get(&self, item: &str) -> Option<ItemValue> {
        self.values.get(item)
    }

    /// Ethernet Slave 通道（日志、钩子、指标）
    pub fn values(&self) -> &ValueChannel {
        &self.values
    }

    /// 关闭全部连接
    pub fn close(self) {
        let Robot { values, listen, .. } = self;
        if let Some(listen) = listen {
            listen.close();
        }
        values.close();
        info!("Robot connections closed");
    }
}
