//! TM SDK - 达明（Techman）机械臂 Rust SDK
//!
//! 通过以太网与 TM 机械臂通信：Ethernet Slave（TMSVR，端口 5891）同步数据表，
//! Listen Node（TMSCT/TMSTA，端口 5890）下发运动脚本。
//!
//! # 架构设计
//!
//! - **协议层** (`protocol`): 帧编解码、流重组、TMSVR 数据块、运动指令格式化
//! - **传输层** (`net`): TCP 连接的收发抽象
//! - **驱动层** (`driver`): 通道管理、后台读线程、数据表持久化
//! - **客户端层** (`client`): `Robot` 高层接口
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use tm_sdk::prelude::*;
//!
//! # fn main() -> Result<(), ClientError> {
//! tm_sdk::init_logger();
//! let mut robot = RobotBuilder::new("192.168.1.10").with_listen_node().build()?;
//! robot.ptp(&[[0.0, 0.0, 90.0, 0.0, 90.0, 0.0]], 20.0, &MotionOptions::new(), false)?;
//! println!("{:?}", robot.joint_angles());
//! robot.close();
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub use tm_client as client;
pub use tm_driver as driver;
pub use tm_net as net;
pub use tm_protocol as protocol;

pub use tm_client::{ClientError, Robot, RobotBuilder};
pub use tm_driver::{CommandChannel, DriverError, ValueChannel};
pub use tm_net::NetError;
pub use tm_protocol::ProtocolError;

mod logger;
pub use logger::{init_logger, try_init_logger};
