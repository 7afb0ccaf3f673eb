//! # TM Client
//!
//! TM 机械臂的用户友好接口：
//! - [`Robot`]：运动指令（PTP/Line/PLine/Circle 及相对运动）、队列标签、脚本控制
//! - [`RobotBuilder`]：链式构造，自动建立 Ethernet Slave 与 Listen Node 连接
//! - 路径文件读取（[`path`]）
//!
//! 如果需要直接操作通道或帧，可以使用 `tm-driver` / `tm-protocol`。

mod builder;
mod error;
pub mod path;
mod robot;

pub use builder::RobotBuilder;
pub use error::{ClientError, Result};
pub use robot::{ListenNodeConfig, Robot};
