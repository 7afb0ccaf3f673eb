//! 客户端错误类型

use std::path::PathBuf;
use thiserror::Error;
use tm_driver::DriverError;
use tm_protocol::MotionError;

/// 客户端错误类型
#[derive(Error, Debug)]
pub enum ClientError {
    /// 驱动层错误（连接、数据表、超时）
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 运动指令参数错误
    #[error("Motion command error: {0}")]
    Motion(#[from] MotionError),

    /// 需要 Listen Node 的操作在连接之前调用
    #[error("Listen Node is not connected, call connect_listen_node() first")]
    NotConnected,

    /// 未配置 Home 位姿
    #[error("No home pose configured")]
    NoHomePose,

    /// 路径文件读取失败
    #[error("Failed to read path file {}: {source}", path.display())]
    PathFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 路径文件内容非法
    #[error("Path file line {line}: {reason}")]
    PathFormat { line: usize, reason: String },
}

/// 客户端 Result 别名
pub type Result<T> = std::result::Result<T, ClientError>;
