//! 驱动层错误类型定义

use std::path::PathBuf;
use thiserror::Error;
use tm_net::NetError;
use tm_protocol::ProtocolError;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误（连接断开、IO 失败）
    #[error("Transport error: {0}")]
    Net(#[from] NetError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 数据表文件不存在且未允许自动创建
    #[error("Schema file not found: {}", path.display())]
    SchemaNotFound { path: PathBuf },

    /// 数据表文件读写失败
    #[error("Schema file {}: {source}", path.display())]
    SchemaIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 数据表文件内容非法
    #[error("Invalid schema file: {0}")]
    SchemaFormat(String),

    /// 新发现的条目无法确定类型
    #[error("Unknown type for item {item} ({size} bytes) and no classification available")]
    UnknownItemType { item: String, size: usize },

    /// 日志文件错误
    #[error("Item log error: {0}")]
    ItemLog(#[from] std::io::Error),

    /// 通道已关闭（读线程退出或已调用 close）
    #[error("Channel closed")]
    ChannelClosed,

    /// 读线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,

    /// 无效输入（如空指令批次、越界的脚本 ID）
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for DriverError {
    fn from(e: serde_json::Error) -> Self {
        DriverError::SchemaFormat(e.to_string())
    }
}
