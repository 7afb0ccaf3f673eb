//! # TM Net Transport Layer
//!
//! 传输抽象层：TM 机械臂的两个通道都是长连接 TCP 字节流，
//! 上层只依赖本 crate 的读写 trait，便于用 mock 替换真实连接进行测试。
//!
//! ## 结构
//!
//! - [`ByteRx`]：接收半边（后台读线程独占）
//! - [`ByteTx`]：发送半边（前台调用者持有）
//! - [`Connection`]：可拆分为收发两半的连接
//! - [`TcpConnection`]：基于 `std::net::TcpStream` 的实现

use std::time::Duration;
use thiserror::Error;
use tm_protocol::TmFrame;

pub mod tcp;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use tcp::{TcpConnection, TcpRx, TcpTx};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum NetError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Read timeout")]
    Timeout,
    #[error("Connection closed by peer")]
    Closed,
}

impl NetError {
    /// 超时可重试，其余错误对该连接是致命的
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::Timeout)
    }
}

/// 接收半边
pub trait ByteRx {
    /// 读取可用字节到 `buf`
    ///
    /// - `Ok(n)`：读到 `n > 0` 字节
    /// - `Err(NetError::Timeout)`：接收超时内没有数据（可重试）
    /// - `Err(NetError::Closed)`：对端关闭连接
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, NetError>;

    /// 设置接收超时（`receive` 最长阻塞时间）
    fn set_receive_timeout(&mut self, _timeout: Duration) -> Result<(), NetError> {
        Ok(())
    }
}

/// 发送半边
pub trait ByteTx {
    /// 写出全部字节
    fn send_all(&mut self, bytes: &[u8]) -> Result<(), NetError>;

    /// 编码并发送一帧
    fn send_frame(&mut self, frame: &TmFrame) -> Result<(), NetError> {
        self.send_all(&frame.to_bytes())
    }

    /// 关闭连接（两个方向），阻塞中的读取会随之返回
    fn shutdown(&mut self) -> Result<(), NetError> {
        Ok(())
    }
}

/// 可拆分为独立收发两半的连接
pub trait Connection {
    type Rx: ByteRx + Send + 'static;
    type Tx: ByteTx + Send + 'static;

    /// 对端地址描述（用于日志）
    fn peer(&self) -> String;

    fn split(self) -> Result<(Self::Rx, Self::Tx), NetError>;
}
