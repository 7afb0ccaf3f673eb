//! # TM Protocol
//!
//! TM 机械臂以太网协议定义（无 I/O 依赖）
//!
//! ## 模块
//!
//! - `constants`: 帧分隔符、帧头、端口等协议常量
//! - `frame`: `$HEADER,LEN,DATA,*CS\r\n` 帧编解码
//! - `assembler`: TCP 字节流的帧重组
//! - `item`: 数据表条目类型与值解码
//! - `svr`: Ethernet Slave（TMSVR）数据块的 TLV 子协议
//! - `motion`: 运动指令与脚本函数的文本格式化
//!
//! ## 字节序
//!
//! 帧本身是 ASCII 文本；TMSVR 数据块内部的长度前缀与数值均为
//! 小端字节序（Intel 顺序）。
//!
//! ## 帧结构
//!
//! ```text
//! Protocol Layer (tm-protocol)
//!     ↓ encode_frame() / FrameAssembler
//! TmFrame (此 crate)
//!     ↓ 字节收发在网络层实现
//! Net Layer (tm-net)
//!     ↓ TCP
//! Robot
//! ```

pub mod assembler;
pub mod constants;
pub mod frame;
pub mod item;
pub mod motion;
pub mod svr;

// 重新导出常用类型
pub use assembler::FrameAssembler;
pub use constants::*;
pub use frame::{Decoded, TmFrame, checksum, checksum_hex, decode_frame, encode_frame, encoded_len};
pub use item::{ItemType, ItemValue, decode_item, encode_item};
pub use motion::{
    DataFormat, MotionError, MotionKind, MotionOptions, MotionProfile, Pose, ResolvedOptions, format_circle,
    format_motion,
};
pub use svr::{SvrItem, SvrPayload, encode_svr_payload, format_svr_write, parse_svr_payload};

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid item length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Malformed numeric item {item}: {len} bytes is not a multiple of 4")]
    MalformedNumeric { item: String, len: usize },

    #[error("Item {item} is not valid UTF-8")]
    InvalidUtf8 { item: String },

    #[error("Truncated payload: {0}")]
    Truncated(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}
