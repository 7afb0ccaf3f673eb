//! 协议常量定义
//!
//! 集中定义帧分隔符、帧头名称和端口号，避免在代码中散落"魔法数"。

/// 帧起始符 `$`
pub const P_HEAD: u8 = b'$';

/// 字段分隔符 `,`
pub const P_SEPR: u8 = b',';

/// 校验和前导符 `*`
pub const P_CSUM: u8 = b'*';

/// 帧结束符 `\r\n`
pub const P_END: &[u8; 2] = b"\r\n";

/// 数据块之后的固定尾部长度：`,` `*` `H` `H` `\r` `\n`
pub const TRAILER_LEN: usize = 6;

/// 帧头最大长度（超过即视为噪声）
pub const MAX_HEADER_LEN: usize = 16;

/// 长度字段最大位数
pub const MAX_LENGTH_DIGITS: usize = 10;

/// 默认允许的最大数据块长度（1 MiB）
pub const DEFAULT_MAX_DATA_LEN: usize = 1024 * 1024;

/// Ethernet Slave（数据表同步）通道帧头
pub const HEADER_TMSVR: &str = "TMSVR";

/// Listen Node（脚本下发）通道帧头
pub const HEADER_TMSCT: &str = "TMSCT";

/// Listen Node 状态查询帧头
pub const HEADER_TMSTA: &str = "TMSTA";

/// 通信错误帧头（机器人对非法帧的回应）
pub const HEADER_CPERR: &str = "CPERR";

/// Ethernet Slave 端口
pub const SVR_PORT: u16 = 5891;

/// Listen Node 端口
pub const SCT_PORT: u16 = 5890;

/// Modbus TCP 端口（寄存器通道，本 SDK 不实现）
pub const MODBUS_PORT: u16 = 502;

/// 本端写入 Ethernet Slave 时使用的脚本 ID
///
/// 机器人会把写入回显给所有连接，带此 ID 的帧需要被读线程忽略。
pub const SVR_SCRIPT_ID: &str = "svr";

/// Ethernet Slave 写入模式（字符串 `item=value` 形式）
pub const SVR_WRITE_MODE: &str = "2";

/// TMSTA 子命令：查询 Listen Node 是否就绪
pub const TMSTA_QUERY_READY: &str = "00";

/// 脚本 ID / 队列标签的取值范围 `[0, QUEUE_TAG_MODULUS)`
pub const QUEUE_TAG_MODULUS: u8 = 10;

/// 脚本行分隔符
pub const LINE_TERMINATOR: &str = "\r\n";
