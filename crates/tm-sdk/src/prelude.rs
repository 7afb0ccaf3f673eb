//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use tm_sdk::prelude::*;
//! ```

// 客户端层（推荐使用）
pub use tm_client::{ClientError, Robot, RobotBuilder};

// 运动指令
pub use tm_protocol::motion::{DataFormat, MotionKind, MotionOptions, Pose};

// 条目类型与值
pub use tm_protocol::{ItemType, ItemValue};

// 驱动层（高级用户使用）
pub use tm_driver::{
    CommandChannelBuilder, ItemClassifier, LogMode, ReadyStatus, StaticClassifier, ValueChannel,
    ValueChannelBuilder,
};

// 错误类型
pub use tm_driver::DriverError;
pub use tm_protocol::ProtocolError;
