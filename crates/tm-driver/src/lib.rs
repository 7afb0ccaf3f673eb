//! # TM Driver
//!
//! 通道管理与状态同步层：
//! - Ethernet Slave 通道（[`ValueChannel`]）：首帧发现数据表、后台读线程持续更新状态表
//! - Listen Node 通道（[`CommandChannel`]）：脚本批次下发、循环脚本 ID、就绪查询
//! - 数据表持久化（JSON）与条目分类端口（[`ItemClassifier`]）
//! - 钩子系统与 CSV 条目日志
//!
//! 大多数用户应该使用 `tm-client` 提供的 `Robot` 高层接口。

mod builder;
mod error;
pub mod hooks;
pub mod item_log;
pub mod metrics;
pub mod pipeline;
pub mod schema;
mod sct;
pub mod state;
mod svr;

pub use builder::{CommandChannelBuilder, DEFAULT_CONNECT_TIMEOUT, ValueChannelBuilder};
pub use error::DriverError;
pub use hooks::{HookId, HookManager, SyncHook};
pub use item_log::{ItemLogger, LogMode};
pub use metrics::{MetricsSnapshot, ValueChannelMetrics};
pub use pipeline::PipelineConfig;
pub use schema::{
    ItemClassifier, Schema, SchemaEntry, SchemaStore, StaticClassifier, builtin_entries,
};
pub use sct::{
    CommandChannel, CommandChannelOptions, ReadyStatus, SequenceCounter, build_script,
    parse_ready_status, queue_tag_for,
};
pub use state::{ApplyReport, StateTable};
pub use svr::{DEFAULT_SESSION, DEFAULT_TABLE_DIR, ValueChannel, ValueChannelOptions};
