//! 命令定义和实现

pub mod config;
pub mod connect;
pub mod control;
pub mod motion;
pub mod script;
pub mod status;
pub mod watch;
pub mod write;

pub use config::ConfigCommand;
pub use control::ControlCommand;
pub use motion::{HomeCommand, MoveCommand, PathCommand};
pub use script::ScriptCommand;
pub use status::StatusCommand;
pub use watch::WatchCommand;
pub use write::WriteCommand;
