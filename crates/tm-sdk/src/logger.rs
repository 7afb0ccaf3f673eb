//! 日志初始化
//!
//! 库本身只通过 `tracing` 宏输出，不安装全局 subscriber；
//! 应用程序调用 [`init_logger`] 启用输出，级别由 `RUST_LOG` 控制（默认 `info`）。

use tracing_subscriber::EnvFilter;

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 安装全局 fmt subscriber，已安装时返回错误
pub fn try_init_logger() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt().with_env_filter(default_filter()).try_init()
}

/// 安装全局 fmt subscriber，重复调用无副作用
pub fn init_logger() {
    let _ = try_init_logger();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_logger();
        init_logger();
        assert!(try_init_logger().is_err());
    }
}
