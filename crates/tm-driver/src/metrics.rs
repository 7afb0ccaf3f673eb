//! Ethernet Slave 通道指标
//!
//! 原子计数器，读线程更新、任意线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 通道实时指标
///
/// # 使用示例
///
/// ```rust
/// use tm_driver::ValueChannelMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = ValueChannelMetrics::default();
/// metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().rx_frames_total, 1);
/// ```
#[derive(Debug, Default)]
pub struct ValueChannelMetrics {
    /// 读取的原始字节数
    pub rx_bytes: AtomicU64,

    /// 完整帧数（所有帧头）
    pub rx_frames_total: AtomicU64,

    /// 成功应用到状态表的 TMSVR 帧数
    pub rx_frames_applied: AtomicU64,

    /// 校验和不一致的帧数（仍被应用）
    pub checksum_mismatches: AtomicU64,

    /// 过滤掉的本端写入回显帧数
    pub echo_frames: AtomicU64,

    /// 非 TMSVR 帧或无法解析的数据块
    pub ignored_frames: AtomicU64,

    /// 解码失败的条目数
    pub item_errors: AtomicU64,

    /// 数据表中没有的条目出现次数
    pub unknown_items: AtomicU64,

    /// 被重组器丢弃的噪声字节数
    pub noise_bytes: AtomicU64,

    /// 写入日志的行数
    pub rows_logged: AtomicU64,

    /// 日志队列满而丢弃的行数
    pub rows_dropped: AtomicU64,

    /// 发送的写入帧数
    pub tx_frames_total: AtomicU64,
}

impl ValueChannelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            rx_frames_total: self.rx_frames_total.load(Ordering::Relaxed),
            rx_frames_applied: self.rx_frames_applied.load(Ordering::Relaxed),
            checksum_mismatches: self.checksum_mismatches.load(Ordering::Relaxed),
            echo_frames: self.echo_frames.load(Ordering::Relaxed),
            ignored_frames: self.ignored_frames.load(Ordering::Relaxed),
            item_errors: self.item_errors.load(Ordering::Relaxed),
            unknown_items: self.unknown_items.load(Ordering::Relaxed),
            noise_bytes: self.noise_bytes.load(Ordering::Relaxed),
            rows_logged: self.rows_logged.load(Ordering::Relaxed),
            rows_dropped: self.rows_dropped.load(Ordering::Relaxed),
            tx_frames_total: self.tx_frames_total.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.rx_bytes,
            &self.rx_frames_total,
            &self.rx_frames_applied,
            &self.checksum_mismatches,
            &self.echo_frames,
            &self.ignored_frames,
            &self.item_errors,
            &self.unknown_items,
            &self.noise_bytes,
            &self.rows_logged,
            &self.rows_dropped,
            &self.tx_frames_total,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rx_bytes: u64,
    pub rx_frames_total: u64,
    pub rx_frames_applied: u64,
    pub checksum_mismatches: u64,
    pub echo_frames: u64,
    pub ignored_frames: u64,
    pub item_errors: u64,
    pub unknown_items: u64,
    pub noise_bytes: u64,
    pub rows_logged: u64,
    pub rows_dropped: u64,
    pub tx_frames_total: u64,
}

impl MetricsSnapshot {
    /// 校验和错误率（百分比），无帧时为 0
    pub fn checksum_error_rate(&self) -> f64 {
        if self.rx_frames_total == 0 {
            return 0.0;
        }
        (self.checksum_mismatches as f64 / self.rx_frames_total as f64) * 100.0
    }
}
