//! Pipeline IO 循环模块
//!
//! Ethernet Slave 通道的后台读线程：读取字节 → 帧重组 → 子协议解析 →
//! 更新状态表 → 触发钩子。帧严格按线路顺序处理。

use crate::error::DriverError;
use crate::hooks::HookManager;
use crate::metrics::ValueChannelMetrics;
use crate::state::StateTable;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tm_net::{ByteRx, NetError};
use tm_protocol::{FrameAssembler, HEADER_CPERR, HEADER_TMSVR, SvrPayload, TmFrame, parse_svr_payload};
use tracing::{debug, error, trace, warn};

/// Pipeline 配置
///
/// 读线程的时序参数。
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 单次读取的超时（毫秒）
    ///
    /// 读线程每隔这么久至少检查一次停止标志，决定了 `close()` 的响应延迟。
    pub receive_timeout_ms: u64,
    /// 单次读取的缓冲区大小（字节）
    pub read_chunk_size: usize,
    /// 关闭时等待读线程退出的上限（毫秒）
    pub join_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 20,
            read_chunk_size: 2048,
            join_timeout_ms: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// 读线程与前台共享的上下文
pub struct ValueContext {
    pub table: StateTable,
    pub hooks: RwLock<HookManager>,
    /// 读线程因致命错误退出时记录的原因
    pub reader_error: Mutex<Option<String>>,
}

impl ValueContext {
    pub fn new(table: StateTable) -> Self {
        Self {
            table,
            hooks: RwLock::new(HookManager::new()),
            reader_error: Mutex::new(None),
        }
    }
}

/// 单帧处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// 已应用到状态表
    Applied,
    /// 本端写入的回显
    Echo,
    /// 非 TMSVR 帧或无法解析
    Ignored,
}

/// 解析 TMSVR 帧的数据块
///
/// 非 TMSVR 帧返回 `None`（CPERR 以警告记录）。
pub fn svr_payload(frame: &TmFrame) -> Option<SvrPayload> {
    if frame.header != HEADER_TMSVR {
        if frame.header == HEADER_CPERR {
            warn!("Robot reported communication error: {:?}", frame.data_str());
        } else {
            debug!("Ignoring {} frame on value channel", frame.header);
        }
        return None;
    }
    match parse_svr_payload(&frame.data) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!("Malformed TMSVR payload ({} bytes): {}", frame.length(), e);
            None
        },
    }
}

/// 应用一个已解析的数据块并触发钩子
pub fn apply_payload(payload: &SvrPayload, ctx: &ValueContext, metrics: &ValueChannelMetrics) {
    let report = ctx.table.apply(payload);
    metrics.rx_frames_applied.fetch_add(1, Ordering::Relaxed);

    for name in &report.unknown {
        warn!("Skipping item {} which is not in the schema", name);
    }
    metrics
        .unknown_items
        .fetch_add(report.unknown.len() as u64, Ordering::Relaxed);

    for (name, e) in &report.errors {
        error!("Failed to decode item {}: {}", name, e);
    }
    metrics
        .item_errors
        .fetch_add(report.errors.len() as u64, Ordering::Relaxed);

    trace!("Applied {} items", report.applied);
    ctx.hooks.read().trigger_all(&ctx.table, payload);
}

/// 处理一个完整帧
///
/// 校验和不一致时仍然应用（记录警告并计数）。
pub fn process_frame(frame: &TmFrame, ctx: &ValueContext, metrics: &ValueChannelMetrics) -> FrameOutcome {
    metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
    if !frame.checksum_valid() {
        warn!(
            "Checksum mismatch on {} frame: declared {:02X}, computed {:02X}",
            frame.header,
            frame.checksum,
            frame.computed_checksum()
        );
        metrics.checksum_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    let Some(payload) = svr_payload(frame) else {
        metrics.ignored_frames.fetch_add(1, Ordering::Relaxed);
        return FrameOutcome::Ignored;
    };
    if payload.is_self_echo() {
        trace!("Skipping echo of own write");
        metrics.echo_frames.fetch_add(1, Ordering::Relaxed);
        return FrameOutcome::Echo;
    }

    apply_payload(&payload, ctx, metrics);
    FrameOutcome::Applied
}

fn drain(assembler: &mut FrameAssembler, ctx: &ValueContext, metrics: &ValueChannelMetrics) {
    let noise_before = assembler.noise_bytes();
    while let Some(frame) = assembler.next_frame() {
        process_frame(&frame, ctx, metrics);
    }
    metrics
        .noise_bytes
        .fetch_add(assembler.noise_bytes() - noise_before, Ordering::Relaxed);
}

/// 后台读线程主循环
///
/// - 读取超时是正常情况，继续循环并检查停止标志
/// - 对端关闭或 IO 错误是致命的：记录到 `ctx.reader_error`，清除运行标志后退出
///
/// `assembler` 中可能已有打开通道时读到的后续帧，会先于新数据处理。
pub fn rx_loop(
    mut rx: impl ByteRx,
    mut assembler: FrameAssembler,
    ctx: Arc<ValueContext>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<ValueChannelMetrics>,
) {
    if let Err(e) = rx.set_receive_timeout(config.receive_timeout()) {
        warn!("RX thread: failed to set receive timeout: {}", e);
    }
    let mut buf = vec![0u8; config.read_chunk_size.max(1)];

    drain(&mut assembler, &ctx, &metrics);

    loop {
        // Acquire: 看到 false 时，停止前的写入都已可见
        if !is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            break;
        }

        match rx.receive(&mut buf) {
            Ok(n) => {
                metrics.rx_bytes.fetch_add(n as u64, Ordering::Relaxed);
                assembler.feed(&buf[..n]);
                drain(&mut assembler, &ctx, &metrics);
            },
            Err(NetError::Timeout) => continue,
            Err(e) => {
                // close() 主动关闭 socket 时也会走到这里，此时不算错误
                if is_running.load(Ordering::Acquire) {
                    error!("RX thread: receive error: {}", e);
                    *ctx.reader_error.lock() = Some(e.to_string());
                }
                is_running.store(false, Ordering::Release);
                break;
            },
        }
    }

    if !assembler.is_empty() {
        debug!("RX thread: {} unprocessed bytes at exit", assembler.buffered_len());
    }
}

/// 带超时的线程 join
///
/// 由一个看守线程执行阻塞的 `join()`，调用方只等待 `timeout`。
/// 超时后看守线程继续等待，目标线程不会被强行终止。
pub(crate) trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> Result<(), DriverError>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> Result<(), DriverError> {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let _ = done_tx.send(self.join().is_ok());
        });

        match done_rx.recv_timeout(timeout) {
            Ok(true) => Ok(()),
            Ok(false) => Err(DriverError::IoThread("thread panicked".into())),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Err(DriverError::Timeout),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                Err(DriverError::IoThread("join watchdog exited unexpectedly".into()))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::SyncHook;
    use bytes::Bytes;
    use std::sync::atomic::AtomicU64;
    use std::thread;
    use tm_net::Connection;
    use tm_net::mock::MockConnection;
    use tm_protocol::{SvrItem, encode_svr_payload};

    fn svr_frame(script_id: &str, items: &[SvrItem]) -> Vec<u8> {
        TmFrame::new(HEADER_TMSVR, encode_svr_payload(script_id, "0", items))
            .to_bytes()
            .to_vec()
    }

    fn robot_link(on: bool) -> SvrItem {
        SvrItem::new("Robot_Link", Bytes::from(vec![on as u8]))
    }

    struct CountHook(AtomicU64);

    impl SyncHook for CountHook {
        fn on_frame_applied(&self, _table: &StateTable, _payload: &SvrPayload) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn wait_until(cond: impl Fn() -> bool) {
        let start = std::time::Instant::now();
        while !cond() && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.receive_timeout_ms, 20);
        assert_eq!(config.read_chunk_size, 2048);
        assert_eq!(config.join_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_process_frame_outcomes() {
        let ctx = ValueContext::new(StateTable::in_memory());
        let metrics = ValueChannelMetrics::new();

        let frame = TmFrame::new(HEADER_TMSVR, encode_svr_payload("1", "0", &[robot_link(true)]));
        assert_eq!(process_frame(&frame, &ctx, &metrics), FrameOutcome::Applied);
        assert_eq!(ctx.table.robot_link(), Some(true));

        let echo = TmFrame::new(HEADER_TMSVR, &b"svr,2,Robot_Link=false\r\n"[..]);
        assert_eq!(process_frame(&echo, &ctx, &metrics), FrameOutcome::Echo);
        assert_eq!(ctx.table.robot_link(), Some(true));

        let other = TmFrame::new("TMSCT", &b"1,OK"[..]);
        assert_eq!(process_frame(&other, &ctx, &metrics), FrameOutcome::Ignored);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rx_frames_total, 3);
        assert_eq!(snapshot.rx_frames_applied, 1);
        assert_eq!(snapshot.echo_frames, 1);
        assert_eq!(snapshot.ignored_frames, 1);
    }

    #[test]
    fn test_checksum_mismatch_still_applied() {
        let ctx = ValueContext::new(StateTable::in_memory());
        let metrics = ValueChannelMetrics::new();

        let mut wire = svr_frame("1", &[robot_link(true)]);
        let len = wire.len();
        wire[len - 4] = if wire[len - 4] == b'0' { b'1' } else { b'0' };

        let mut assembler = FrameAssembler::new();
        assembler.feed(&wire);
        drain(&mut assembler, &ctx, &metrics);

        assert_eq!(ctx.table.robot_link(), Some(true));
        assert_eq!(metrics.snapshot().checksum_mismatches, 1);
    }

    #[test]
    fn test_rx_loop_applies_split_frames_and_fires_hooks() {
        let conn = MockConnection::new();
        let mut wire = svr_frame("1", &[robot_link(true)]);
        wire.extend(svr_frame("2", &[robot_link(false)]));
        let (a, b) = wire.split_at(7);
        conn.push_rx(a.to_vec());
        conn.push_rx(b.to_vec());

        let ctx = Arc::new(ValueContext::new(StateTable::in_memory()));
        let hook = Arc::new(CountHook(AtomicU64::new(0)));
        ctx.hooks.write().add(hook.clone());

        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(ValueChannelMetrics::new());
        let (rx, _tx) = conn.clone().split().unwrap();
        let handle = {
            let (ctx, is_running, metrics) = (ctx.clone(), is_running.clone(), metrics.clone());
            thread::spawn(move || {
                rx_loop(rx, FrameAssembler::new(), ctx, PipelineConfig::default(), is_running, metrics)
            })
        };

        wait_until(|| hook.0.load(Ordering::Relaxed) == 2);
        is_running.store(false, Ordering::Release);
        handle.join().unwrap();

        assert_eq!(hook.0.load(Ordering::Relaxed), 2);
        assert_eq!(ctx.table.robot_link(), Some(false));
        assert_eq!(metrics.snapshot().rx_bytes, wire.len() as u64);
        assert!(ctx.reader_error.lock().is_none());
    }

    #[test]
    fn test_rx_loop_records_peer_close() {
        let conn = MockConnection::new();
        conn.close_when_drained();

        let ctx = Arc::new(ValueContext::new(StateTable::in_memory()));
        let is_running = Arc::new(AtomicBool::new(true));
        let (rx, _tx) = conn.split().unwrap();
        rx_loop(
            rx,
            FrameAssembler::new(),
            ctx.clone(),
            PipelineConfig::default(),
            is_running.clone(),
            Arc::new(ValueChannelMetrics::new()),
        );

        assert!(!is_running.load(Ordering::Acquire));
        assert!(ctx.reader_error.lock().is_some());
    }

    #[test]
    fn test_rx_loop_drains_handed_over_frames_first() {
        let mut assembler = FrameAssembler::new();
        assembler.feed(&svr_frame("5", &[robot_link(true)]));

        let conn = MockConnection::new();
        conn.close_when_drained();
        let ctx = Arc::new(ValueContext::new(StateTable::in_memory()));
        let (rx, _tx) = conn.split().unwrap();
        rx_loop(
            rx,
            assembler,
            ctx.clone(),
            PipelineConfig::default(),
            Arc::new(AtomicBool::new(true)),
            Arc::new(ValueChannelMetrics::new()),
        );
        assert_eq!(ctx.table.robot_link(), Some(true));
    }

    #[test]
    fn test_join_timeout() {
        let quick = thread::spawn(|| 1);
        assert!(quick.join_timeout(Duration::from_secs(1)).is_ok());

        let slow = thread::spawn(|| thread::sleep(Duration::from_millis(300)));
        assert!(matches!(
            slow.join_timeout(Duration::from_millis(10)),
            Err(DriverError::Timeout)
        ));

        let panicking = thread::spawn(|| panic!("boom"));
        assert!(matches!(
            panicking.join_timeout(Duration::from_secs(1)),
            Err(DriverError::IoThread(_))
        ));
    }
}
