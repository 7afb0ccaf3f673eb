//! Ethernet Slave 通道（端口 5891）
//!
//! 打开时先读到第一帧 TMSVR 数据，据此补全数据表，然后交给后台读线程持续同步。
//! 前台通过 [`ValueChannel`] 读取最新值、写入条目或挂接 CSV 日志。

use crate::error::DriverError;
use crate::hooks::{HookId, SyncHook};
use crate::item_log::{ItemLogger, LogMode};
use crate::metrics::{MetricsSnapshot, ValueChannelMetrics};
use crate::pipeline::{JoinTimeout, PipelineConfig, ValueContext, apply_payload, rx_loop, svr_payload};
use crate::schema::{ItemClassifier, Schema, SchemaStore};
use crate::state::StateTable;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tm_net::{ByteRx, ByteTx, Connection, NetError};
use tm_protocol::{FrameAssembler, HEADER_TMSVR, ItemValue, SvrPayload, TmFrame, format_svr_write};
use tracing::{debug, error, info, trace, warn};

/// 默认会话名（数据表文件名）
pub const DEFAULT_SESSION: &str = "Default";

/// 默认数据表目录
pub const DEFAULT_TABLE_DIR: &str = "ethernet_tables";

/// 打开通道的参数
#[derive(Clone)]
pub struct ValueChannelOptions {
    /// 会话名，对应 `<table_dir>/<session>.json`
    pub session: String,
    pub table_dir: PathBuf,
    /// 数据表文件不存在时是否以默认值创建
    pub create_missing_table: bool,
    /// 新条目的类型分类器，`None` 时遇到新条目直接失败
    pub classifier: Option<Arc<dyn ItemClassifier>>,
    pub pipeline: PipelineConfig,
    /// 等待第一帧数据的上限
    pub discovery_timeout: Duration,
}

impl Default for ValueChannelOptions {
    fn default() -> Self {
        Self {
            session: DEFAULT_SESSION.to_owned(),
            table_dir: PathBuf::from(DEFAULT_TABLE_DIR),
            create_missing_table: true,
            classifier: None,
            pipeline: PipelineConfig::default(),
            discovery_timeout: Duration::from_secs(5),
        }
    }
}

impl std::fmt::Debug for ValueChannelOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueChannelOptions")
            .field("session", &self.session)
            .field("table_dir", &self.table_dir)
            .field("create_missing_table", &self.create_missing_table)
            .field("classifier", &self.classifier.is_some())
            .field("pipeline", &self.pipeline)
            .field("discovery_timeout", &self.discovery_timeout)
            .finish()
    }
}

/// 读取直到得到第一帧非回显的 TMSVR 数据
///
/// 同一次读取中跟在首帧后面的字节留在 `assembler` 中，交给读线程继续处理。
fn discover(
    rx: &mut impl ByteRx,
    assembler: &mut FrameAssembler,
    config: &PipelineConfig,
    timeout: Duration,
    metrics: &ValueChannelMetrics,
) -> Result<SvrPayload, DriverError> {
    rx.set_receive_timeout(config.receive_timeout())?;
    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; config.read_chunk_size.max(1)];

    loop {
        while let Some(frame) = assembler.next_frame() {
            metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
            match svr_payload(&frame) {
                Some(payload) if !payload.is_self_echo() => return Ok(payload),
                Some(_) => {
                    metrics.echo_frames.fetch_add(1, Ordering::Relaxed);
                },
                None => {
                    metrics.ignored_frames.fetch_add(1, Ordering::Relaxed);
                },
            }
        }

        if Instant::now() >= deadline {
            warn!("No TMSVR frame within {:?}", timeout);
            return Err(DriverError::Timeout);
        }
        match rx.receive(&mut buf) {
            Ok(n) => {
                metrics.rx_bytes.fetch_add(n as u64, Ordering::Relaxed);
                assembler.feed(&buf[..n]);
            },
            Err(NetError::Timeout) => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// 为首帧中数据表没有的条目确定类型并一次性写入文件
///
/// 任意一个条目无法分类时返回错误，数据表文件保持不变。
fn classify_new_items(
    table: &StateTable,
    first: &SvrPayload,
    classifier: Option<&dyn ItemClassifier>,
) -> Result<(), DriverError> {
    let mut additions = Vec::new();
    for (name, size) in table.unknown_items(first) {
        let ty = classifier
            .and_then(|c| c.classify(name, size))
            .ok_or_else(|| DriverError::UnknownItemType {
                item: name.to_owned(),
                size,
            })?;
        info!("New item {} ({} bytes) classified as '{}'", name, size, ty.tag());
        additions.push((name.to_owned(), ty));
    }
    if !additions.is_empty() {
        table.add_items(&additions)?;
    }
    Ok(())
}

/// Ethernet Slave 通道
///
/// 持有后台读线程；`close()` 或 `Drop` 时依次停止日志、等待读线程退出、关闭连接。
pub struct ValueChannel {
    ctx: Arc<ValueContext>,
    tx: Mutex<Box<dyn ByteTx + Send>>,
    is_running: Arc<AtomicBool>,
    rx_thread: Option<JoinHandle<()>>,
    metrics: Arc<ValueChannelMetrics>,
    logger: Mutex<Option<(HookId, ItemLogger)>>,
    config: PipelineConfig,
    schema_path: PathBuf,
    peer: String,
}

impl ValueChannel {
    /// 在已建立的连接上完成数据表发现并启动读线程
    pub fn open<C: Connection>(conn: C, options: ValueChannelOptions) -> Result<Self, DriverError> {
        let peer = conn.peer();
        let (mut rx, tx) = conn.split()?;
        let metrics = Arc::new(ValueChannelMetrics::new());

        let mut assembler = FrameAssembler::new();
        let first = discover(
            &mut rx,
            &mut assembler,
            &options.pipeline,
            options.discovery_timeout,
            &metrics,
        )?;
        debug!("First TMSVR frame from {} carries {} items", peer, first.items.len());

        let store = SchemaStore::new(&options.table_dir, &options.session);
        let schema_path = store.path().to_path_buf();
        let existed = store.exists();
        let table = StateTable::new(store.load(options.create_missing_table)?, Some(store));
        classify_new_items(&table, &first, options.classifier.as_deref())?;
        // 分类成功后才落盘；新增条目时 add_items 已经写过
        if !existed && !schema_path.exists() {
            table.persist()?;
            info!("Created schema file {}", schema_path.display());
        }

        let ctx = Arc::new(ValueContext::new(table));
        apply_payload(&first, &ctx, &metrics);

        let is_running = Arc::new(AtomicBool::new(true));
        let rx_thread = {
            let ctx = ctx.clone();
            let config = options.pipeline.clone();
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            std::thread::Builder::new()
                .name("tm-svr-rx".into())
                .spawn(move || rx_loop(rx, assembler, ctx, config, is_running, metrics))
                .map_err(|e| DriverError::IoThread(e.to_string()))?
        };

        info!(
            "Ethernet Slave channel to {} ready ({} items, schema {})",
            peer,
            ctx.table.len(),
            schema_path.display()
        );

        Ok(Self {
            ctx,
            tx: Mutex::new(Box::new(tx)),
            is_running,
            rx_thread: Some(rx_thread),
            metrics,
            logger: Mutex::new(None),
            config: options.pipeline,
            schema_path,
            peer,
        })
    }

    /// 写入一个条目（`svr,2,item=value`），机器人不应答
    pub fn send(&self, item: &str, value: impl Into<ItemValue>) -> Result<(), DriverError> {
        if item.is_empty() {
            return Err(DriverError::InvalidInput("item name must not be empty".into()));
        }
        let data = format_svr_write(item, &value.into());
        trace!("TMSVR write: {:?}", data);
        let frame = TmFrame::new(HEADER_TMSVR, data);
        self.tx.lock().send_frame(&frame)?;
        self.metrics.tx_frames_total.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn table(&self) -> &StateTable {
        &self.ctx.table
    }

    pub fn get(&self, name: &str) -> Option<ItemValue> {
        self.ctx.table.get(name)
    }

    /// 整表拷贝
    pub fn snapshot(&self) -> Schema {
        self.ctx.table.snapshot()
    }

    pub fn joint_angle(&self) -> Option<[f64; 6]> {
        self.ctx.table.joint_angle()
    }

    pub fn coord_base_tool(&self) -> Option<[f64; 6]> {
        self.ctx.table.coord_base_tool()
    }

    pub fn robot_link(&self) -> Option<bool> {
        self.ctx.table.robot_link()
    }

    pub fn current_time(&self) -> Option<String> {
        self.ctx.table.current_time()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 读线程仍在运行
    pub fn is_healthy(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// 读线程因致命错误退出时的原因
    pub fn reader_error(&self) -> Option<String> {
        self.ctx.reader_error.lock().clone()
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    /// 将当前值写回数据表文件
    pub fn persist(&self) -> Result<(), DriverError> {
        self.ctx.table.persist()
    }

    pub fn add_hook(&self, hook: Arc<dyn SyncHook>) -> HookId {
        self.ctx.hooks.write().add(hook)
    }

    pub fn remove_hook(&self, id: HookId) -> bool {
        self.ctx.hooks.write().remove(id)
    }

    /// 开始把选定条目逐帧记录到 CSV 文件
    ///
    /// 已有日志时先停止旧日志。条目名必须在数据表中。
    pub fn start_logging(
        &self,
        path: impl AsRef<Path>,
        items: Vec<String>,
        mode: LogMode,
    ) -> Result<(), DriverError> {
        if items.is_empty() {
            return Err(DriverError::InvalidInput("no items to log".into()));
        }
        if let Some(missing) = items.iter().find(|name| !self.ctx.table.contains(name)) {
            return Err(DriverError::InvalidInput(format!(
                "item {} is not in the schema",
                missing
            )));
        }

        // 停止旧日志到登记新日志全程持有锁，ItemLogger 只在钩子移除后释放
        let mut slot = self.logger.lock();
        self.stop_logger(&mut slot);
        let logger = ItemLogger::start(path, items, mode, self.metrics.clone())?;
        if let Some(hook) = logger.hook() {
            let id = self.add_hook(hook);
            *slot = Some((id, logger));
        }
        Ok(())
    }

    /// 停止日志并等待剩余行落盘，没有日志时返回 `false`
    pub fn stop_logging(&self) -> bool {
        let mut slot = self.logger.lock();
        self.stop_logger(&mut slot)
    }

    fn stop_logger(&self, slot: &mut Option<(HookId, ItemLogger)>) -> bool {
        let Some((id, logger)) = slot.take() else {
            return false;
        };
        self.remove_hook(id);
        info!("Stopped item log {}", logger.path().display());
        logger.stop();
        true
    }

    pub fn is_logging(&self) -> bool {
        self.logger.lock().is_some()
    }

    /// 关闭通道
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(rx_thread) = self.rx_thread.take() else {
            return;
        };
        // Release: 之前的写入对读线程可见
        self.is_running.store(false, Ordering::Release);
        self.stop_logging();

        if let Err(e) = rx_thread.join_timeout(self.config.join_timeout()) {
            error!("Failed to join TMSVR reader for {}: {}", self.peer, e);
        }
        if let Err(e) = self.tx.lock().shutdown() {
            debug!("Socket shutdown for {}: {}", self.peer, e);
        }
        debug!("Ethernet Slave channel to {} closed", self.peer);
    }
}

impl Drop for ValueChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}
