//! 条目 CSV 日志
//!
//! 读线程每应用一帧，就把选定条目的当前值拼成一行（列表展平），
//! 通过有界通道交给写线程落盘。队列满时丢行而不是阻塞读线程，
//! 丢弃数量记录在指标中。

use crate::hooks::SyncHook;
use crate::metrics::ValueChannelMetrics;
use crate::state::StateTable;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use tm_protocol::SvrPayload;
use tracing::{debug, error, info};

/// 日志队列容量（行）
pub const LOG_QUEUE_CAPACITY: usize = 10_000;

/// 文件打开方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogMode {
    /// 追加到已有文件末尾
    #[default]
    Append,
    /// 清空后重新写入
    Overwrite,
}

/// CSV 字段转义：含分隔符、引号或换行时加引号
fn escape_field(field: &str) -> std::borrow::Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\"")).into()
    } else {
        field.into()
    }
}

/// 将一行字段写为 CSV（`\r\n` 结尾）
pub fn write_csv_row<W: Write>(out: &mut W, fields: &[String]) -> std::io::Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        out.write_all(escape_field(field).as_bytes())?;
    }
    out.write_all(b"\r\n")
}

/// 读线程侧的日志钩子
struct ItemLogHook {
    items: Vec<String>,
    tx: Sender<Vec<String>>,
    metrics: Arc<ValueChannelMetrics>,
}

impl SyncHook for ItemLogHook {
    fn on_frame_applied(&self, table: &StateTable, _payload: &SvrPayload) {
        let mut row = Vec::with_capacity(self.items.len());
        for value in table.values(&self.items) {
            value.flatten_into(&mut row);
        }
        match self.tx.try_send(row) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                self.metrics.rows_dropped.fetch_add(1, Ordering::Relaxed);
            },
            // 写线程已退出（IO 错误），其错误已记录
            Err(TrySendError::Disconnected(_)) => {},
        }
    }
}

fn writer_loop(
    rx: Receiver<Vec<String>>,
    mut out: BufWriter<File>,
    path: PathBuf,
    metrics: Arc<ValueChannelMetrics>,
) {
    // 发送端全部释放后 recv 返回 Err，循环自然结束
    while let Ok(row) = rx.recv() {
        if let Err(e) = write_csv_row(&mut out, &row) {
            error!("Item log {}: write failed: {}", path.display(), e);
            return;
        }
        metrics.rows_logged.fetch_add(1, Ordering::Relaxed);
        // 队列暂时空了再刷盘，减少系统调用
        if rx.is_empty()
            && let Err(e) = out.flush()
        {
            error!("Item log {}: flush failed: {}", path.display(), e);
            return;
        }
    }
    if let Err(e) = out.flush() {
        error!("Item log {}: flush failed: {}", path.display(), e);
    }
    debug!("Item log writer for {} exited", path.display());
}

/// 运行中的 CSV 日志
///
/// 通过 [`ItemLogger::hook`] 得到的钩子注册到通道后开始产生数据；
/// [`ItemLogger::stop`] 等待队列中剩余的行全部写完。
pub struct ItemLogger {
    path: PathBuf,
    items: Vec<String>,
    hook: Option<Arc<ItemLogHook>>,
    writer: Option<JoinHandle<()>>,
}

impl ItemLogger {
    /// 打开文件并启动写线程
    pub fn start(
        path: impl AsRef<Path>,
        items: Vec<String>,
        mode: LogMode,
        metrics: Arc<ValueChannelMetrics>,
    ) -> Result<Self, std::io::Error> {
        let path = path.as_ref().to_path_buf();
        let file = match mode {
            LogMode::Append => OpenOptions::new().create(true).append(true).open(&path)?,
            LogMode::Overwrite => File::create(&path)?,
        };

        let (tx, rx) = bounded(LOG_QUEUE_CAPACITY);
        let writer = {
            let path = path.clone();
            let metrics = metrics.clone();
            std::thread::Builder::new()
                .name("tm-item-log".into())
                .spawn(move || writer_loop(rx, BufWriter::new(file), path, metrics))?
        };

        info!("Logging {:?} to {}", items, path.display());
        Ok(Self {
            hook: Some(Arc::new(ItemLogHook {
                items: items.clone(),
                tx,
                metrics,
            })),
            path,
            items,
            writer: Some(writer),
        })
    }

    /// 读线程钩子
    pub fn hook(&self) -> Option<Arc<dyn SyncHook>> {
        self.hook.clone().map(|h| h as Arc<dyn SyncHook>)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// 停止并等待写线程落盘
    ///
    /// 调用前必须先从 `HookManager` 中移除钩子，否则通道不会断开。
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // 释放本端持有的发送端
        self.hook.take();
        if let Some(writer) = self.writer.take()
            && writer.join().is_err()
        {
            error!("Item log writer for {} panicked", self.path.display());
        }
    }
}

impl Drop for ItemLogger {
    fn drop(&mut self) {
        self.shutdown();
    }
}
