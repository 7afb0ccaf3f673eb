//! Listen Node 通道（端口 5890）
//!
//! 下发 TMSCT 脚本批次并查询 Listen Node 状态。普通下发不读取应答，
//! 批次之间的先后关系通过队列标签（`QueueTag`）在机器人端保证。

use crate::error::DriverError;
use std::time::{Duration, Instant};
use tm_net::{ByteRx, ByteTx, Connection, NetError};
use tm_protocol::{
    FrameAssembler, HEADER_TMSCT, HEADER_TMSTA, LINE_TERMINATOR, QUEUE_TAG_MODULUS, TMSTA_QUERY_READY,
    TmFrame,
};
use tracing::{debug, info, trace, warn};

/// 循环脚本 ID 计数器（`0..=9`，9 之后回到 0）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceCounter {
    next: u8,
}

impl SequenceCounter {
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// 下一次发送将使用的 ID
    pub const fn peek(&self) -> u8 {
        self.next
    }

    /// 前进一步，返回前进前的值
    pub fn advance(&mut self) -> u8 {
        let current = self.next;
        self.next = (current + 1) % QUEUE_TAG_MODULUS;
        current
    }
}

/// 脚本 `id` 的批次等待的队列标签（上一个 ID，0 对应 9）
pub const fn queue_tag_for(id: u8) -> u8 {
    (id % QUEUE_TAG_MODULUS + QUEUE_TAG_MODULUS - 1) % QUEUE_TAG_MODULUS
}

/// 组装 TMSCT 数据块：`<id>,<line>\r\n<line>...`（最后一行后不加换行）
///
/// # Example
///
/// ```
/// use tm_driver::build_script;
///
/// let data = build_script(&["PTP(JPP,0,0,90,0,90,0,20,200,50,true)"], 0, true).unwrap();
/// assert_eq!(data, "0,QueueTag(9)\r\nPTP(JPP,0,0,90,0,90,0,20,200,50,true)");
/// ```
pub fn build_script<S: AsRef<str>>(commands: &[S], id: u8, enqueue: bool) -> Result<String, DriverError> {
    if commands.is_empty() {
        return Err(DriverError::InvalidInput("command batch is empty".into()));
    }
    if id >= QUEUE_TAG_MODULUS {
        return Err(DriverError::InvalidInput(format!(
            "script id {} out of range 0..={}",
            id,
            QUEUE_TAG_MODULUS - 1
        )));
    }

    let mut data = format!("{},", id);
    if enqueue {
        data.push_str(&format!("QueueTag({})", queue_tag_for(id)));
        data.push_str(LINE_TERMINATOR);
    }
    for (i, line) in commands.iter().enumerate() {
        if i > 0 {
            data.push_str(LINE_TERMINATOR);
        }
        data.push_str(line.as_ref());
    }
    Ok(data)
}

/// Listen Node 状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyStatus {
    /// Listen Node 是否处于可接收脚本的状态
    pub ready: bool,
    /// 状态中附带的队列标签字段
    pub tag: String,
}

/// 从 TMSTA 帧中提取就绪状态（子命令不是 `00` 或字段不足时为 `None`）
pub fn parse_ready_status(frame: &TmFrame) -> Option<ReadyStatus> {
    if frame.header != HEADER_TMSTA {
        return None;
    }
    let text = frame.data_str()?;
    let fields: Vec<&str> = text.split(',').collect();
    match fields.as_slice() {
        [sub, ready, tag, ..] if *sub == TMSTA_QUERY_READY => Some(ReadyStatus {
            ready: *ready == "true",
            tag: (*tag).to_owned(),
        }),
        _ => None,
    }
}

/// 打开通道的参数
#[derive(Debug, Clone)]
pub struct CommandChannelOptions {
    /// `query_ready` 等待应答的上限
    pub query_timeout: Duration,
    /// 单次读取的超时
    pub receive_timeout: Duration,
    pub read_chunk_size: usize,
}

impl Default for CommandChannelOptions {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(5),
            receive_timeout: Duration::from_millis(50),
            read_chunk_size: 2048,
        }
    }
}

/// Listen Node 通道
///
/// 所有操作都需要 `&mut self`，同一通道上的下发与状态查询天然串行。
pub struct CommandChannel {
    rx: Box<dyn ByteRx + Send>,
    tx: Box<dyn ByteTx + Send>,
    assembler: FrameAssembler,
    counter: SequenceCounter,
    options: CommandChannelOptions,
    buf: Vec<u8>,
    peer: String,
    closed: bool,
}

impl CommandChannel {
    pub fn open<C: Connection>(conn: C, options: CommandChannelOptions) -> Result<Self, DriverError> {
        let peer = conn.peer();
        let (mut rx, tx) = conn.split()?;
        rx.set_receive_timeout(options.receive_timeout)?;
        info!("Listen Node channel to {} ready", peer);
        Ok(Self {
            rx: Box::new(rx),
            tx: Box::new(tx),
            assembler: FrameAssembler::new(),
            counter: SequenceCounter::new(),
            buf: vec![0u8; options.read_chunk_size.max(1)],
            options,
            peer,
            closed: false,
        })
    }

    /// 下一次不指定 ID 的发送将使用的 ID
    pub fn next_id(&self) -> u8 {
        self.counter.peek()
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// 下发一个脚本批次，返回使用的脚本 ID
    ///
    /// - `explicit_id`：指定 ID（`0..=9`），否则使用计数器
    /// - `enqueue`：在批次前插入 `QueueTag(<上一个 ID>)`
    ///
    /// 写入成功后计数器前进一步（指定 ID 时同样前进）。
    pub fn send<S: AsRef<str>>(
        &mut self,
        commands: &[S],
        explicit_id: Option<u8>,
        enqueue: bool,
    ) -> Result<u8, DriverError> {
        if self.closed {
            return Err(DriverError::ChannelClosed);
        }
        let id = explicit_id.unwrap_or_else(|| self.counter.peek());
        let data = build_script(commands, id, enqueue)?;
        let frame = TmFrame::new(HEADER_TMSCT, data);
        trace!("TMSCT {}: {:?}", id, frame.data_str());

        self.tx.send_frame(&frame)?;
        self.counter.advance();
        debug!("Sent script {} ({} lines, enqueue = {})", id, commands.len(), enqueue);
        Ok(id)
    }

    /// 读取下一个完整帧，`timeout` 内没有则返回 `Timeout`
    pub fn next_frame(&mut self, timeout: Duration) -> Result<TmFrame, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(frame) = self.assembler.next_frame() {
                if !frame.checksum_valid() {
                    warn!("Checksum mismatch on {} frame from {}", frame.header, self.peer);
                }
                return Ok(frame);
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout);
            }
            match self.rx.receive(&mut self.buf) {
                Ok(n) => self.assembler.feed(&self.buf[..n]),
                Err(NetError::Timeout) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// 查询 Listen Node 是否就绪
    ///
    /// 发送 `$TMSTA,2,00,*41`，丢弃其他帧直到收到 `00` 子命令的应答。
    pub fn query_ready(&mut self) -> Result<ReadyStatus, DriverError> {
        if self.closed {
            return Err(DriverError::ChannelClosed);
        }
        self.tx
            .send_frame(&TmFrame::new(HEADER_TMSTA, TMSTA_QUERY_READY))?;

        let deadline = Instant::now() + self.options.query_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DriverError::Timeout);
            }
            let frame = self.next_frame(remaining)?;
            match parse_ready_status(&frame) {
                Some(status) => {
                    debug!("Listen Node ready = {}, tag = {}", status.ready, status.tag);
                    return Ok(status);
                },
                None => trace!("Skipping {} frame while waiting for TMSTA", frame.header),
            }
        }
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.tx.shutdown() {
            debug!("Socket shutdown for {}: {}", self.peer, e);
        }
        debug!("Listen Node channel to {} closed", self.peer);
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}
