//! 本机 TCP 上的模拟机器人
//!
//! 两个监听端口分别模拟 Ethernet Slave 与 Listen Node。每个端口一个辅助线程：
//! 接受一个连接，先写出初始字节，之后转发测试排队的数据并收集客户端写入的字节。

#![allow(dead_code)]

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::io::{ErrorKind, Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tm_sdk::protocol::{FrameAssembler, HEADER_TMSVR, SvrItem, TmFrame, encode_svr_payload};

/// 单个端口的模拟端
pub struct MockPort {
    pub port: u16,
    outbox: Sender<Vec<u8>>,
    inbox: Receiver<Vec<u8>>,
    closed: Arc<AtomicBool>,
    assembler: FrameAssembler,
}

impl MockPort {
    pub fn spawn(initial: Vec<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (outbox, outbox_rx) = unbounded::<Vec<u8>>();
        let (inbox_tx, inbox) = unbounded();
        let closed = Arc::new(AtomicBool::new(false));

        let flag = closed.clone();
        thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            stream.set_read_timeout(Some(Duration::from_millis(5))).unwrap();
            if !initial.is_empty() && stream.write_all(&initial).is_err() {
                flag.store(true, Ordering::Release);
                return;
            }
            let mut buf = [0u8; 4096];
            loop {
                while let Ok(bytes) = outbox_rx.try_recv() {
                    if stream.write_all(&bytes).is_err() {
                        flag.store(true, Ordering::Release);
                        return;
                    }
                }
                match stream.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let _ = inbox_tx.send(buf[..n].to_vec());
                    },
                    Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {},
                    Err(_) => break,
                }
            }
            flag.store(true, Ordering::Release);
        });

        Self {
            port,
            outbox,
            inbox,
            closed,
            assembler: FrameAssembler::new(),
        }
    }

    /// 排队发给客户端的字节
    pub fn push(&self, bytes: impl Into<Vec<u8>>) {
        self.outbox.send(bytes.into()).unwrap();
    }

    /// 收集客户端写入的 `count` 个帧（2 秒内）
    pub fn frames(&mut self, count: usize) -> Vec<TmFrame> {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut frames = Vec::new();
        while frames.len() < count {
            frames.extend(self.assembler.frames());
            if frames.len() >= count {
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.inbox.recv_timeout(remaining) {
                Ok(bytes) => self.assembler.feed(&bytes),
                Err(_) => break,
            }
        }
        frames
    }

    /// 客户端是否已断开
    pub fn wait_closed(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.closed.load(Ordering::Acquire) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

pub fn floats(values: &[f32]) -> Bytes {
    values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>().into()
}

/// 编码一帧 TMSVR 数据
pub fn svr_frame(script_id: &str, items: &[SvrItem]) -> Vec<u8> {
    TmFrame::new(HEADER_TMSVR, encode_svr_payload(script_id, "0", items))
        .to_bytes()
        .to_vec()
}

/// 典型的首帧：连接状态、时间戳、关节角、工具位姿
pub fn status_frame(joints: [f32; 6], time: &'static str) -> Vec<u8> {
    svr_frame(
        "1",
        &[
            SvrItem::new("Robot_Link", Bytes::from_static(&[1])),
            SvrItem::new("Current_Time", Bytes::from_static(time.as_bytes())),
            SvrItem::new("Joint_Angle", floats(&joints)),
            SvrItem::new("Coord_Base_Tool", floats(&[100.0, 200.0, 300.0, 180.0, 0.0, 90.0])),
        ],
    )
}
