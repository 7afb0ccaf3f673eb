//! 内存中的 mock 连接
//!
//! 接收端按预先排队的数据块逐次返回，队列为空时返回超时；
//! 发送端把写出的字节记录到共享缓冲区，测试可以随时检查。

use crate::{ByteRx, ByteTx, Connection, NetError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct Shared {
    rx_chunks: VecDeque<Vec<u8>>,
    /// 队列耗尽后报告对端关闭（而不是超时）
    close_when_drained: bool,
    sent: Vec<u8>,
    shut_down: bool,
}

/// Mock 连接（克隆共享同一状态）
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    shared: Arc<Mutex<Shared>>,
    /// 空队列时模拟的读阻塞时间
    idle_delay: Duration,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            shared: Arc::default(),
            idle_delay: Duration::from_millis(1),
        }
    }

    /// 追加一块待接收的数据（每次 `receive` 最多返回一块）
    pub fn push_rx(&self, bytes: impl Into<Vec<u8>>) {
        self.shared.lock().rx_chunks.push_back(bytes.into());
    }

    /// 队列耗尽后返回 `NetError::Closed`
    pub fn close_when_drained(&self) {
        self.shared.lock().close_when_drained = true;
    }

    /// 取出至今写出的全部字节
    pub fn take_sent(&self) -> Vec<u8> {
        std::mem::take(&mut self.shared.lock().sent)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.lock().shut_down
    }

    pub fn pending_rx(&self) -> usize {
        self.shared.lock().rx_chunks.len()
    }
}

impl Connection for MockConnection {
    type Rx = MockRx;
    type Tx = MockTx;

    fn peer(&self) -> String {
        "mock".to_owned()
    }

    fn split(self) -> Result<(MockRx, MockTx), NetError> {
        Ok((
            MockRx {
                shared: self.shared.clone(),
                idle_delay: self.idle_delay,
            },
            MockTx {
                shared: self.shared,
            },
        ))
    }
}

#[derive(Debug)]
pub struct MockRx {
    shared: Arc<Mutex<Shared>>,
    idle_delay: Duration,
}

impl ByteRx for MockRx {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        let mut shared = self.shared.lock();
        if shared.shut_down {
            return Err(NetError::Closed);
        }
        let Some(mut chunk) = shared.rx_chunks.pop_front() else {
            let closed = shared.close_when_drained;
            drop(shared);
            if closed {
                return Err(NetError::Closed);
            }
            std::thread::sleep(self.idle_delay);
            return Err(NetError::Timeout);
        };

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            // 剩余部分放回队首
            shared.rx_chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn set_receive_timeout(&mut self, timeout: Duration) -> Result<(), NetError> {
        self.idle_delay = timeout.min(Duration::from_millis(5));
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockTx {
    shared: Arc<Mutex<Shared>>,
}

impl ByteTx for MockTx {
    fn send_all(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        let mut shared = self.shared.lock();
        if shared.shut_down {
            return Err(NetError::Closed);
        }
        shared.sent.extend_from_slice(bytes);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), NetError> {
        self.shared.lock().shut_down = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_returned_in_order() {
        let conn = MockConnection::new();
        conn.push_rx(b"abc".to_vec());
        conn.push_rx(b"de".to_vec());
        let (mut rx, _tx) = conn.clone().split().unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(rx.receive(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(rx.receive(&mut buf).unwrap(), 1);
        assert_eq!(&buf[..1], b"c");
        assert_eq!(rx.receive(&mut buf).unwrap(), 2);
        assert!(matches!(rx.receive(&mut buf), Err(NetError::Timeout)));
    }

    #[test]
    fn test_sent_bytes_recorded() {
        let conn = MockConnection::new();
        let (_rx, mut tx) = conn.clone().split().unwrap();
        tx.send_all(b"$TMSTA,2,00,*41\r\n").unwrap();
        assert_eq!(conn.take_sent(), b"$TMSTA,2,00,*41\r\n".to_vec());

        tx.shutdown().unwrap();
        assert!(conn.is_shut_down());
        assert!(tx.send_all(b"x").is_err());
    }

    #[test]
    fn test_close_when_drained() {
        let conn = MockConnection::new();
        conn.close_when_drained();
        let (mut rx, _tx) = conn.split().unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(rx.receive(&mut buf), Err(NetError::Closed)));
    }
}
