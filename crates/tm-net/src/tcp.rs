//! TCP 连接实现
//!
//! 收发两半各持有一个 `try_clone()` 得到的句柄，共享同一个内核 socket。
//! 发送半边调用 `shutdown()` 后，阻塞在读取上的接收半边会立即返回。

use crate::{ByteRx, ByteTx, Connection, NetError};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// TCP 连接
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpConnection {
    /// 连接到 `host:port`
    ///
    /// 依次尝试解析出的每个地址，全部失败时返回最后一个错误。
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use tm_net::TcpConnection;
    ///
    /// let conn = TcpConnection::connect("192.168.1.10", 5891, Duration::from_secs(3)).unwrap();
    /// ```
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, NetError> {
        let addr = format!("{}:{}", host, port);
        let candidates = (host, port).to_socket_addrs().map_err(|source| NetError::Connect {
            addr: addr.clone(),
            source,
        })?;

        let mut last_err = None;
        for candidate in candidates {
            trace!("Connecting to {}", candidate);
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => return Self::from_stream(stream),
                Err(e) => {
                    debug!("Connect to {} failed: {}", candidate, e);
                    last_err = Some(e);
                },
            }
        }

        Err(NetError::Connect {
            addr,
            source: last_err
                .unwrap_or_else(|| std::io::Error::new(ErrorKind::NotFound, "no address resolved")),
        })
    }

    /// 包装一个已建立的连接
    pub fn from_stream(stream: TcpStream) -> Result<Self, NetError> {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }
        let peer = stream.peer_addr()?;
        Ok(Self { stream, peer })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Connection for TcpConnection {
    type Rx = TcpRx;
    type Tx = TcpTx;

    fn peer(&self) -> String {
        self.peer.to_string()
    }

    fn split(self) -> Result<(TcpRx, TcpTx), NetError> {
        let rx_stream = self.stream.try_clone()?;
        Ok((
            TcpRx { stream: rx_stream },
            TcpTx {
                stream: self.stream,
                shut_down: false,
            },
        ))
    }
}

/// TCP 接收半边
#[derive(Debug)]
pub struct TcpRx {
    stream: TcpStream,
}

impl ByteRx for TcpRx {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        loop {
            match self.stream.read(buf) {
                Ok(0) => return Err(NetError::Closed),
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                // 不同平台读超时分别报告为 WouldBlock 或 TimedOut
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(NetError::Timeout);
                },
                Err(e) if matches!(
                    e.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::NotConnected
                ) =>
                {
                    return Err(NetError::Closed);
                },
                Err(e) => return Err(NetError::Io(e)),
            }
        }
    }

    fn set_receive_timeout(&mut self, timeout: Duration) -> Result<(), NetError> {
        // `set_read_timeout(Some(0))` 会报错，零超时按最小值处理
        let timeout = timeout.max(Duration::from_millis(1));
        self.stream.set_read_timeout(Some(timeout))?;
        Ok(())
    }
}

/// TCP 发送半边
#[derive(Debug)]
pub struct TcpTx {
    stream: TcpStream,
    shut_down: bool,
}

impl ByteTx for TcpTx {
    fn send_all(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        if self.shut_down {
            return Err(NetError::Closed);
        }
        self.stream.write_all(bytes)?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), NetError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // 对端已先关闭
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(NetError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn pair() -> (TcpConnection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || listener.accept().unwrap().0);
        let conn = TcpConnection::connect("127.0.0.1", port, Duration::from_secs(1)).unwrap();
        (conn, server.join().unwrap())
    }

    #[test]
    fn test_send_and_receive() {
        let (conn, mut server) = pair();
        let (mut rx, mut tx) = conn.split().unwrap();

        tx.send_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        server.write_all(b"world").unwrap();
        let mut buf = [0u8; 16];
        rx.set_receive_timeout(Duration::from_secs(1)).unwrap();
        let n = rx.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"world");
    }

    #[test]
    fn test_receive_timeout() {
        let (conn, _server) = pair();
        let (mut rx, _tx) = conn.split().unwrap();
        rx.set_receive_timeout(Duration::from_millis(10)).unwrap();

        let mut buf = [0u8; 16];
        assert!(matches!(rx.receive(&mut buf), Err(NetError::Timeout)));
    }

    #[test]
    fn test_peer_close_reported() {
        let (conn, server) = pair();
        let (mut rx, _tx) = conn.split().unwrap();
        drop(server);

        rx.set_receive_timeout(Duration::from_secs(1)).unwrap();
        let mut buf = [0u8; 16];
        assert!(matches!(rx.receive(&mut buf), Err(NetError::Closed)));
    }

    #[test]
    fn test_shutdown_unblocks_reader() {
        let (conn, _server) = pair();
        let (mut rx, mut tx) = conn.split().unwrap();

        let reader = thread::spawn(move || {
            let mut buf = [0u8; 16];
            rx.receive(&mut buf)
        });
        thread::sleep(Duration::from_millis(20));
        tx.shutdown().unwrap();

        let result = reader.join().unwrap();
        assert!(result.is_err());
        assert!(matches!(tx.send_all(b"x"), Err(NetError::Closed)));
    }

    #[test]
    fn test_connect_refused() {
        // 绑定后立即释放，端口大概率无人监听
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let err = TcpConnection::connect("127.0.0.1", port, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, NetError::Connect { .. }));
    }
}
