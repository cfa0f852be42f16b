//! Loopback test harness: a running server and line-level clients.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use chatter::{ChatServer, ServerConfig};

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// A server running in the background until `stop` is called
pub struct TestServer {
    pub addr: SocketAddr,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(None).await
    }

    pub async fn start_with(room_log_dir: Option<PathBuf>) -> Self {
        let mut config = ServerConfig::with_addr("127.0.0.1:0");
        if let Some(dir) = room_log_dir {
            config = config.with_room_logs(dir);
        }
        let server = ChatServer::bind(config).await.expect("bind");
        let addr = server.local_addr().expect("local addr");
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(server.run(async {
            let _ = stop_rx.await;
        }));
        Self {
            addr,
            stop_tx: Some(stop_tx),
            task,
        }
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        timeout(IO_TIMEOUT, &mut self.task)
            .await
            .expect("server did not stop")
            .expect("server task failed");
    }
}

/// A raw TCP client with its own receive buffer
pub struct TestClient {
    pub id: u64,
    stream: TcpStream,
    buf: String,
}

impl TestClient {
    /// Connect, wait for the welcome, and turn colors off
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let mut client = Self {
            id: 0,
            stream,
            buf: String::new(),
        };
        let welcome = client.expect("Joined room: global\r\n").await;
        let start = welcome.find("You are #").expect("welcome line") + "You are #".len();
        let end = start + welcome[start..].find('.').expect("welcome terminator");
        client.id = welcome[start..end].parse().expect("session id");

        client.send("/color\r\n").await;
        client.expect("Color is now disabled.\r\n").await;
        client
    }

    pub async fn send(&mut self, text: &str) {
        self.stream
            .write_all(text.as_bytes())
            .await
            .expect("write");
    }

    /// Read until `needle` shows up; return everything up to and
    /// including it and keep the rest buffered
    pub async fn expect(&mut self, needle: &str) -> String {
        let found = timeout(IO_TIMEOUT, async {
            loop {
                if let Some(pos) = self.buf.find(needle) {
                    let end = pos + needle.len();
                    let head = self.buf[..end].to_string();
                    self.buf.drain(..end);
                    return head;
                }
                let mut chunk = [0u8; 1024];
                let n = self.stream.read(&mut chunk).await.expect("read");
                assert!(n > 0, "connection closed while waiting for {:?}", needle);
                self.buf.push_str(&String::from_utf8_lossy(&chunk[..n]));
            }
        })
        .await;
        match found {
            Ok(head) => head,
            Err(_) => panic!("timed out waiting for {:?}; have {:?}", needle, self.buf),
        }
    }

    /// Read until the server closes the connection
    pub async fn expect_eof(&mut self) -> String {
        timeout(IO_TIMEOUT, async {
            let mut chunk = [0u8; 1024];
            loop {
                let n = self.stream.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                self.buf.push_str(&String::from_utf8_lossy(&chunk[..n]));
            }
        })
        .await
        .expect("connection stayed open");
        std::mem::take(&mut self.buf)
    }

    /// Whatever has arrived within `wait`, without blocking longer
    pub async fn idle_output(&mut self, wait: Duration) -> String {
        let _ = timeout(wait, async {
            let mut chunk = [0u8; 1024];
            loop {
                match self.stream.read(&mut chunk).await {
                    Ok(n) if n > 0 => self.buf.push_str(&String::from_utf8_lossy(&chunk[..n])),
                    _ => break,
                }
            }
        })
        .await;
        std::mem::take(&mut self.buf)
    }
}
