//! Test utilities and fixtures for nuoke
//!
//! Helpers for starting a server on an ephemeral port and talking to it the
//! way a line-based client would.

#![allow(dead_code)]

use nuoke::chat::{ChatConfig, ChatServer, ChatState, Store};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Start a server on 127.0.0.1 with an OS-assigned port
pub async fn start_server(config: ChatConfig, data_dir: &std::path::Path) -> ChatServer {
    let store = Store::open(data_dir).expect("Failed to open store");
    ChatServer::start("127.0.0.1:0", ChatState::new(config, store))
        .await
        .expect("Failed to start server")
}

/// A raw TCP client that accumulates everything the server sends
pub struct TestClient {
    stream: TcpStream,
    buffer: String,
}

impl TestClient {
    pub async fn connect(server: &ChatServer) -> Self {
        let stream = TcpStream::connect(server.local_addr())
            .await
            .expect("Failed to connect");
        Self {
            stream,
            buffer: String::new(),
        }
    }

    /// Send one line
    pub async fn send(&mut self, line: &str) {
        self.stream
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .expect("Failed to write");
    }

    /// Read until `needle` has arrived, returning everything up to and
    /// including it. Panics after five seconds.
    pub async fn expect(&mut self, needle: &str) -> String {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(pos) = self.buffer.find(needle) {
                let end = pos + needle.len();
                let consumed: String = self.buffer.drain(..end).collect();
                return consumed;
            }

            let mut chunk = [0u8; 4096];
            let read = tokio::time::timeout_at(deadline, self.stream.read(&mut chunk))
                .await
                .unwrap_or_else(|_| {
                    panic!("Timed out waiting for {:?}, have {:?}", needle, self.buffer)
                })
                .expect("Failed to read");
            assert!(read > 0, "Connection closed waiting for {:?}", needle);
            self.buffer.push_str(&String::from_utf8_lossy(&chunk[..read]));
        }
    }

    /// Register or log in and wait for the welcome hints
    pub async fn login(server: &ChatServer, name: &str, password: &str) -> Self {
        let mut client = Self::connect(server).await;
        client.expect("请输入您的用户名: ").await;
        client.send(name).await;
        client.expect(": ").await;
        client.send(password).await;
        client.expect("开始私聊\n").await;
        client
    }

    /// Whether the server closes the connection within five seconds
    pub async fn closed(&mut self) -> bool {
        let mut chunk = [0u8; 4096];
        loop {
            match tokio::time::timeout(Duration::from_secs(5), self.stream.read(&mut chunk)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return true,
                Ok(Ok(n)) => self
                    .buffer
                    .push_str(&String::from_utf8_lossy(&chunk[..n])),
                Err(_) => return false,
            }
        }
    }
}

/// Poll the broker's state until `condition` holds, for up to five seconds
pub async fn wait_until<F>(server: &ChatServer, condition: F) -> bool
where
    F: Fn(&ChatState) -> bool + Clone + Send + 'static,
{
    let handle = server.handle();
    for _ in 0..250 {
        if handle.query(condition.clone()).await.unwrap_or(false) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
