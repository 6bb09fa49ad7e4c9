// tests/common.rs
#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

static INIT: Once = Once::new();

// Initializes environment variables from .env and the logger for testing.
// Uses std::sync::Once to ensure it only runs once across all tests.
pub fn setup() {
    INIT.call_once(|| {
        if dotenv::from_path(".env").is_err() {
            println!("Warning: .env file not found in current directory.");
        }
        env_logger::builder().is_test(true).try_init().ok();
    });
}

pub fn get_env_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{} environment variable not set", name))
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Instructions pushed to every connection the mock server holds.
#[derive(Debug, Clone)]
pub enum ServerCommand {
    Text(String),
    Close(u16, String),
    Drop,
    // Raw bytes that are not a valid frame (all reserved bits set).
    Garbage,
}

/// Local websocket server that echoes text frames and records what it got.
pub struct MockServer {
    pub url: String,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    commands: broadcast::Sender<ServerCommand>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let (commands, _) = broadcast::channel(64);

        tokio::spawn({
            let received = Arc::clone(&received);
            let connections = Arc::clone(&connections);
            let commands = commands.clone();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let rx = commands.subscribe();
                    tokio::spawn(handle_connection(
                        stream,
                        Arc::clone(&received),
                        Arc::clone(&connections),
                        rx,
                    ));
                }
            }
        });

        Self {
            url: format!("ws://{}/", addr),
            received,
            connections,
            commands,
        }
    }

    pub async fn received(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn push_text(&self, text: &str) {
        let _ = self.commands.send(ServerCommand::Text(text.to_string()));
    }

    pub fn close_all(&self, code: u16, reason: &str) {
        let _ = self
            .commands
            .send(ServerCommand::Close(code, reason.to_string()));
    }

    pub fn drop_all(&self) {
        let _ = self.commands.send(ServerCommand::Drop);
    }

    pub fn send_garbage(&self) {
        let _ = self.commands.send(ServerCommand::Garbage);
    }
}

async fn handle_connection(
    stream: TcpStream,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    mut commands: broadcast::Receiver<ServerCommand>,
) {
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(_) => return,
    };
    connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            incoming = ws.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    received.lock().await.push(text.clone());
                    let _ = ws.send(Message::Text(text)).await;
                }
                Some(Ok(Message::Close(_))) => {
                    // Flush the close reply queued by tungstenite.
                    let _ = ws.close(None).await;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
            command = commands.recv() => match command {
                Ok(ServerCommand::Text(text)) => {
                    let _ = ws.send(Message::Text(text)).await;
                }
                Ok(ServerCommand::Close(code, reason)) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    let _ = ws.close(Some(frame)).await;
                }
                Ok(ServerCommand::Drop) => break,
                Ok(ServerCommand::Garbage) => {
                    let _ = ws.get_mut().write_all(&[0xFF, 0x00]).await;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
