#![allow(dead_code)]

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use flow_studio::{
    BridgeClient, BridgeServer, ClientOptions, FileOpener, ServerOptions,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tempfile::TempDir;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::JoinHandle,
};
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage, WebSocketStream};

pub const WAIT: Duration = Duration::from_secs(5);

/// A project directory with a config file.
pub struct Project {
    dir: TempDir,
    pub config_path: PathBuf,
}

impl Project {
    pub fn new(config: &Value) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = dir.path().join("config.json");
        fs::write(&config_path, config.to_string()).expect("Failed to write config");
        Self { dir, config_path }
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create dirs");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> String {
        self.config_path.to_str().expect("utf-8 temp path").to_string()
    }
}

#[derive(Default)]
pub struct RecordingOpener {
    pub opened: Mutex<Vec<PathBuf>>,
}

impl FileOpener for RecordingOpener {
    fn open_files(&self, paths: &[PathBuf]) -> io::Result<()> {
        self.opened.lock().unwrap().extend_from_slice(paths);
        Ok(())
    }
}

/// Real bridge server on an ephemeral port.
pub async fn start_server(opener: Option<Arc<dyn FileOpener>>) -> (BridgeServer, u16) {
    let server = BridgeServer::new(
        ServerOptions {
            port: 0,
            ..ServerOptions::default()
        },
        opener,
    );
    let addr = server.listen().await.expect("Failed to listen");
    (server, addr.port())
}

pub fn client_for(port: u16) -> BridgeClient {
    BridgeClient::new(ClientOptions::for_port(port))
}

/// WebSocket server whose replies are scripted by the test.
pub struct FakeServer {
    pub port: u16,
    pub accepted: Arc<AtomicUsize>,
    sockets: mpsc::UnboundedReceiver<WebSocketStream<TcpStream>>,
    listener: JoinHandle<()>,
}

impl FakeServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let (tx, sockets) = mpsc::unbounded_channel();

        let counter = accepted.clone();
        let listener = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Ok(ws) = accept_async(stream).await {
                    let _ = tx.send(ws);
                }
            }
        });

        Self {
            port,
            accepted,
            sockets,
            listener,
        }
    }

    /// Stop accepting; the port refuses connections afterwards.
    pub fn stop(&self) {
        self.listener.abort();
    }

    pub async fn next_socket(&mut self) -> WebSocketStream<TcpStream> {
        tokio::time::timeout(WAIT, self.sockets.recv())
            .await
            .expect("No client connected")
            .expect("Listener stopped")
    }
}

/// Next text frame parsed as JSON.
pub async fn recv_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("Timed out waiting for frame")
            .expect("Socket closed")
            .expect("Read error");
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("Invalid JSON frame");
        }
    }
}

pub async fn send_json(ws: &mut WebSocketStream<TcpStream>, value: &Value) {
    ws.send(WsMessage::Text(value.to_string().into()))
        .await
        .expect("Failed to send frame");
}
