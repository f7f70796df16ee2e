//! Local bridge server answering file-lookup requests over WebSocket.
//!
//! Architecture:
//! ```text
//! BridgeClient ── ws://127.0.0.1:1337 ──> accept loop ──> handle_client (per socket)
//!                                                              │
//!                                               one task per request -> handlers
//! ```

mod connection;

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

pub use connection::Responder;
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
    task::JoinHandle,
};

use crate::{
    error::Result,
    handlers::HandlerContext,
    host::FileOpener,
    protocol::DEFAULT_PORT,
};

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    /// `0` picks a free port; [`BridgeServer::listen`] returns the bound address.
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

struct Listening {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Bridge server. Owns the listener and the host handle shared by handlers.
pub struct BridgeServer {
    options: ServerOptions,
    context: Arc<HandlerContext>,
    listening: Mutex<Option<Listening>>,
    accepted: Arc<AtomicUsize>,
}

impl BridgeServer {
    pub fn new(options: ServerOptions, opener: Option<Arc<dyn FileOpener>>) -> Self {
        Self {
            options,
            context: Arc::new(HandlerContext::new(opener)),
            listening: Mutex::new(None),
            accepted: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bind and start accepting. Calling again while listening returns the
    /// existing address without binding a second socket.
    pub async fn listen(&self) -> Result<SocketAddr> {
        let mut listening = self.listening.lock().await;
        if let Some(current) = listening.as_ref() {
            tracing::debug!("Already listening on {}", current.addr);
            return Ok(current.addr);
        }

        let listener = TcpListener::bind((self.options.host.as_str(), self.options.port)).await?;
        let addr = listener.local_addr()?;
        tracing::info!("Listening on ws://{addr}");
        if !self.context.can_open_files() {
            tracing::warn!("No file opener configured, openBpmnFile requests will fail");
        }

        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run_listener(
            listener,
            self.context.clone(),
            self.accepted.clone(),
            stop_rx,
        ));

        *listening = Some(Listening { addr, stop, task });
        Ok(addr)
    }

    /// Address currently bound, if listening.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listening.lock().await.as_ref().map(|l| l.addr)
    }

    /// Number of WebSocket connections accepted so far.
    pub fn accepted_connections(&self) -> usize {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Stop accepting new connections. Established connections finish on their own.
    pub async fn shutdown(&self) {
        let Some(listening) = self.listening.lock().await.take() else {
            return;
        };
        let _ = listening.stop.send(());
        let _ = listening.task.await;
        tracing::info!("Stopped listening on {}", listening.addr);
    }
}

impl Default for BridgeServer {
    fn default() -> Self {
        Self::new(ServerOptions::default(), None)
    }
}

async fn run_listener(
    listener: TcpListener,
    context: Arc<HandlerContext>,
    accepted: Arc<AtomicUsize>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop => break,
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    accepted.fetch_add(1, Ordering::Relaxed);
                    tokio::spawn(connection::handle_client(stream, peer, context.clone()));
                }
                Err(e) => {
                    tracing::error!("Accept error: {e}");
                }
            },
        }
    }
}
