//! GUI-side request client.
//!
//! One WebSocket per [`BridgeClient`]. Requests are written by a writer
//! task, replies are matched to callers by a reader task, and a sweeper task
//! rejects requests whose reply never came.

mod pending;

use std::{sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt};
pub use pending::PendingReplies;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::{
    sync::{mpsc, watch, Mutex},
    time::{interval, MissedTickBehavior},
};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::{
    error::{BridgeError, Error, Result},
    protocol::{
        local_endpoint, BpmnFileResponse, ConfigResponse, Message, OpenBpmnFileResponse,
        Operation, Request, DEFAULT_PORT,
    },
};

/// Text used when an `error` frame carries no message.
const UNKNOWN_ERROR: &str = "Unknown error";
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// WebSocket URL of the bridge server.
    pub endpoint: String,
    /// How long a request may wait for its reply.
    pub request_timeout: Duration,
    /// How often stale requests are swept.
    pub sweep_interval: Duration,
}

impl ClientOptions {
    pub fn for_port(port: u16) -> Self {
        Self {
            endpoint: local_endpoint(port),
            ..Self::default()
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: local_endpoint(DEFAULT_PORT),
            request_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// A live socket: outbound frames go through `outbound`, `closed` flips to
/// `true` once the reader stops. Each socket has its own pending registry, so
/// a closing socket only rejects the requests it carried.
#[derive(Clone)]
struct Connection {
    outbound: mpsc::UnboundedSender<String>,
    closed: watch::Receiver<bool>,
    pending: Arc<PendingReplies>,
}

impl Connection {
    fn is_closed(&self) -> bool {
        *self.closed.borrow() || self.outbound.is_closed()
    }
}

struct Inner {
    options: ClientOptions,
    connection: Mutex<Option<Connection>>,
}

/// Handle to the bridge server. Cheap to clone; clones share one socket.
#[derive(Clone)]
pub struct BridgeClient {
    inner: Arc<Inner>,
}

impl BridgeClient {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                connection: Mutex::new(None),
            }),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Open the socket. Calls against a live connection reuse it, concurrent
    /// calls wait for the attempt already in flight, and a call after the
    /// connection died opens a fresh one.
    pub async fn connect(&self) -> Result<()> {
        let mut slot = self.inner.connection.lock().await;
        match slot.as_ref() {
            Some(connection) if !connection.is_closed() => return Ok(()),
            Some(_) => tracing::info!("Previous connection closed, reconnecting"),
            None => {}
        }
        *slot = Some(self.open().await?);
        Ok(())
    }

    /// Whether a connection was established and is still alive.
    pub async fn is_connected(&self) -> bool {
        self.inner
            .connection
            .lock()
            .await
            .as_ref()
            .is_some_and(|connection| !connection.is_closed())
    }

    /// Number of requests still waiting for a reply on the current socket.
    pub async fn pending_count(&self) -> usize {
        let pending = self
            .inner
            .connection
            .lock()
            .await
            .as_ref()
            .map(|connection| connection.pending.clone());
        match pending {
            Some(pending) => pending.len().await,
            None => 0,
        }
    }

    /// The live connection, or why there is none.
    async fn current(&self) -> Result<Connection> {
        let slot = self.inner.connection.lock().await;
        let connection = slot.as_ref().ok_or(BridgeError::NotConnected)?;
        if connection.is_closed() {
            return Err(BridgeError::ConnectionClosed.into());
        }
        Ok(connection.clone())
    }

    async fn open(&self) -> Result<Connection> {
        let endpoint = &self.inner.options.endpoint;
        tracing::info!("Connecting to {endpoint}");

        let (socket, _) =
            connect_async(endpoint.as_str())
                .await
                .map_err(|e| BridgeError::Connect {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                })?;
        tracing::info!("Connected to {endpoint}");

        let (mut sink, mut stream) = socket.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (closed_tx, closed) = watch::channel(false);
        let pending = Arc::new(PendingReplies::new());

        let mut writer_closed = closed.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = outbound_rx.recv() => {
                        let Some(frame) = frame else { break };
                        if let Err(e) = sink.send(WsMessage::Text(frame.into())).await {
                            tracing::warn!("Failed to send frame: {e}");
                            break;
                        }
                    }
                    _ = writer_closed.changed() => break,
                }
            }
            let _ = sink.close().await;
        });

        let reader_pending = pending.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(WsMessage::Text(text)) => text.as_str().to_owned(),
                    Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => text,
                        Err(_) => continue,
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!("WebSocket read error: {e}");
                        break;
                    }
                };
                handle_incoming(&text, &reader_pending).await;
            }

            // Flag first so a request registering concurrently sees the close.
            let _ = closed_tx.send(true);
            let failed = reader_pending
                .fail_all(&BridgeError::ConnectionClosed)
                .await;
            tracing::info!("Connection closed, rejected {failed} pending request(s)");
        });

        spawn_sweeper(
            pending.clone(),
            closed.clone(),
            self.inner.options.request_timeout,
            self.inner.options.sweep_interval,
        );

        Ok(Connection {
            outbound,
            closed,
            pending,
        })
    }

    /// Send `operation` and wait for its reply's `data`.
    pub async fn request(&self, operation: Operation) -> Result<Value> {
        let connection = self.current().await?;

        let pending = &connection.pending;
        let name = operation.name();
        let (reference, reply) = pending.register(operation.ref_prefix(), name).await;

        // The reader may have failed everything between the check above and
        // the registration.
        if connection.is_closed() {
            pending.remove(&reference).await;
            return Err(BridgeError::ConnectionClosed.into());
        }

        let frame = match serde_json::to_string(&Message::Request(Request {
            reference: reference.clone(),
            operation,
        })) {
            Ok(frame) => frame,
            Err(e) => {
                pending.remove(&reference).await;
                return Err(e.into());
            }
        };

        if connection.outbound.send(frame).is_err() {
            pending.remove(&reference).await;
            return Err(BridgeError::ConnectionClosed.into());
        }
        tracing::debug!("Sent {name} as {reference}");

        match reply.await {
            Ok(outcome) => outcome.map_err(Error::from),
            Err(_) => Err(BridgeError::ConnectionClosed.into()),
        }
    }

    async fn request_typed<T: DeserializeOwned>(&self, operation: Operation) -> Result<T> {
        let data = self.request(operation).await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn get_config(&self, config_path: impl Into<String>) -> Result<ConfigResponse> {
        self.request_typed(Operation::get_config(config_path)).await
    }

    pub async fn get_bpmn_file(
        &self,
        config_path: impl Into<String>,
        bpmn_key: impl Into<String>,
    ) -> Result<BpmnFileResponse> {
        self.request_typed(Operation::get_bpmn_file(config_path, bpmn_key))
            .await
    }

    pub async fn open_bpmn_file(
        &self,
        config_path: impl Into<String>,
        bpmn_key: impl Into<String>,
    ) -> Result<OpenBpmnFileResponse> {
        self.request_typed(Operation::open_bpmn_file(config_path, bpmn_key))
            .await
    }
}

impl Default for BridgeClient {
    fn default() -> Self {
        Self::new(ClientOptions::default())
    }
}

/// Settle the pending entry a frame refers to. Frames for unknown refs are dropped.
async fn handle_incoming(text: &str, pending: &PendingReplies) {
    let message = match serde_json::from_str::<Message>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Dropping unparseable frame: {e}");
            return;
        }
    };

    let (reference, outcome) = match message {
        Message::Response { reference, data } => (reference, Ok(data)),
        Message::Error { reference, message } => {
            let message = if message.is_empty() {
                UNKNOWN_ERROR.to_string()
            } else {
                message
            };
            (reference, Err(BridgeError::Remote(message)))
        }
        Message::Request(request) => {
            tracing::debug!("Ignoring request frame {}", request.reference);
            return;
        }
    };

    if !pending.settle(&reference, outcome).await {
        tracing::debug!("No pending request for {reference}");
    }
}

fn spawn_sweeper(
    pending: Arc<PendingReplies>,
    mut closed: watch::Receiver<bool>,
    request_timeout: Duration,
    sweep_interval: Duration,
) {
    // `interval` panics on a zero period.
    let sweep_interval = sweep_interval.max(MIN_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    pending.sweep_expired(request_timeout).await;
                }
                _ = closed.changed() => break,
            }
        }
    });
}
