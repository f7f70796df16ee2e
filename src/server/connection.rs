//! One accepted WebSocket: frame parsing, dispatch and replies.

use std::{net::SocketAddr, str, sync::Arc};

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};

use crate::{
    handlers::{self, HandlerContext, HandlerError},
    protocol::{Message, Operation, Request},
};

/// Sends the single reply owed to one request. Consumed by sending.
pub struct Responder {
    reference: String,
    replies: mpsc::UnboundedSender<Message>,
}

impl Responder {
    pub const fn new(reference: String, replies: mpsc::UnboundedSender<Message>) -> Self {
        Self { reference, replies }
    }

    pub fn respond(self, data: Value) {
        let msg = Message::response(self.reference.clone(), data);
        self.send(msg);
    }

    pub fn fail(self, message: impl Into<String>) {
        let msg = Message::error(self.reference.clone(), message);
        self.send(msg);
    }

    pub fn finish(self, result: Result<Value, HandlerError>) {
        match result {
            Ok(data) => self.respond(data),
            Err(e) => {
                tracing::warn!("Request {} failed: {e}", self.reference);
                self.fail(e.to_string());
            }
        }
    }

    fn send(&self, msg: Message) {
        if self.replies.send(msg).is_err() {
            tracing::debug!("Connection gone before reply to {}", self.reference);
        }
    }
}

/// Serve one client until it disconnects.
pub async fn handle_client(stream: TcpStream, peer: SocketAddr, context: Arc<HandlerContext>) {
    let socket = match accept_async(stream).await {
        Ok(socket) => socket,
        Err(e) => {
            tracing::warn!("WebSocket handshake with {peer} failed: {e}");
            return;
        }
    };
    tracing::info!("Client connected: {peer}");

    let (mut sink, mut frames) = socket.split();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = reply_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::warn!("Failed to serialize reply: {e}");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => dispatch_frame(text.as_str(), &reply_tx, &context),
            Ok(WsMessage::Binary(bytes)) => match str::from_utf8(&bytes) {
                Ok(text) => dispatch_frame(text, &reply_tx, &context),
                Err(_) => tracing::debug!("Ignoring non-UTF-8 binary frame from {peer}"),
            },
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Read error from {peer}: {e}");
                break;
            }
        }
    }

    // In-flight handlers keep their own senders; the writer drains them.
    drop(reply_tx);
    let _ = writer.await;
    tracing::info!("Client disconnected: {peer}");
}

/// Parse one frame and start its handler. Replies asynchronously.
pub fn dispatch_frame(
    text: &str,
    replies: &mpsc::UnboundedSender<Message>,
    context: &Arc<HandlerContext>,
) {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Received invalid JSON: {e}");
            Responder::new(String::new(), replies.clone()).fail(format!("Invalid message: {e}"));
            return;
        }
    };
    tracing::debug!("received: {value}");

    let reference = field(&value, "ref").unwrap_or_default().to_string();
    let responder = Responder::new(reference, replies.clone());

    match parse_request(value) {
        Ok(request) => {
            let context = context.clone();
            tokio::spawn(async move {
                let result = handlers::handle(request.operation, &context).await;
                responder.finish(result);
            });
        }
        Err(message) => {
            tracing::warn!("{message}");
            responder.fail(message);
        }
    }
}

fn field<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
    value.get(name).and_then(Value::as_str)
}

/// Accept only `request` frames naming a known operation.
fn parse_request(value: Value) -> Result<Request, String> {
    let kind = field(&value, "type").map(String::from);
    let operation = field(&value, "operation").map(String::from);

    match (kind.as_deref(), operation.as_deref()) {
        (Some("request"), Some(name)) if Operation::is_known(name) => {
            serde_json::from_value::<Request>(value)
                .map_err(|e| format!("Invalid request '{name}': {e}"))
        }
        (kind, operation) => Err(format!(
            "Unknown operation '{}:{}'",
            kind.unwrap_or("undefined"),
            operation.unwrap_or("undefined")
        )),
    }
}
