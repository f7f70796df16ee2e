use std::{error::Error as StdError, fmt, io, result::Result as StdResult};

use tokio_tungstenite::tungstenite;

/// Failures surfaced to callers of the bridge client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// `request` was issued before `connect` succeeded.
    NotConnected,
    /// The socket died while the request was outstanding, or before it was sent.
    ConnectionClosed,
    /// No reply arrived within the client's request timeout.
    TimedOut {
        reference: String,
        operation: &'static str,
    },
    /// The server answered with an `error` frame.
    Remote(String),
    /// The transport failed before the connection became ready.
    Connect { endpoint: String, reason: String },
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "WebSocket not initialized"),
            Self::ConnectionClosed => write!(f, "WebSocket connection not available"),
            Self::TimedOut {
                reference,
                operation,
            } => write!(f, "Request {reference} ({operation}) timed out"),
            Self::Remote(message) => write!(f, "{message}"),
            Self::Connect { endpoint, reason } => {
                write!(f, "Failed to connect to {endpoint}: {reason}")
            }
        }
    }
}

impl StdError for BridgeError {}

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Json(serde_json::Error),
    WebSocket(tungstenite::Error),
    Bridge(BridgeError),
}

impl Error {
    /// The bridge-level failure, if this error carries one.
    pub const fn as_bridge(&self) -> Option<&BridgeError> {
        match self {
            Self::Bridge(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::WebSocket(e) => write!(f, "WebSocket error: {e}"),
            Self::Bridge(e) => write!(f, "{e}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::WebSocket(e) => Some(e),
            Self::Bridge(e) => Some(e),
        }
    }
}

impl From<BridgeError> for Error {
    fn from(e: BridgeError) -> Self {
        Self::Bridge(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Self::WebSocket(e)
    }
}

pub type Result<T> = StdResult<T, Error>;
