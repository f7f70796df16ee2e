//! Call-activity navigation for BPMN editors.
//!
//! A [`BridgeServer`] runs next to the editor and answers file lookups over a
//! local WebSocket. A [`BridgeClient`] on the editor side issues typed
//! requests and matches replies to callers by correlation id. The
//! [`Navigator`] turns call-activity clicks into those requests.
//!
//! ```text
//! editor event -> Navigator -> BridgeClient ==ws==> BridgeServer -> handlers -> filesystem
//! ```

pub mod client;
pub mod error;
pub mod handlers;
pub mod host;
pub mod navigator;
pub mod protocol;
pub mod server;

pub use client::{BridgeClient, ClientOptions};
pub use error::{BridgeError, Error, Result};
pub use host::{CommandOpener, FileOpener, Host, LogHost, Notification};
pub use navigator::{Navigator, NavigatorState};
pub use protocol::{Message, Operation, DEFAULT_PORT};
pub use server::{BridgeServer, ServerOptions};
