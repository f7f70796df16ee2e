//! Wire types shared by the bridge client and server.
//!
//! Every frame is a JSON text message tagged by `type`. Requests carry an
//! `operation` tag and a `ref` that the matching reply echoes back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Port the server listens on and the client dials when none is configured.
pub const DEFAULT_PORT: u16 = 1337;

/// Config path used by `getConfig` when the request omits one.
pub const DEFAULT_CONFIG_PATH: &str = "./config.json";

/// Endpoint URL for a bridge server on the local machine.
pub fn local_endpoint(port: u16) -> String {
    format!("ws://127.0.0.1:{port}")
}

/// A single frame on the bridge socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Request(Request),
    Response {
        #[serde(rename = "ref")]
        reference: String,
        #[serde(default)]
        data: Value,
    },
    Error {
        #[serde(rename = "ref")]
        reference: String,
        #[serde(default)]
        message: String,
    },
}

impl Message {
    pub fn response(reference: impl Into<String>, data: Value) -> Self {
        Self::Response {
            reference: reference.into(),
            data,
        }
    }

    pub fn error(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Correlation id carried by the frame.
    pub fn reference(&self) -> &str {
        match self {
            Self::Request(request) => &request.reference,
            Self::Response { reference, .. } | Self::Error { reference, .. } => reference,
        }
    }
}

/// A request envelope: correlation id plus the operation and its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(flatten)]
    pub operation: Operation,
}

/// The closed set of operations the server understands.
///
/// Lookup fields are optional on the wire so that a request missing them
/// still reaches its handler and gets a descriptive error reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "operation",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Operation {
    GetConfig {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config_path: Option<String>,
    },
    GetBpmnFile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bpmn_key: Option<String>,
    },
    OpenBpmnFile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bpmn_key: Option<String>,
    },
}

impl Operation {
    pub const NAMES: [&'static str; 3] = ["getConfig", "getBpmnFile", "openBpmnFile"];

    pub fn get_config(config_path: impl Into<String>) -> Self {
        Self::GetConfig {
            config_path: Some(config_path.into()),
        }
    }

    pub fn get_bpmn_file(config_path: impl Into<String>, bpmn_key: impl Into<String>) -> Self {
        Self::GetBpmnFile {
            config_path: Some(config_path.into()),
            bpmn_key: Some(bpmn_key.into()),
        }
    }

    pub fn open_bpmn_file(config_path: impl Into<String>, bpmn_key: impl Into<String>) -> Self {
        Self::OpenBpmnFile {
            config_path: Some(config_path.into()),
            bpmn_key: Some(bpmn_key.into()),
        }
    }

    /// Wire name of the operation.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetConfig { .. } => "getConfig",
            Self::GetBpmnFile { .. } => "getBpmnFile",
            Self::OpenBpmnFile { .. } => "openBpmnFile",
        }
    }

    /// Prefix for correlation ids issued for this operation.
    pub const fn ref_prefix(&self) -> &'static str {
        match self {
            Self::GetConfig { .. } => "config",
            Self::GetBpmnFile { .. } => "bpmn",
            Self::OpenBpmnFile { .. } => "open",
        }
    }

    pub fn is_known(name: &str) -> bool {
        Self::NAMES.contains(&name)
    }
}

/// `data` of a `getConfig` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub config: Value,
}

/// `data` of a `getBpmnFile` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BpmnFileResponse {
    pub bpmn_content: String,
    pub file_path: String,
}

/// `data` of an `openBpmnFile` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenBpmnFileResponse {
    pub success: bool,
    pub file_path: String,
    pub message: String,
}
