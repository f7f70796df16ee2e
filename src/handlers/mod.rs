//! Server-side operation handlers.
//!
//! Each handler turns one [`Operation`] into the `data` of a `response`
//! frame, or a [`HandlerError`] whose text becomes the `message` of an
//! `error` frame. Nothing here panics or escapes the request.

mod project;

use std::{
    error::Error as StdError,
    fmt,
    path::{Path, PathBuf},
    slice,
    sync::Arc,
};

pub use project::{load_document, ProjectConfig};
use serde::Serialize;
use serde_json::Value;
use tokio::fs;

use crate::{
    host::FileOpener,
    protocol::{
        BpmnFileResponse, ConfigResponse, OpenBpmnFileResponse, Operation, DEFAULT_CONFIG_PATH,
    },
};

/// Resource and protocol failures, rendered into `error` replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    MissingArguments,
    ConfigNotFound(PathBuf),
    ConfigUnreadable(String),
    NoProcesses,
    ProcessNotFound(String),
    DiagramNotFound(PathBuf),
    DiagramUnreadable { path: PathBuf, reason: String },
    HostUnavailable,
    OpenFailed { key: String, reason: String },
    Encode(String),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArguments => write!(f, "configPath and bpmnKey are required"),
            Self::ConfigNotFound(path) => write!(f, "Config file not found: {}", path.display()),
            Self::ConfigUnreadable(reason) => write!(f, "Error reading config: {reason}"),
            Self::NoProcesses => write!(f, "No processes found in config"),
            Self::ProcessNotFound(key) => write!(f, "Process not found: {key}"),
            Self::DiagramNotFound(path) => write!(f, "BPMN file not found: {}", path.display()),
            Self::DiagramUnreadable { path, reason } => {
                write!(f, "Error reading BPMN file {}: {reason}", path.display())
            }
            Self::HostUnavailable => write!(f, "Host application not available"),
            Self::OpenFailed { key, reason } => {
                write!(f, "Error opening BPMN file for {key}: {reason}")
            }
            Self::Encode(reason) => write!(f, "Error encoding reply: {reason}"),
        }
    }
}

impl StdError for HandlerError {}

/// Shared, read-only state handed to every handler.
#[derive(Clone, Default)]
pub struct HandlerContext {
    opener: Option<Arc<dyn FileOpener>>,
}

impl HandlerContext {
    pub fn new(opener: Option<Arc<dyn FileOpener>>) -> Self {
        Self { opener }
    }

    pub const fn can_open_files(&self) -> bool {
        self.opener.is_some()
    }
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("opener", &self.opener.is_some())
            .finish()
    }
}

/// Run `operation` to completion.
pub async fn handle(operation: Operation, context: &HandlerContext) -> Result<Value, HandlerError> {
    match operation {
        Operation::GetConfig { config_path } => {
            let path = config_path
                .filter(|path| !path.is_empty())
                .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
            encode(&get_config(Path::new(&path)).await?)
        }
        Operation::GetBpmnFile {
            config_path,
            bpmn_key,
        } => {
            let (config_path, key) = required(config_path, bpmn_key)?;
            encode(&get_bpmn_file(Path::new(&config_path), &key).await?)
        }
        Operation::OpenBpmnFile {
            config_path,
            bpmn_key,
        } => {
            let (config_path, key) = required(config_path, bpmn_key)?;
            encode(&open_bpmn_file(context, Path::new(&config_path), &key).await?)
        }
    }
}

pub async fn get_config(config_path: &Path) -> Result<ConfigResponse, HandlerError> {
    let config = load_document(config_path).await?;
    Ok(ConfigResponse { config })
}

pub async fn get_bpmn_file(config_path: &Path, key: &str) -> Result<BpmnFileResponse, HandlerError> {
    let config = ProjectConfig::load(config_path).await?;
    let path = config.locate(config_path, key).await?;

    let bpmn_content =
        fs::read_to_string(&path)
            .await
            .map_err(|e| HandlerError::DiagramUnreadable {
                path: path.clone(),
                reason: e.to_string(),
            })?;

    tracing::info!("Serving {key} from {}", path.display());
    Ok(BpmnFileResponse {
        bpmn_content,
        file_path: path.display().to_string(),
    })
}

pub async fn open_bpmn_file(
    context: &HandlerContext,
    config_path: &Path,
    key: &str,
) -> Result<OpenBpmnFileResponse, HandlerError> {
    let opener = context.opener.as_ref().ok_or(HandlerError::HostUnavailable)?;

    let config = ProjectConfig::load(config_path).await?;
    let path = config.locate(config_path, key).await?;

    opener
        .open_files(slice::from_ref(&path))
        .map_err(|e| HandlerError::OpenFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

    tracing::info!("Opened {key} at {}", path.display());
    Ok(OpenBpmnFileResponse {
        success: true,
        file_path: path.display().to_string(),
        message: format!("Opened {key} in new tab"),
    })
}

fn required(
    config_path: Option<String>,
    bpmn_key: Option<String>,
) -> Result<(String, String), HandlerError> {
    match (config_path, bpmn_key) {
        (Some(path), Some(key)) if !path.is_empty() && !key.is_empty() => Ok((path, key)),
        _ => Err(HandlerError::MissingArguments),
    }
}

fn encode(data: &impl Serialize) -> Result<Value, HandlerError> {
    serde_json::to_value(data).map_err(|e| HandlerError::Encode(e.to_string()))
}
