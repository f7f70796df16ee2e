//! Project config loading and process-key resolution.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tokio::fs;

use super::HandlerError;

/// Subdirectory of a process folder holding its diagrams.
const DIAGRAMS_DIR: &str = "diagrams";
const BPMN_EXTENSION: &str = "bpmn";

/// The slice of the project config the resolver reads. Everything else in
/// the document is passed through untouched by `getConfig`.
///
/// The mappings stay untyped: only the entry being looked up has to be a
/// path, so one odd entry does not break every other key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Process key -> process folder. The diagram lives at
    /// `<folder>/diagrams/<key>.bpmn`.
    #[serde(default)]
    pub processes: Option<Value>,
    /// Process key -> diagram file.
    #[serde(default)]
    pub bpmn_files: Option<Value>,
    #[serde(default)]
    pub base_path: Option<Value>,
}

/// A non-empty string entry for `key`, if the mapping has one.
fn entry<'a>(mapping: Option<&'a Value>, key: &str) -> Option<&'a str> {
    mapping
        .and_then(|m| m.get(key))
        .and_then(Value::as_str)
        .filter(|path| !path.is_empty())
}

/// Read and parse the config document at `path`.
pub async fn load_document(path: &Path) -> Result<Value, HandlerError> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Err(HandlerError::ConfigNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| HandlerError::ConfigUnreadable(e.to_string()))?;

    serde_json::from_str(&content).map_err(|e| HandlerError::ConfigUnreadable(e.to_string()))
}

impl ProjectConfig {
    pub fn from_document(document: Value) -> Result<Self, HandlerError> {
        serde_json::from_value(document).map_err(|e| HandlerError::ConfigUnreadable(e.to_string()))
    }

    pub async fn load(path: &Path) -> Result<Self, HandlerError> {
        Self::from_document(load_document(path).await?)
    }

    /// Directory that mapped paths are relative to.
    fn base_dir(&self, config_path: &Path) -> PathBuf {
        let config_dir = match config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        self.base_path
            .as_ref()
            .and_then(Value::as_str)
            .filter(|base| !base.is_empty())
            .map_or_else(|| config_dir.to_path_buf(), |base| config_dir.join(base))
    }

    /// Candidate diagram path for `key`. Does not touch the filesystem.
    pub fn resolve(&self, config_path: &Path, key: &str) -> Result<PathBuf, HandlerError> {
        if self.processes.is_none() && self.bpmn_files.is_none() {
            return Err(HandlerError::NoProcesses);
        }

        let base = self.base_dir(config_path);

        if let Some(folder) = entry(self.processes.as_ref(), key) {
            let file_name = format!("{key}.{BPMN_EXTENSION}");
            return Ok(base.join(folder).join(DIAGRAMS_DIR).join(file_name));
        }

        if let Some(file) = entry(self.bpmn_files.as_ref(), key) {
            return Ok(base.join(file));
        }

        Err(HandlerError::ProcessNotFound(key.to_string()))
    }

    /// Resolve `key` and require the diagram to exist on disk.
    pub async fn locate(&self, config_path: &Path, key: &str) -> Result<PathBuf, HandlerError> {
        let path = self.resolve(config_path, key)?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            Ok(path)
        } else {
            Err(HandlerError::DiagramNotFound(path))
        }
    }
}
