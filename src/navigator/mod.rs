//! Editor-side controller: reacts to diagram events and drives the bridge.
//!
//! The host renders the settings panel from [`NavigatorState`] and forwards
//! element events; everything else happens here.

mod settings;

use serde::{Deserialize, Serialize};
use serde_json::Value;
pub use settings::{FileSettingsStore, Settings, SettingsPatch, SettingsStore};

use crate::{
    client::BridgeClient,
    host::{Host, Notification},
    protocol::{BpmnFileResponse, DEFAULT_CONFIG_PATH},
};

/// Element type of a call activity in bpmn-js.
pub const CALL_ACTIVITY: &str = "bpmn:CallActivity";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementEventKind {
    #[serde(rename = "element.click")]
    Click,
    #[serde(rename = "element.dblclick")]
    DoubleClick,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessObject {
    #[serde(default)]
    pub called_element: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub business_object: BusinessObject,
}

impl Element {
    /// Process key referenced by a call activity, if this is one.
    pub fn called_process(&self) -> Option<&str> {
        if self.element_type != CALL_ACTIVITY {
            return None;
        }
        self.business_object
            .called_element
            .as_deref()
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementEvent {
    pub kind: ElementEventKind,
    pub element: Element,
}

/// What to do with a resolved call activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpenMode {
    /// Ask the server to open the diagram in the host (`openBpmnFile`).
    #[default]
    Open,
    /// Fetch the diagram content and hand it back (`getBpmnFile`).
    Fetch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Ignored,
    Opened { file_path: String },
    Fetched(BpmnFileResponse),
    Failed(String),
}

/// Everything the settings panel renders.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigatorState {
    pub enabled: bool,
    pub config_path: String,
    pub config_open: bool,
    pub config: Option<Value>,
    pub error: Option<String>,
}

impl Default for NavigatorState {
    fn default() -> Self {
        Self {
            enabled: false,
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            config_open: false,
            config: None,
            error: None,
        }
    }
}

pub struct Navigator<H, S> {
    client: BridgeClient,
    host: H,
    store: S,
    state: NavigatorState,
    open_mode: OpenMode,
    open_on_click: bool,
}

impl<H: Host, S: SettingsStore> Navigator<H, S> {
    pub fn new(client: BridgeClient, host: H, store: S) -> Self {
        Self {
            client,
            host,
            store,
            state: NavigatorState::default(),
            open_mode: OpenMode::default(),
            open_on_click: false,
        }
    }

    #[must_use]
    pub const fn with_open_mode(mut self, open_mode: OpenMode) -> Self {
        self.open_mode = open_mode;
        self
    }

    /// Also navigate on single clicks, not only double clicks.
    #[must_use]
    pub const fn with_open_on_click(mut self, open_on_click: bool) -> Self {
        self.open_on_click = open_on_click;
        self
    }

    pub const fn state(&self) -> &NavigatorState {
        &self.state
    }

    pub const fn host(&self) -> &H {
        &self.host
    }

    pub fn set_config_path(&mut self, config_path: impl Into<String>) {
        self.state.config_path = config_path.into();
    }

    fn settings(&self) -> Settings {
        Settings {
            config_path: self.state.config_path.clone(),
            enabled: self.state.enabled,
        }
    }

    fn apply_settings(&mut self, settings: Settings) {
        self.state.config_path = settings.config_path;
        self.state.enabled = settings.enabled;
    }

    /// Restore persisted settings. Unreadable settings leave the defaults.
    pub fn mount(&mut self) {
        match self.store.load() {
            Ok(Some(settings)) => self.apply_settings(settings),
            Ok(None) => tracing::debug!("No saved settings, using defaults"),
            Err(e) => tracing::warn!("Failed to load settings: {e}"),
        }
    }

    /// Menu action: connect, load the config and show the panel.
    pub async fn open_panel(&mut self) {
        match self.client.connect().await {
            Ok(()) => {
                self.load_config().await;
            }
            Err(e) => {
                tracing::error!("Bridge connection failed: {e}");
                self.state.config = None;
                self.state.error = Some(e.to_string());
            }
        }
        self.state.config_open = true;
    }

    /// Fetch the config at the current path. Returns whether it loaded.
    pub async fn load_config(&mut self) -> bool {
        match self.client.get_config(self.state.config_path.clone()).await {
            Ok(response) => {
                self.state.config = Some(response.config);
                self.state.error = None;
                true
            }
            Err(e) => {
                tracing::error!("Error loading config: {e}");
                self.state.config = None;
                self.state.error = Some(e.to_string());
                false
            }
        }
    }

    /// React to a click on a diagram element.
    pub async fn handle_element_event(&mut self, event: &ElementEvent) -> NavigationOutcome {
        if event.kind == ElementEventKind::Click && !self.open_on_click {
            return NavigationOutcome::Ignored;
        }
        let Some(key) = event.element.called_process() else {
            return NavigationOutcome::Ignored;
        };
        if self.state.config.is_none() {
            tracing::debug!("Call activity {} clicked before config loaded", event.element.id);
            return NavigationOutcome::Ignored;
        }

        tracing::info!("Navigating from {} to process {key}", event.element.id);
        let config_path = self.state.config_path.clone();
        let result = match self.open_mode {
            OpenMode::Open => self
                .client
                .open_bpmn_file(config_path, key)
                .await
                .map(|reply| NavigationOutcome::Opened {
                    file_path: reply.file_path,
                }),
            OpenMode::Fetch => self
                .client
                .get_bpmn_file(config_path, key)
                .await
                .map(NavigationOutcome::Fetched),
        };

        result.unwrap_or_else(|e| {
            let message = e.to_string();
            self.host.display_notification(Notification::error(
                "Error opening process",
                format!("Could not open process \"{key}\": {message}"),
            ));
            NavigationOutcome::Failed(message)
        })
    }

    /// Persist the current settings and tell the user how it went.
    pub fn save_settings(&mut self) -> bool {
        match self.store.save(&self.settings()) {
            Ok(()) => {
                self.host.display_notification(Notification::success(
                    "Settings Saved",
                    "Config path has been saved successfully",
                ));
                true
            }
            Err(e) => {
                tracing::error!("Error saving settings: {e}");
                self.host.display_notification(Notification::error(
                    "Error saving settings",
                    "Could not save settings",
                ));
                false
            }
        }
    }

    /// Close the panel, applying and persisting `patch` when given.
    pub fn close_panel(&mut self, patch: Option<SettingsPatch>) {
        self.state.config_open = false;
        let Some(patch) = patch else {
            return;
        };
        let settings = self.settings().apply(patch);
        if let Err(e) = self.store.save(&settings) {
            tracing::error!("Error saving settings: {e}");
        }
        self.apply_settings(settings);
    }

    /// `(key, path)` pairs from the loaded config's `processes` mapping.
    pub fn available_processes(&self) -> Vec<(String, String)> {
        self.state
            .config
            .as_ref()
            .and_then(|config| config.get("processes"))
            .and_then(Value::as_object)
            .map(|processes| {
                processes
                    .iter()
                    .map(|(key, path)| {
                        let path = path
                            .as_str()
                            .map_or_else(|| path.to_string(), str::to_string);
                        (key.clone(), path)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
