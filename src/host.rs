//! Capabilities borrowed from the host editor.
//!
//! The editor owns window management, notifications and its plugin
//! lifecycle. The bridge only needs the narrow slices defined here.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::process::Command;

/// Opens diagram files in the host editor, one tab per path.
pub trait FileOpener: Send + Sync {
    fn open_files(&self, paths: &[PathBuf]) -> io::Result<()>;
}

/// Opens files by launching an editor executable with the paths as arguments.
///
/// Desktop modelers forward the paths to the running instance when one is
/// already open.
#[derive(Debug, Clone)]
pub struct CommandOpener {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandOpener {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Extra arguments placed before the file paths.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl FileOpener for CommandOpener {
    fn open_files(&self, paths: &[PathBuf]) -> io::Result<()> {
        tracing::info!(
            "Launching {} for {} file(s)",
            self.program.display(),
            paths.len()
        );
        // The child is reaped by the runtime; the reply does not wait for the editor.
        Command::new(&self.program)
            .args(&self.args)
            .args(paths)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// A toast shown by the host editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub content: String,
    pub duration: Duration,
}

impl Notification {
    pub fn success(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: title.into(),
            content: content.into(),
            duration: Duration::from_millis(3000),
        }
    }

    pub fn error(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: title.into(),
            content: content.into(),
            duration: Duration::from_millis(5000),
        }
    }
}

/// The host editor as seen from the navigator.
pub trait Host {
    fn display_notification(&self, notification: Notification);
}

/// Host that writes notifications to the log, for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHost;

impl Host for LogHost {
    fn display_notification(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error | NotificationKind::Warning => tracing::warn!(
                "[{}] {}: {}",
                notification.kind,
                notification.title,
                notification.content
            ),
            NotificationKind::Info | NotificationKind::Success => tracing::info!(
                "[{}] {}: {}",
                notification.kind,
                notification.title,
                notification.content
            ),
        }
    }
}
