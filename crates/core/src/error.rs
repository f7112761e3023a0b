//! Error types for folkadb
//!
//! Centralized error handling using thiserror.

use folkadb_device_bridge::RunnerError;
use thiserror::Error;

/// Main error type for shell operations
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("no device selected; run 'devices' then 'select <n>'")]
    NoDevice,

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("could not start {program}: {reason}")]
    ProcessSpawn { program: String, reason: String },

    #[error("command exited with code {exit_code}")]
    ProcessFailed { exit_code: i32 },

    #[error("usage: {usage}")]
    InvalidArguments { usage: String },

    #[error("unknown command '{0}'; type 'help'")]
    UnknownCommand(String),

    #[error("{0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("download failed: {0}")]
    Download(String),

    #[error("no supported root solution (Magisk/KernelSU/APatch) detected on device")]
    RootUnavailable,

    #[error("not available in {0} mode")]
    WrongMode(String),
}

/// Result type alias for shell operations
pub type Result<T> = std::result::Result<T, ShellError>;

impl ShellError {
    pub fn usage(usage: impl Into<String>) -> Self {
        ShellError::InvalidArguments {
            usage: usage.into(),
        }
    }

    /// Stable short label for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ShellError::NoDevice => "no-device",
            ShellError::DeviceNotFound(_) => "device-not-found",
            ShellError::FileNotFound(_) => "file-not-found",
            ShellError::ProcessSpawn { .. } => "spawn",
            ShellError::ProcessFailed { .. } => "exit-status",
            ShellError::InvalidArguments { .. } => "usage",
            ShellError::UnknownCommand(_) => "unknown-command",
            ShellError::Cancelled(_) => "cancelled",
            ShellError::Io(_) => "io",
            ShellError::Config(_) | ShellError::TomlParse(_) | ShellError::TomlSerialize(_) => {
                "config"
            }
            ShellError::Download(_) => "download",
            ShellError::RootUnavailable => "no-root",
            ShellError::WrongMode(_) => "wrong-mode",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ShellError::Cancelled(_))
    }

    /// One console line for this error
    pub fn user_message(&self) -> String {
        match self {
            ShellError::Cancelled(msg) => format!("cancelled: {}", msg),
            other => format!("error[{}]: {}", other.kind(), other),
        }
    }
}

impl From<RunnerError> for ShellError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Spawn { program, source } => ShellError::ProcessSpawn {
                program: program.display().to_string(),
                reason: source.to_string(),
            },
            RunnerError::Failed { exit_code, .. } => ShellError::ProcessFailed { exit_code },
        }
    }
}
