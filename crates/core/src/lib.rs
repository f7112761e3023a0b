//! folkadb Core - Device session and shared types
//!
//! This crate tracks the devices visible in bridge and bootloader mode,
//! keeps the operator's selection stable across refreshes and switches modes
//! automatically as devices come and go.

pub mod config;
pub mod error;
pub mod events;
pub mod monitor;
pub mod session;

pub use config::AppConfig;
pub use error::{Result, ShellError};
pub use events::RefreshNotifier;
pub use monitor::{Monitor, TickOutcome, DEFAULT_POLL_INTERVAL};
pub use session::{DeviceCounts, Session, SessionSnapshot};

/// folkadb version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "folkadb";
