//! folkadb - interactive adb and fastboot shell
//!
//! A console for Android devices that follows them between adb (bridge) mode
//! and fastboot (bootloader) mode.
//!
//! ## Architecture
//!
//! folkadb is organized into specialized crates:
//!
//! - `folkadb-device-bridge`: adb/fastboot process runner and device parsing
//! - `folkadb-core`: device session, mode monitor, configuration and errors
//!
//! This crate adds the command router, the command handlers, the root module
//! installer, batch mode and the interactive console.

#![warn(clippy::all)]

pub mod batch;
pub mod cli;
pub mod commands;
pub mod console;
pub mod modules;
pub mod router;

// Re-export main components for library usage
pub use folkadb_core as core;
pub use folkadb_device_bridge as bridge;

/// Prelude module for convenient imports
pub mod prelude {
    pub use folkadb_core::{AppConfig, Monitor, RefreshNotifier, Session, ShellError};
    pub use folkadb_device_bridge::{AdbClient, Device, DeviceMode, FastbootClient, TokioRunner};

    pub use crate::commands::{Operator, Settings, Shell};
    pub use crate::router::{Command, Flow, Router};
}
