//! Android Device Bridge
//!
//! Drives the adb and fastboot executables and parses what they report.

pub mod adb;
pub mod device;
pub mod fastboot;
pub mod locate;
pub mod runner;

#[cfg(any(test, feature = "test-helpers"))]
pub mod fake;

pub use adb::AdbClient;
pub use device::{Device, DeviceMode};
pub use fastboot::{FastbootClient, Slot};
pub use locate::{locate, Tool};
pub use runner::{ProcessOutput, ProcessRunner, RunnerError, TokioRunner};

#[cfg(any(test, feature = "test-helpers"))]
pub use fake::{FakeRunner, Invocation};

/// Maximum number of devices kept per mode
pub const MAX_DEVICES: usize = 16;

/// Default push destination on the device
pub const DEFAULT_REMOTE_DIR: &str = "/storage/emulated/0/";
