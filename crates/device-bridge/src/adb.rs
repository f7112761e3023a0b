//! ADB (Android Debug Bridge) Client
//!
//! Communicates with devices in bridge mode via the adb executable.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::device::{parse_bridge_devices, Device};
use crate::runner::{ProcessOutput, ProcessRunner, RunnerError};

/// ADB Client
pub struct AdbClient<R: ProcessRunner> {
    runner: Arc<R>,
    adb_path: PathBuf,
}

impl<R: ProcessRunner> Clone for AdbClient<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            adb_path: self.adb_path.clone(),
        }
    }
}

impl<R: ProcessRunner> AdbClient<R> {
    /// Create a new ADB client
    pub fn new(runner: Arc<R>, adb_path: PathBuf) -> Self {
        Self { runner, adb_path }
    }

    /// Get the ADB executable path
    pub fn path(&self) -> &Path {
        &self.adb_path
    }

    /// Run an ADB command
    pub async fn run(&self, args: &[String]) -> Result<ProcessOutput, RunnerError> {
        debug!("adb {:?}", args);
        self.runner.run(&self.adb_path, args).await
    }

    /// Run an ADB command for a specific device
    pub async fn run_for_device(
        &self,
        serial: &str,
        args: &[&str],
    ) -> Result<ProcessOutput, RunnerError> {
        self.run(&device_args(serial, args)).await
    }

    /// List connected devices.
    ///
    /// A non-zero exit is reported as `RunnerError::Failed`.
    pub async fn list_devices(&self) -> Result<Vec<Device>, RunnerError> {
        let output = self
            .run(&["devices".to_string(), "-l".to_string()])
            .await?
            .check(&self.adb_path)?;
        Ok(parse_bridge_devices(&output.stdout_text()))
    }

    /// Read a system property, `None` when the call fails or the value is empty
    pub async fn get_prop(&self, serial: &str, name: &str) -> Option<String> {
        let output = self
            .run_for_device(serial, &["shell", "getprop", name])
            .await
            .ok()?;
        if !output.success() {
            return None;
        }
        let value = output.stdout_text().trim().to_string();
        (!value.is_empty()).then_some(value)
    }

    /// Run a single shell command on the device
    pub async fn shell(&self, serial: &str, command: &str) -> Result<ProcessOutput, RunnerError> {
        self.run_for_device(serial, &["shell", command]).await
    }

    /// Run a shell command through `su -c`
    pub async fn sudo(&self, serial: &str, command: &str) -> Result<ProcessOutput, RunnerError> {
        self.run_for_device(serial, &["shell", "su", "-c", command]).await
    }

    /// Open an interactive shell attached to the terminal, returning its exit code.
    ///
    /// With `startup`, a pty is requested and the command runs in place of the login shell.
    pub async fn attach_shell(&self, serial: &str, startup: Option<&str>) -> Result<i32, RunnerError> {
        let args = match startup {
            Some(command) => device_args(serial, &["shell", "-t", command]),
            None => device_args(serial, &["shell"]),
        };
        debug!("adb {:?} (interactive)", args);
        self.runner.run_attached(&self.adb_path, &args).await
    }

    /// Push a local file to the device
    pub async fn push(
        &self,
        serial: &str,
        local: &Path,
        remote: &str,
    ) -> Result<ProcessOutput, RunnerError> {
        let local = local.to_string_lossy();
        self.run_for_device(serial, &["push", &local, remote]).await
    }

    /// Pull a file from the device
    pub async fn pull(
        &self,
        serial: &str,
        remote: &str,
        local: &Path,
    ) -> Result<ProcessOutput, RunnerError> {
        let local = local.to_string_lossy();
        self.run_for_device(serial, &["pull", remote, &local]).await
    }

    /// Install an APK
    pub async fn install(&self, serial: &str, apk: &Path) -> Result<ProcessOutput, RunnerError> {
        let apk = apk.to_string_lossy();
        self.run_for_device(serial, &["install", &apk]).await
    }

    /// Uninstall a package
    pub async fn uninstall(&self, serial: &str, package: &str) -> Result<ProcessOutput, RunnerError> {
        self.run_for_device(serial, &["uninstall", package]).await
    }

    /// Reboot the device; `system` reboots normally
    pub async fn reboot(&self, serial: &str, mode: &str) -> Result<ProcessOutput, RunnerError> {
        if mode.is_empty() || mode == "system" {
            self.run_for_device(serial, &["reboot"]).await
        } else {
            self.run_for_device(serial, &["reboot", mode]).await
        }
    }

    /// Version banner of the adb executable
    pub async fn version(&self) -> Result<String, RunnerError> {
        let output = self
            .run(&["version".to_string()])
            .await?
            .check(&self.adb_path)?;
        Ok(output
            .stdout_text()
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

/// Prefix an argument list with `-s <serial>`
pub(crate) fn device_args(serial: &str, args: &[&str]) -> Vec<String> {
    let mut full_args = vec!["-s".to_string(), serial.to_string()];
    full_args.extend(args.iter().map(|a| a.to_string()));
    full_args
}
