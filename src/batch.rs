//! Batch mode
//!
//! Installs or pushes files given on the command line, then exits.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use folkadb_core::{Result, ShellError};
use folkadb_device_bridge::{Device, DeviceMode, ProcessRunner};

use crate::commands::{remote_join, report, Operator, Shell};
use crate::modules::is_module_zip;

/// Seconds to wait for a bridge device before giving up
pub const DEVICE_WAIT_SECS: u64 = 10;

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Installed,
    Pushed(String),
    ModuleInstalled(String),
    Failed(String),
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<(PathBuf, FileOutcome)>,
}

impl BatchReport {
    pub fn failures(&self) -> usize {
        self.files
            .iter()
            .filter(|(_, outcome)| matches!(outcome, FileOutcome::Failed(_)))
            .count()
    }

    pub fn print(&self) {
        println!("\n----------------------------------------");
        println!("Batch summary:");
        for (path, outcome) in &self.files {
            let name = file_name(path);
            match outcome {
                FileOutcome::Installed => println!("  [ok]     {} installed", name),
                FileOutcome::Pushed(remote) => println!("  [ok]     {} -> {}", name, remote),
                FileOutcome::ModuleInstalled(remote) => {
                    println!("  [ok]     {} -> {} (module installed)", name, remote)
                }
                FileOutcome::Failed(reason) => println!("  [failed] {}: {}", name, reason),
            }
        }
        println!(
            "{} file(s), {} failed",
            self.files.len(),
            self.failures()
        );
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Process `files` against the first bridge device.
///
/// Fails with `NoDevice` when no bridge device shows up in time or the
/// attached device sits in the bootloader.
pub async fn run<R: ProcessRunner, O: Operator>(
    shell: &Shell<R, O>,
    files: &[PathBuf],
    cancel: &CancellationToken,
) -> Result<BatchReport> {
    println!("Detected {} file(s) via command line arguments.", files.len());
    let device = connect(shell, cancel).await?;
    info!("Batch target: {}", device.serial);

    println!("Starting batch processing...");
    let mut report = BatchReport::default();
    for path in files {
        println!("\n----------------------------------------");
        println!("Processing: {}", file_name(path));

        let outcome = match process_file(shell, path, &device).await {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("{}", e.user_message());
                FileOutcome::Failed(e.to_string())
            }
        };
        report.files.push((path.clone(), outcome));
    }
    Ok(report)
}

async fn connect<R: ProcessRunner, O: Operator>(
    shell: &Shell<R, O>,
    cancel: &CancellationToken,
) -> Result<Device> {
    let session = shell.session();

    let mut bridge = session.refresh(DeviceMode::Bridge).await;
    if bridge == 0 && session.refresh(DeviceMode::Bootloader).await > 0 {
        eprintln!("Device is in fastboot mode. Push and install need adb mode.");
        return Err(ShellError::NoDevice);
    }
    if bridge == 0 {
        println!("Waiting for device connection ({}s timeout)...", DEVICE_WAIT_SECS);
        bridge = session
            .wait_for_device(DeviceMode::Bridge, DEVICE_WAIT_SECS, cancel)
            .await;
    }
    if bridge == 0 {
        eprintln!("No adb device found. Connect a device and enable USB debugging.");
        return Err(ShellError::NoDevice);
    }

    match session.selected(DeviceMode::Bridge) {
        Some(device) => Ok(device),
        None => session.select(DeviceMode::Bridge, 0).await,
    }
}

async fn process_file<R: ProcessRunner, O: Operator>(
    shell: &Shell<R, O>,
    path: &Path,
    device: &Device,
) -> Result<FileOutcome> {
    if !path.is_file() {
        return Err(ShellError::FileNotFound(path.display().to_string()));
    }
    let adb = shell.session().adb();

    if has_extension(path, "apk") && shell.operator().confirm("File is an APK. Install it? (y/n): ") {
        println!("Installing: {}", path.display());
        report(adb.install(&device.serial, path).await?)?;
        return Ok(FileOutcome::Installed);
    }

    let remote = remote_join(&shell.settings().default_remote_dir, &file_name(path));
    println!("Pushing to: {}", remote);
    report(adb.push(&device.serial, path, &remote).await?)?;

    if has_extension(path, "zip") && is_module_zip(path).await {
        println!("Detected Magisk/KSU/APatch module.");
        match shell.install_pushed_module(&remote, device).await {
            Ok(()) => return Ok(FileOutcome::ModuleInstalled(remote)),
            Err(ShellError::RootUnavailable) => {
                warn!("no root solution on {}", device.serial);
                println!("No supported root solution detected. Module pushed but not installed.");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(FileOutcome::Pushed(remote))
}
