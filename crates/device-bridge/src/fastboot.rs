//! Fastboot Client
//!
//! Communicates with devices in bootloader mode via the fastboot executable.
//! Argument builders are separate from execution so destructive operations can be
//! shown to the operator before they run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::adb::device_args;
use crate::device::{parse_bootloader_devices, Device};
use crate::runner::{ProcessOutput, ProcessRunner, RunnerError};

/// Fastboot Client
pub struct FastbootClient<R: ProcessRunner> {
    runner: Arc<R>,
    fastboot_path: PathBuf,
}

impl<R: ProcessRunner> Clone for FastbootClient<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            fastboot_path: self.fastboot_path.clone(),
        }
    }
}

impl<R: ProcessRunner> FastbootClient<R> {
    pub fn new(runner: Arc<R>, fastboot_path: PathBuf) -> Self {
        Self {
            runner,
            fastboot_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.fastboot_path
    }

    /// Run a fastboot command
    pub async fn run(&self, args: &[String]) -> Result<ProcessOutput, RunnerError> {
        debug!("fastboot {:?}", args);
        self.runner.run(&self.fastboot_path, args).await
    }

    /// Run a prepared argument list against one device
    pub async fn run_for_device(
        &self,
        serial: &str,
        args: &[String],
    ) -> Result<ProcessOutput, RunnerError> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&device_args(serial, &args)).await
    }

    /// List devices in bootloader mode
    pub async fn list_devices(&self) -> Result<Vec<Device>, RunnerError> {
        let output = self
            .run(&["devices".to_string()])
            .await?
            .check(&self.fastboot_path)?;
        Ok(parse_bootloader_devices(&output.stdout_text()))
    }

    /// Query one bootloader variable, or every variable with `all`
    pub async fn getvar(&self, serial: &str, name: &str) -> Result<ProcessOutput, RunnerError> {
        self.run_for_device(serial, &getvar_args(name)).await
    }

    pub async fn reboot(&self, serial: &str, mode: &str) -> Result<ProcessOutput, RunnerError> {
        self.run_for_device(serial, &reboot_args(mode)).await
    }

    pub async fn set_active(&self, serial: &str, slot: Slot) -> Result<ProcessOutput, RunnerError> {
        self.run_for_device(serial, &set_active_args(slot)).await
    }

    pub async fn oem(&self, serial: &str, command: &str) -> Result<ProcessOutput, RunnerError> {
        self.run_for_device(serial, &oem_args(command)).await
    }

    /// Version banner of the fastboot executable
    pub async fn version(&self) -> Result<String, RunnerError> {
        let output = self
            .run(&["--version".to_string()])
            .await?
            .check(&self.fastboot_path)?;
        Ok(output
            .stdout_text()
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

/// A/B slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    /// Parse `a`/`b`, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Some(Slot::A),
            "b" => Some(Slot::B),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::A => "a",
            Slot::B => "b",
        }
    }
}

fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

pub fn flash_args(partition: &str, image: &Path) -> Vec<String> {
    vec![
        "flash".to_string(),
        partition.to_string(),
        image.to_string_lossy().into_owned(),
    ]
}

pub fn erase_args(partition: &str) -> Vec<String> {
    to_args(&["erase", partition])
}

pub fn format_args(partition: &str, fs_type: &str) -> Vec<String> {
    vec![format!("format:{fs_type}"), partition.to_string()]
}

pub fn unlock_args() -> Vec<String> {
    to_args(&["flashing", "unlock"])
}

pub fn lock_args() -> Vec<String> {
    to_args(&["flashing", "lock"])
}

/// `-w` for the data partition, a plain erase for anything else
pub fn wipe_args(partition: &str) -> Vec<String> {
    match partition {
        "data" | "userdata" => to_args(&["-w"]),
        other => erase_args(other),
    }
}

/// Each whitespace-separated token becomes its own argument
pub fn oem_args(command: &str) -> Vec<String> {
    std::iter::once("oem")
        .chain(command.split_whitespace())
        .map(str::to_string)
        .collect()
}

pub fn getvar_args(name: &str) -> Vec<String> {
    let name = if name.is_empty() { "all" } else { name };
    to_args(&["getvar", name])
}

/// `reboot` for system, `reboot-<mode>` for anything else
pub fn reboot_args(mode: &str) -> Vec<String> {
    if mode.is_empty() || mode == "system" {
        to_args(&["reboot"])
    } else {
        vec![format!("reboot-{mode}")]
    }
}

pub fn set_active_args(slot: Slot) -> Vec<String> {
    to_args(&["set_active", slot.as_str()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRunner;

    #[test]
    fn test_argument_builders() {
        assert_eq!(flash_args("boot", Path::new("boot.img")), ["flash", "boot", "boot.img"]);
        assert_eq!(format_args("userdata", "ext4"), ["format:ext4", "userdata"]);
        assert_eq!(wipe_args("userdata"), ["-w"]);
        assert_eq!(wipe_args("cache"), ["erase", "cache"]);
        assert_eq!(oem_args("device-info  extra"), ["oem", "device-info", "extra"]);
        assert_eq!(getvar_args(""), ["getvar", "all"]);
        assert_eq!(reboot_args("system"), ["reboot"]);
        assert_eq!(reboot_args("bootloader"), ["reboot-bootloader"]);
        assert_eq!(unlock_args(), ["flashing", "unlock"]);
    }

    #[test]
    fn test_slot_parse() {
        assert_eq!(Slot::parse("A"), Some(Slot::A));
        assert_eq!(Slot::parse("b"), Some(Slot::B));
        assert_eq!(Slot::parse("c"), None);
        assert_eq!(Slot::parse(""), None);
    }

    #[tokio::test]
    async fn test_list_and_scoped_run() {
        let fake = Arc::new(FakeRunner::new());
        fake.set("fastboot", &["devices"], "XYZ\tfastboot\n");
        let fastboot = FastbootClient::new(Arc::clone(&fake), PathBuf::from("/sdk/fastboot"));

        let devices = fastboot.list_devices().await.unwrap();
        assert_eq!(devices[0].serial, "XYZ");

        fastboot.set_active("XYZ", Slot::B).await.unwrap();
        assert_eq!(fake.calls()[1].line(), "-s XYZ set_active b");
    }
}
