//! Bootloader mode commands (fastboot)

use std::path::Path;
use tracing::info;

use folkadb_core::{Result, ShellError};
use folkadb_device_bridge::fastboot::{
    erase_args, flash_args, format_args, lock_args, unlock_args, wipe_args,
};
use folkadb_device_bridge::{Device, DeviceMode, ProcessRunner, Slot};

use super::{report, Operator, Shell};
use crate::router::{split_args, Action};

/// A destructive fastboot call waiting for confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// fastboot arguments, without the `-s <serial>` prefix
    pub args: Vec<String>,
    pub warning: String,
    pub progress: String,
    pub done: String,
}

impl Plan {
    fn new(
        args: Vec<String>,
        warning: impl Into<String>,
        progress: impl Into<String>,
        done: impl Into<String>,
    ) -> Self {
        Self {
            args,
            warning: warning.into(),
            progress: progress.into(),
            done: done.into(),
        }
    }

    /// Warning block shown before asking
    pub fn render(&self, serial: &str) -> String {
        format!(
            "WARNING: {}\nDevice:  {}\nCommand: fastboot -s {} {}",
            self.warning,
            serial,
            serial,
            self.args.join(" ")
        )
    }
}

/// Validate a destructive command and build its plan; nothing runs here
pub(super) fn plan(action: Action, args: &str) -> Result<Plan> {
    let parts = split_args(args);

    match action {
        Action::Flash => {
            let [partition, image] = parts.as_slice() else {
                return Err(ShellError::usage("flash <partition> <image_file>"));
            };
            let image = Path::new(image);
            if !image.is_file() {
                return Err(ShellError::FileNotFound(image.display().to_string()));
            }
            Ok(Plan::new(
                flash_args(partition, image),
                format!(
                    "Flashing '{}' will overwrite the {} partition.",
                    image.display(),
                    partition
                ),
                format!("Flashing {} partition...", partition),
                "Partition flashed successfully.",
            ))
        }
        Action::Erase => {
            let [partition] = parts.as_slice() else {
                return Err(ShellError::usage("erase <partition>"));
            };
            Ok(Plan::new(
                erase_args(partition),
                format!("This will ERASE the {} partition. Data on it cannot be recovered.", partition),
                format!("Erasing {} partition...", partition),
                "Partition erased successfully.",
            ))
        }
        Action::Format => {
            let [partition, fs_type] = parts.as_slice() else {
                return Err(ShellError::usage("format <partition> <filesystem>"));
            };
            Ok(Plan::new(
                format_args(partition, fs_type),
                format!("This will FORMAT the {} partition as {}.", partition, fs_type),
                format!("Formatting {} partition...", partition),
                "Partition formatted successfully.",
            ))
        }
        Action::Unlock => Ok(Plan::new(
            unlock_args(),
            "Unlocking the bootloader will ERASE ALL DATA and may void your warranty.",
            "Unlocking bootloader...",
            "Unlock command sent. Confirm on the device if prompted.",
        )),
        Action::Lock => Ok(Plan::new(
            lock_args(),
            "Locking the bootloader will ERASE ALL DATA. Running a modified system may leave the device unbootable.",
            "Locking bootloader...",
            "Lock command sent. Confirm on the device if prompted.",
        )),
        Action::Wipe => {
            let [partition] = parts.as_slice() else {
                return Err(ShellError::usage("wipe <partition>"));
            };
            Ok(Plan::new(
                wipe_args(partition),
                format!("This will WIPE the {} partition. All data on it will be lost.", partition),
                format!("Wiping {} partition...", partition),
                "Wipe completed successfully.",
            ))
        }
        other => Err(ShellError::UnknownCommand(
            format!("{:?}", other).to_lowercase(),
        )),
    }
}

impl<R: ProcessRunner, O: Operator> Shell<R, O> {
    pub(super) async fn run_bootloader(&self, action: Action, args: &str, device: &Device) -> Result<()> {
        let fastboot = self.session.fastboot();
        let serial = device.serial.as_str();

        match action {
            Action::Info => {
                println!("Fetching bootloader information for {}...", serial);
                report(fastboot.getvar(serial, "all").await?)?;
            }
            Action::Getvar => {
                self.session.set_active_mode(DeviceMode::Bootloader);
                report(fastboot.getvar(serial, args.trim()).await?)?;
            }
            Action::Oem => {
                if args.trim().is_empty() {
                    return Err(ShellError::usage("oem <command>"));
                }
                self.session.set_active_mode(DeviceMode::Bootloader);
                report(fastboot.oem(serial, args).await?)?;
            }
            Action::Activate => {
                let slot = Slot::parse(args).ok_or_else(|| ShellError::usage("activate <a|b>"))?;
                self.session.set_active_mode(DeviceMode::Bootloader);
                println!("Setting active slot to {}...", slot.as_str());
                report(fastboot.set_active(serial, slot).await?)?;
                println!("Active slot set to {}.", slot.as_str());
            }
            other => {
                return Err(ShellError::UnknownCommand(
                    format!("{:?}", other).to_lowercase(),
                ))
            }
        }
        Ok(())
    }

    /// Reboot from bootloader mode, picking the first device when none is selected
    pub(super) async fn fastboot_reboot(&self, args: &str) -> Result<()> {
        let device = match self.session.selected(DeviceMode::Bootloader) {
            Some(device) => device,
            None => {
                if self.session.refresh(DeviceMode::Bootloader).await == 0 {
                    return Err(ShellError::NoDevice);
                }
                let device = self.session.select(DeviceMode::Bootloader, 0).await?;
                info!("Auto-selected {} for reboot", device.serial);
                device
            }
        };

        self.session.set_active_mode(DeviceMode::Bootloader);

        let mode = match args.trim() {
            "" => "system",
            mode => mode,
        };
        println!("Rebooting {} to {}...", device.serial, mode);
        report(self.session.fastboot().reboot(&device.serial, mode).await?)?;
        println!("Device is rebooting...");
        Ok(())
    }
}
