//! Commands available in every mode

use folkadb_core::{Result, ShellError, APP_NAME, VERSION};
use folkadb_device_bridge::{DeviceMode, ProcessRunner};

use super::{Operator, Shell};
use crate::router::{Flow, Global};

const BRIDGE_HELP: &[(&str, &str)] = &[
    ("devices, dev", "List connected devices"),
    ("select <n|serial>", "Select a device"),
    ("info", "Show details of the selected device"),
    ("reboot [mode]", "Reboot (system, recovery, bootloader, sideload)"),
    ("push <local> [remote]", "Copy a file to the device"),
    ("pull <remote> [local]", "Copy a file from the device"),
    ("ls [path]", "List a directory (default /sdcard)"),
    ("rm <path>", "Remove a file"),
    ("mkdir <path>", "Create a directory"),
    ("shell [cmd]", "Run a command, or open an interactive shell"),
    ("sudo <cmd>", "Run a command as root"),
    ("install <apk>", "Install an APK"),
    ("uninstall <package>", "Remove a package"),
    ("dli <url>", "Download and install a Magisk/KernelSU/APatch module"),
    ("shizuku", "Start the Shizuku service"),
];

const BOOTLOADER_HELP: &[(&str, &str)] = &[
    ("devices, dev", "List devices in fastboot mode"),
    ("select <n|serial>", "Select a device"),
    ("info", "Show all bootloader variables"),
    ("reboot [mode]", "Reboot (system, bootloader, recovery, fastboot)"),
    ("flash <partition> <image>", "Flash an image (asks first)"),
    ("erase <partition>", "Erase a partition (asks first)"),
    ("format <partition> <fs>", "Format a partition (asks first)"),
    ("wipe <partition>", "Wipe a partition (asks first)"),
    ("unlock", "Unlock the bootloader (asks first)"),
    ("lock", "Lock the bootloader (asks first)"),
    ("oem <cmd...>", "Run an OEM command"),
    ("getvar [name]", "Read a bootloader variable (default all)"),
    ("activate <a|b>", "Set the active slot"),
];

const GLOBAL_HELP: &[(&str, &str)] = &[
    ("adb <cmd> / fastboot <cmd>", "Run a command from the named table"),
    ("<dropped .apk paths>", "Install each APK (adb mode)"),
    ("help, ?", "Show this help"),
    ("version", "Show tool versions"),
    ("cls, clear", "Clear the screen"),
    ("exit, quit", "Leave folkadb"),
];

/// Help text with the active mode's commands first
pub fn help_text(active: DeviceMode) -> String {
    let (first, second) = match active {
        DeviceMode::Bridge => (("ADB", BRIDGE_HELP), ("FASTBOOT", BOOTLOADER_HELP)),
        DeviceMode::Bootloader => (("FASTBOOT", BOOTLOADER_HELP), ("ADB", BRIDGE_HELP)),
    };

    let mut out = String::new();
    for (title, entries) in [first, second, ("GENERAL", GLOBAL_HELP)] {
        out.push_str(&format!("\n{} COMMANDS\n", title));
        for (usage, text) in entries {
            out.push_str(&format!("  {:<28} {}\n", usage, text));
        }
    }
    out
}

impl<R: ProcessRunner, O: Operator> Shell<R, O> {
    pub(super) async fn run_global(&self, global: Global, args: &str) -> Result<Flow> {
        match global {
            Global::Help => print!("{}", help_text(self.session.active_mode())),
            Global::Version => self.version().await,
            Global::Exit => return Ok(Flow::Exit),
            Global::Clear => self.operator.clear_screen(),
            Global::Reboot => match self.session.active_mode() {
                DeviceMode::Bridge => {
                    let device = self.session.require_selected(DeviceMode::Bridge)?;
                    self.adb_reboot(args, &device).await?;
                }
                DeviceMode::Bootloader => self.fastboot_reboot(args).await?,
            },
        }
        Ok(Flow::Continue)
    }

    async fn version(&self) {
        println!("{} {}", APP_NAME, VERSION);
        match self.session.adb().version().await {
            Ok(banner) => println!("adb:      {}", banner),
            Err(e) => println!("adb:      unavailable ({})", e),
        }
        match self.session.fastboot().version().await {
            Ok(banner) => println!("fastboot: {}", banner),
            Err(e) => println!("fastboot: unavailable ({})", e),
        }
    }

    pub(super) async fn devices(&self, mode: DeviceMode) -> Result<()> {
        let count = self.session.try_refresh(mode).await?;
        if count == 0 {
            println!("No devices found in {} mode.", mode);
            return Ok(());
        }

        let selected = self.session.selected_index(mode);
        println!("Connected devices ({}):", mode);
        for (i, device) in self.session.devices(mode).iter().enumerate() {
            let marker = if selected == Some(i) { "*" } else { " " };
            println!("{} [{}] {}  {}", marker, i, device.display_name(), device.status);
        }
        Ok(())
    }

    pub(super) async fn select(&self, mode: DeviceMode, args: &str) -> Result<()> {
        let target = args.trim();
        if target.is_empty() {
            return Err(ShellError::usage("select <index|serial>"));
        }

        let device = if target.starts_with(|c: char| c.is_ascii_digit()) {
            let digits: String = target.chars().take_while(char::is_ascii_digit).collect();
            let index = digits
                .parse::<usize>()
                .map_err(|_| ShellError::DeviceNotFound(target.to_string()))?;
            self.session.select(mode, index).await?
        } else {
            self.session.select_by_serial(mode, target).await?
        };
        if mode == DeviceMode::Bootloader {
            self.session.set_active_mode(DeviceMode::Bootloader);
        }

        println!("Selected: {} ({})", device.display_name(), device.serial);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{bridge_fixture, fixture};
    use folkadb_device_bridge::ProcessOutput;

    #[test]
    fn test_help_lists_active_mode_first() {
        let text = help_text(DeviceMode::Bootloader);
        let fastboot = text.find("FASTBOOT COMMANDS").unwrap();
        let adb = text.find("ADB COMMANDS").unwrap();
        assert!(fastboot < adb);
        assert!(text.contains("activate <a|b>"));
        assert!(help_text(DeviceMode::Bridge).contains("shizuku"));
    }

    #[tokio::test]
    async fn test_select_out_of_range_keeps_selection() {
        let f = bridge_fixture(2).await;
        let err = f.shell.execute_line("select 5").await.unwrap_err();

        assert!(matches!(err, ShellError::DeviceNotFound(_)));
        assert_eq!(
            f.shell.session().selected(DeviceMode::Bridge).unwrap().serial,
            "SERIAL0"
        );
    }

    #[tokio::test]
    async fn test_select_by_index_and_serial() {
        let f = bridge_fixture(3).await;

        f.shell.execute_line("select 2").await.unwrap();
        assert_eq!(f.shell.session().selected_index(DeviceMode::Bridge), Some(2));

        f.shell.execute_line("select SERIAL1").await.unwrap();
        assert_eq!(f.shell.session().selected_index(DeviceMode::Bridge), Some(1));

        let err = f.shell.execute_line("select NOPE").await.unwrap_err();
        assert!(matches!(err, ShellError::DeviceNotFound(_)));
        assert_eq!(f.shell.execute_line("select").await.unwrap_err().kind(), "usage");
    }

    #[tokio::test]
    async fn test_select_bootloader_device_activates_mode() {
        let f = fixture('n');
        f.fake.set("fastboot", &["devices"], "FB001\tfastboot\n");
        f.shell.session().refresh(DeviceMode::Bootloader).await;

        f.shell.execute_line("fastboot select 0").await.unwrap();
        assert_eq!(f.shell.session().active_mode(), DeviceMode::Bootloader);
        assert_eq!(
            f.shell.session().selected(DeviceMode::Bootloader).unwrap().serial,
            "FB001"
        );
    }

    #[tokio::test]
    async fn test_devices_reports_enumeration_failure() {
        let f = bridge_fixture(1).await;
        f.fake.on("adb", &["devices", "-l"], ProcessOutput::failed(1, "daemon not running"));

        let err = f.shell.execute_line("devices").await.unwrap_err();
        assert!(matches!(err, ShellError::ProcessFailed { exit_code: 1 }));
        assert_eq!(f.shell.session().devices(DeviceMode::Bridge).len(), 1);
    }

    #[tokio::test]
    async fn test_bridge_reboot_needs_selection() {
        let f = fixture('n');
        let err = f.shell.execute_line("reboot").await.unwrap_err();
        assert!(matches!(err, ShellError::NoDevice));
        assert!(f.fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_version_tolerates_missing_tools() {
        let f = fixture('n');
        f.fake.fail_spawn("fastboot", &[]);

        assert_eq!(f.shell.execute_line("version").await.unwrap(), Flow::Continue);
        assert_eq!(f.fake.calls().len(), 2);
    }
}
