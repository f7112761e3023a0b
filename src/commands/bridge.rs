//! Bridge mode commands (adb)

use std::path::{Path, PathBuf};
use tracing::debug;

use folkadb_core::{Result, ShellError};
use folkadb_device_bridge::{Device, DeviceMode, ProcessRunner};

use super::{report, Operator, Shell};
use crate::modules::{detect_root_provider, is_module_zip, ModuleDownloader};
use crate::router::{is_apk, split_args, Action};

const SHIZUKU_PACKAGE: &str = "moe.shizuku.privileged.api";
const SUDO_HELPER_REMOTE: &str = "/data/local/tmp/sudo";
const SUDO_HELPER: &str = "#!/system/bin/sh\nexec su -c \"$@\"\n";
const INTERACTIVE_STARTUP: &str = "export PATH=/data/local/tmp:$PATH; /system/bin/sh";

impl<R: ProcessRunner, O: Operator> Shell<R, O> {
    pub(super) async fn run_bridge(&self, action: Action, args: &str, device: &Device) -> Result<()> {
        match action {
            Action::Info => self.bridge_info(device),
            Action::Reboot => self.adb_reboot(args, device).await,
            Action::Push => self.push(args, device).await,
            Action::Pull => self.pull(args, device).await,
            Action::Ls => {
                let path = if args.is_empty() { "/sdcard" } else { args };
                self.device_shell(device, &format!("ls -la {}", shell_quote(unquote(path)))).await
            }
            Action::Rm => {
                let path = required(args, "rm <remote_path>")?;
                self.device_shell(device, &format!("rm {}", shell_quote(path))).await
            }
            Action::Mkdir => {
                let path = required(args, "mkdir <remote_path>")?;
                self.device_shell(device, &format!("mkdir -p {}", shell_quote(path))).await
            }
            Action::Shell if args.is_empty() => self.interactive_shell(device).await,
            Action::Shell => self.device_shell(device, args).await,
            Action::Sudo => {
                let command = required(args, "sudo <command>")?;
                report(self.session.adb().sudo(&device.serial, command).await?)?;
                Ok(())
            }
            Action::Install => self.install(args, device).await,
            Action::Uninstall => {
                let package = required(args, "uninstall <package_name>")?;
                println!("Uninstalling {}...", package);
                report(self.session.adb().uninstall(&device.serial, package).await?)?;
                println!("Package uninstalled successfully.");
                Ok(())
            }
            Action::Dli => self.dli(args, device).await,
            Action::Shizuku => self.shizuku(device).await,
            other => Err(ShellError::UnknownCommand(format!("{:?}", other).to_lowercase())),
        }
    }

    fn bridge_info(&self, device: &Device) -> Result<()> {
        println!();
        println!("========================================");
        println!("         Device Information");
        println!("========================================");
        println!("Serial ID:    {}", device.serial);
        println!("Model:        {}", device.model.as_deref().unwrap_or("Unknown"));
        println!("Device:       {}", device.codename.as_deref().unwrap_or("Unknown"));
        println!("Status:       {}", device.status);
        if let Some(ref version) = device.android_version {
            println!(
                "Android:      {} (API {})",
                version,
                device.api_level.as_deref().unwrap_or("?")
            );
        }
        println!("========================================");
        Ok(())
    }

    async fn device_shell(&self, device: &Device, command: &str) -> Result<()> {
        report(self.session.adb().shell(&device.serial, command).await?)?;
        Ok(())
    }

    pub(super) async fn adb_reboot(&self, args: &str, device: &Device) -> Result<()> {
        let mode = if args.is_empty() { "system" } else { args };
        println!("Rebooting device to {} mode...", mode);
        report(self.session.adb().reboot(&device.serial, mode).await?)?;
        println!("Device is rebooting...");
        Ok(())
    }

    async fn push(&self, args: &str, device: &Device) -> Result<()> {
        let parts = split_args(args);
        let Some(local) = parts.first() else {
            return Err(ShellError::usage("push <local> [remote]"));
        };
        let local = PathBuf::from(local);
        if !local.exists() {
            return Err(ShellError::FileNotFound(local.display().to_string()));
        }

        let remote = match parts.get(1) {
            Some(remote) => remote.clone(),
            None => {
                let remote = self.settings.default_remote_dir.clone();
                println!("No remote path specified, defaulting to: {}", remote);
                remote
            }
        };

        println!("Pushing {} -> {}", local.display(), remote);
        report(self.session.adb().push(&device.serial, &local, &remote).await?)?;
        println!("File pushed successfully.");
        Ok(())
    }

    async fn pull(&self, args: &str, device: &Device) -> Result<()> {
        let parts = split_args(args);
        let Some(remote) = parts.first() else {
            return Err(ShellError::usage("pull <remote> [local]"));
        };
        let local = match parts.get(1) {
            Some(local) => PathBuf::from(local),
            None => PathBuf::from(
                remote_file_name(remote).ok_or_else(|| ShellError::usage("pull <remote> [local]"))?,
            ),
        };

        println!("Pulling {} -> {}", remote, local.display());
        report(self.session.adb().pull(&device.serial, remote, &local).await?)?;
        println!("File pulled successfully.");
        Ok(())
    }

    async fn install(&self, args: &str, device: &Device) -> Result<()> {
        let apk = Path::new(required(args, "install <apk_file>")?);
        self.install_apk(apk, device).await
    }

    /// Install every APK of a dropped-files line; other paths are skipped
    pub(super) async fn install_dropped(&self, paths: &[String]) -> Result<()> {
        if self.session.active_mode() == DeviceMode::Bootloader {
            eprintln!("Cannot install APKs in fastboot mode. Switch to adb mode first.");
            return Err(ShellError::WrongMode(DeviceMode::Bootloader.to_string()));
        }
        let device = self.session.require_selected(DeviceMode::Bridge)?;

        println!("Detected dropped APK files. Starting installation...");
        for path in paths {
            if !is_apk(path) {
                println!("Skipping non-APK file: {}", path);
                continue;
            }
            if let Err(e) = self.install_apk(Path::new(path), &device).await {
                eprintln!("{}", e.user_message());
            }
        }
        Ok(())
    }

    async fn install_apk(&self, apk: &Path, device: &Device) -> Result<()> {
        if !apk.is_file() {
            return Err(ShellError::FileNotFound(apk.display().to_string()));
        }

        println!("Installing {}...", apk.display());
        report(self.session.adb().install(&device.serial, apk).await?)?;
        println!("APK installed successfully.");
        Ok(())
    }

    async fn interactive_shell(&self, device: &Device) -> Result<()> {
        let adb = self.session.adb();
        let serial = device.serial.as_str();

        // `sudo` helper on the device PATH; the shell still works without it
        let helper = std::env::temp_dir().join("folkadb-sudo");
        match tokio::fs::write(&helper, SUDO_HELPER).await {
            Ok(()) => {
                if let Err(e) = adb.push(serial, &helper, SUDO_HELPER_REMOTE).await {
                    debug!("sudo helper push failed: {}", e);
                }
                if let Err(e) = adb
                    .shell(serial, &format!("chmod 755 {}", SUDO_HELPER_REMOTE))
                    .await
                {
                    debug!("sudo helper chmod failed: {}", e);
                }
            }
            Err(e) => debug!("could not write sudo helper: {}", e),
        }

        println!("Entering interactive shell mode with sudo support. Type 'exit' to return.");
        println!("----------------------------------------");
        let code = adb.attach_shell(serial, Some(INTERACTIVE_STARTUP)).await?;
        println!("----------------------------------------");
        println!("Exited shell mode.");
        debug!("interactive shell exited with {}", code);
        Ok(())
    }

    async fn dli(&self, args: &str, device: &Device) -> Result<()> {
        let url = required(args, "dli <url>")?;

        let downloader = ModuleDownloader::new(self.settings.download_dir.clone())?;
        println!("Downloading module from {}...", url);
        let local = downloader.download(url).await?;

        self.install_module(&local, device).await
    }

    /// Push a module archive and install it with the device's root manager
    pub(crate) async fn install_module(&self, local: &Path, device: &Device) -> Result<()> {
        let adb = self.session.adb();
        let file_name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ShellError::FileNotFound(local.display().to_string()))?;
        let remote = remote_join(&self.settings.default_remote_dir, &file_name);

        println!("Pushing to device: {} -> {}", local.display(), remote);
        report(adb.push(&device.serial, local, &remote).await?)?;

        if !is_module_zip(local).await {
            println!("Warning: Downloaded file does not appear to be a Magisk/KSU/APatch module (no module.prop).");
            println!("Proceeding with installation anyway...");
        }

        self.install_pushed_module(&remote, device).await
    }

    /// Install a module archive already on the device
    pub(crate) async fn install_pushed_module(&self, remote: &str, device: &Device) -> Result<()> {
        let adb = self.session.adb();
        let provider = detect_root_provider(adb, &device.serial)
            .await
            .ok_or(ShellError::RootUnavailable)?;
        println!("Detected Root Solution: {}", provider);

        println!("Installing module...");
        report(adb.shell(&device.serial, &provider.install_command(remote)).await?)?;
        println!("Module installed. Reboot the device to activate it.");
        Ok(())
    }

    async fn shizuku(&self, device: &Device) -> Result<()> {
        let adb = self.session.adb();
        println!("Activating Shizuku...");

        let output = adb
            .shell(&device.serial, &format!("pm path {}", SHIZUKU_PACKAGE))
            .await?;
        if !output.success() {
            eprintln!("Shizuku app not found (package: {})", SHIZUKU_PACKAGE);
            return Err(ShellError::ProcessFailed {
                exit_code: output.exit_code,
            });
        }
        let Some(dir) = package_dir(&output.stdout_text()) else {
            return Err(ShellError::FileNotFound(format!("{} package path", SHIZUKU_PACKAGE)));
        };

        let starter = format!("{}/lib/arm64/libshizuku.so", dir);
        println!("Found Shizuku path: {}", dir);
        println!("Executing: {}", starter);

        report(adb.shell(&device.serial, &starter).await?)?;
        println!("Shizuku activation command executed successfully.");
        Ok(())
    }
}

/// Argument string with surrounding quotes removed, or a usage error when empty
fn required<'a>(args: &'a str, usage: &str) -> Result<&'a str> {
    let value = unquote(args);
    if value.is_empty() {
        Err(ShellError::usage(usage))
    } else {
        Ok(value)
    }
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

/// Single-quote `s` for the device shell
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Last path segment of a device path
fn remote_file_name(remote: &str) -> Option<&str> {
    remote
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
}

pub(crate) fn remote_join(dir: &str, file_name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, file_name)
    } else {
        format!("{}/{}", dir, file_name)
    }
}

/// Directory of an installed package from `pm path` output
fn package_dir(pm_output: &str) -> Option<String> {
    let path = pm_output
        .lines()
        .find_map(|line| line.trim().strip_prefix("package:"))?
        .trim();
    let dir = match path.strip_suffix("/base.apk") {
        Some(dir) => dir,
        None => path.rsplit_once('/').map(|(dir, _)| dir)?,
    };
    (!dir.is_empty()).then(|| dir.to_string())
}
