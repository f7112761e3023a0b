//! Shell commands
//!
//! Executes routed command lines against the device session.

mod bootloader;
mod bridge;
mod global;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use folkadb_core::{AppConfig, Result, Session, ShellError};
use folkadb_device_bridge::{Device, DeviceMode, ProcessOutput, ProcessRunner};

use crate::router::{dropped_paths, Action, Command, Descriptor, Flow, Route, Router};

pub use bootloader::Plan;
pub(crate) use bridge::remote_join;

/// Asks the person at the terminal
pub trait Operator: Send + Sync {
    /// Show `prompt` and read a single key. True only for `y` or `Y`.
    fn confirm(&self, prompt: &str) -> bool;

    /// Clear the terminal
    fn clear_screen(&self) {}
}

/// Values handlers take from the configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Remote directory for `push` without a destination
    pub default_remote_dir: String,
    /// Local directory for `dli` downloads
    pub download_dir: PathBuf,
}

impl Settings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_remote_dir: config.transfer.default_remote_dir.clone(),
            download_dir: config.download_dir(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Command executor bound to one session
pub struct Shell<R: ProcessRunner, O: Operator> {
    session: Arc<Session<R>>,
    operator: O,
    router: Router,
    settings: Settings,
}

impl<R: ProcessRunner, O: Operator> Shell<R, O> {
    pub fn new(session: Arc<Session<R>>, operator: O, settings: Settings) -> Self {
        Self {
            session,
            operator,
            router: Router::new(),
            settings,
        }
    }

    pub fn session(&self) -> &Arc<Session<R>> {
        &self.session
    }

    pub fn operator(&self) -> &O {
        &self.operator
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Parse and execute one input line
    pub async fn execute_line(&self, line: &str) -> Result<Flow> {
        if let Some(paths) = dropped_paths(line) {
            self.install_dropped(&paths).await?;
            return Ok(Flow::Continue);
        }

        match Command::parse(line) {
            Some(command) => self.execute(&command).await,
            None => Ok(Flow::Continue),
        }
    }

    pub async fn execute(&self, command: &Command) -> Result<Flow> {
        let route = self.router.resolve(command, self.session.active_mode())?;
        debug!("{:?} -> {:?}", command, route);

        match route {
            Route::Global(global, args) => self.run_global(global, &args).await,
            Route::Table {
                mode,
                descriptor,
                args,
            } => {
                self.run_table(mode, descriptor, &args).await?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Run a table command. Bootloader handlers make bootloader the active mode
    /// themselves, once their checks have passed.
    async fn run_table(&self, mode: DeviceMode, descriptor: Descriptor, args: &str) -> Result<()> {
        let device = if descriptor.needs_device {
            Some(self.session.require_selected(mode)?)
        } else {
            None
        };

        match descriptor.action {
            Action::Devices => return self.devices(mode).await,
            Action::Select => return self.select(mode, args).await,
            Action::Reboot if mode == DeviceMode::Bootloader => {
                return self.fastboot_reboot(args).await
            }
            _ => {}
        }

        let device = device.ok_or(ShellError::NoDevice)?;

        if descriptor.destructive {
            let plan = bootloader::plan(descriptor.action, args)?;
            self.session.set_active_mode(DeviceMode::Bootloader);
            return self.run_plan(&device, plan).await;
        }

        match mode {
            DeviceMode::Bridge => self.run_bridge(descriptor.action, args, &device).await,
            DeviceMode::Bootloader => self.run_bootloader(descriptor.action, args, &device).await,
        }
    }

    /// Show the plan, ask, and run it only on `y`/`Y`
    async fn run_plan(&self, device: &Device, plan: Plan) -> Result<()> {
        println!();
        println!("{}", plan.render(&device.serial));

        if !self
            .operator
            .confirm("Press 'y' to confirm, any other key to cancel: ")
        {
            return Err(ShellError::Cancelled("Operation cancelled.".into()));
        }

        println!("\n{}", plan.progress);
        let output = self
            .session
            .fastboot()
            .run_for_device(&device.serial, &plan.args)
            .await?;
        report(output)?;
        println!("{}", plan.done);
        Ok(())
    }
}

/// Print captured output, turning a non-zero exit into `ProcessFailed`
pub(crate) fn report(output: ProcessOutput) -> Result<ProcessOutput> {
    let stdout = output.stdout_text();
    let stderr = output.stderr_text();
    if !stdout.trim().is_empty() {
        println!("{}", stdout.trim_end());
    }
    if !stderr.trim().is_empty() {
        eprintln!("{}", stderr.trim_end());
    }

    if output.success() {
        Ok(output)
    } else {
        Err(ShellError::ProcessFailed {
            exit_code: output.exit_code,
        })
    }
}
