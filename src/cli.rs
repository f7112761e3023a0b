//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;
use folkadb_core::AppConfig;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "FOLKADB_LOG";

/// folkadb - interactive adb and fastboot shell
#[derive(Parser, Debug, Default)]
#[command(name = "folkadb", version)]
#[command(about = "Interactive adb and fastboot shell", long_about = None)]
pub struct Args {
    /// Files to install (.apk) or push, then exit
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Path to the adb executable
    #[arg(long, value_name = "PATH")]
    pub adb: Option<PathBuf>,

    /// Path to the fastboot executable
    #[arg(long, value_name = "PATH")]
    pub fastboot: Option<PathBuf>,

    /// Seconds between device checks
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: Option<u64>,

    /// Do not watch for devices in the background
    #[arg(long)]
    pub no_monitor: bool,

    /// Configuration file to use instead of the default one
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Let flags override values from the configuration file
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(ref adb) = self.adb {
            config.tools.adb_path = Some(adb.clone());
        }
        if let Some(ref fastboot) = self.fastboot {
            config.tools.fastboot_path = Some(fastboot.clone());
        }
        if let Some(secs) = self.poll_interval {
            config.monitor.poll_interval_secs = secs;
        }
        if self.no_monitor {
            config.monitor.enabled = false;
        }
    }

    /// Default log filter when `FOLKADB_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }

    pub fn is_batch(&self) -> bool {
        !self.files.is_empty()
    }
}
