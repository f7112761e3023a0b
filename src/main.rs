//! folkadb - interactive adb and fastboot shell
//!
//! Binary entry point: reads configuration, finds the platform tools, starts the
//! mode monitor and hands over to the console or to batch mode.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use folkadb::cli::{Args, LOG_ENV};
use folkadb::commands::{Settings, Shell};
use folkadb::console::{self, TerminalOperator};
use folkadb::batch;
use folkadb_core::{AppConfig, Monitor, RefreshNotifier, Session, APP_NAME, VERSION};
use folkadb_device_bridge::{locate, Tool, TokioRunner};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they never land in the prompt line
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("{} v{} starting...", APP_NAME, VERSION);

    let mut config = match args.config {
        Some(ref path) => AppConfig::load_from(path).await,
        None => AppConfig::load().await,
    }
    .context("failed to load configuration")?;
    args.apply(&mut config);

    let adb_path = locate(Tool::Adb, &[config.tools.adb_path.as_deref()]);
    let fastboot_path = locate(Tool::Fastboot, &[config.tools.fastboot_path.as_deref()]);
    debug!("adb: {:?}, fastboot: {:?}", adb_path, fastboot_path);

    let session = Arc::new(Session::new(Arc::new(TokioRunner), adb_path, fastboot_path));
    let shell = Shell::new(
        Arc::clone(&session),
        TerminalOperator,
        Settings::from_config(&config),
    );

    if args.is_batch() {
        let cancel = CancellationToken::new();
        let report = batch::run(&shell, &args.files, &cancel).await;
        let failed = match report {
            Ok(report) => {
                report.print();
                report.failures() > 0
            }
            Err(e) => {
                eprintln!("{}", e.user_message());
                true
            }
        };
        if failed {
            std::process::exit(1);
        }
        return Ok(());
    }

    let notifier = Arc::new(RefreshNotifier::new());
    let monitor = Arc::new(Monitor::new(
        Arc::clone(&session),
        Arc::clone(&notifier),
        Duration::from_secs(config.monitor.poll_interval_secs.max(1)),
    ));

    // Pick up whatever is already connected before the first prompt
    monitor.tick().await;
    if config.monitor.enabled {
        monitor.start();
    } else {
        info!("Device monitor disabled");
    }

    let result = console::run(&shell, &notifier).await;
    monitor.shutdown().await;
    result
}
