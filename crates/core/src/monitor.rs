//! Mode Monitor
//!
//! Background task that periodically refreshes both device lists and switches the
//! active mode as devices enter and leave the bootloader.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use folkadb_device_bridge::{DeviceMode, ProcessRunner};

use crate::events::RefreshNotifier;
use crate::session::{DeviceCounts, Session};

/// Default time between ticks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// What a tick decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing the operator needs to see
    Unchanged,
    /// The active mode changed
    Switched(DeviceMode),
    /// The first device of the active mode was selected
    AutoSelected(DeviceMode),
    /// Device counts differ from the previous tick
    Changed,
}

/// Auto-switch policy, in priority order
fn decide(active: DeviceMode, counts: DeviceCounts, has_selection: bool, last: DeviceCounts) -> TickOutcome {
    if counts.bootloader > 0 && active != DeviceMode::Bootloader {
        TickOutcome::Switched(DeviceMode::Bootloader)
    } else if counts.bridge > 0 && counts.bootloader == 0 && active != DeviceMode::Bridge {
        TickOutcome::Switched(DeviceMode::Bridge)
    } else if counts.total() == 0 && active != DeviceMode::Bridge {
        TickOutcome::Switched(DeviceMode::Bridge)
    } else if counts.get(active) > 0 && !has_selection {
        TickOutcome::AutoSelected(active)
    } else if counts != last {
        TickOutcome::Changed
    } else {
        TickOutcome::Unchanged
    }
}

/// Periodic device monitor
pub struct Monitor<R: ProcessRunner> {
    session: Arc<Session<R>>,
    notifier: Arc<RefreshNotifier>,
    period: Duration,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
    last_counts: Mutex<DeviceCounts>,
}

impl<R: ProcessRunner> Monitor<R> {
    pub fn new(session: Arc<Session<R>>, notifier: Arc<RefreshNotifier>, period: Duration) -> Self {
        Self {
            session,
            notifier,
            period,
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
            last_counts: Mutex::new(DeviceCounts::default()),
        }
    }

    /// Refresh both modes, apply the switch policy and notify on visible change
    pub async fn tick(&self) -> TickOutcome {
        for mode in [DeviceMode::Bridge, DeviceMode::Bootloader] {
            if let Err(e) = self.session.try_refresh(mode).await {
                debug!("{} enumeration failed during tick: {}", mode, e);
            }
        }

        let counts = self.session.counts();
        let active = self.session.active_mode();
        let has_selection = self.session.selected(active).is_some();
        let last = std::mem::replace(&mut *self.last_counts.lock(), counts);

        let outcome = decide(active, counts, has_selection, last);
        debug!("Monitor tick: {:?} -> {:?}", counts, outcome);

        match outcome {
            TickOutcome::Switched(mode) => {
                info!("Switching to {} mode", mode);
                self.session.set_active_mode(mode);
                self.auto_select(mode).await;
            }
            TickOutcome::AutoSelected(mode) => self.auto_select(mode).await,
            TickOutcome::Changed | TickOutcome::Unchanged => {}
        }

        if outcome != TickOutcome::Unchanged {
            self.notifier.notify();
        }
        outcome
    }

    async fn auto_select(&self, mode: DeviceMode) {
        if let Err(e) = self.session.select_first_if_unselected(mode).await {
            debug!("Auto-select in {} mode failed: {}", mode, e);
        }
    }

    /// Spawn the background loop. Returns false if it is already running or was stopped.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut handle = self.handle.lock();
        if self.cancel.is_cancelled() || handle.is_some() {
            return false;
        }

        let monitor = Arc::clone(self);
        *handle = Some(tokio::spawn(async move {
            debug!("Mode monitor started, period {:?}", monitor.period);
            loop {
                monitor.tick().await;
                tokio::select! {
                    _ = monitor.cancel.cancelled() => break,
                    _ = tokio::time::sleep(monitor.period) => {}
                }
            }
            debug!("Mode monitor stopped");
        }));
        true
    }

    /// Ask the loop to finish; it never restarts afterwards
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop and wait for the loop to finish
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .handle
                .lock()
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }
}
