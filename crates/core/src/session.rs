//! Device Session
//!
//! The device registry: one device list and selection per mode plus the active mode.
//! Shared between the console and the mode monitor.

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use folkadb_device_bridge::{
    AdbClient, Device, DeviceMode, FastbootClient, ProcessRunner, RunnerError,
};

use crate::error::{Result, ShellError};

#[derive(Debug, Default)]
struct Registry {
    devices: Vec<Device>,
    selected: Option<usize>,
}

impl Registry {
    fn selected(&self) -> Option<&Device> {
        self.selected.and_then(|index| self.devices.get(index))
    }

    /// Swap in a fresh enumeration, keeping the selection by serial
    fn replace(&mut self, devices: Vec<Device>) {
        let previous = self.selected().map(|device| device.serial.clone());
        let mut devices = devices;

        // Keep descriptive fields fetched on selection
        for device in devices.iter_mut() {
            if let Some(old) = self.devices.iter().find(|d| d.serial == device.serial) {
                device.android_version = old.android_version.clone();
                device.api_level = old.api_level.clone();
            }
        }

        self.selected = previous.and_then(|serial| devices.iter().position(|d| d.serial == serial));
        self.devices = devices;
    }
}

#[derive(Debug)]
struct SessionState {
    bridge: Registry,
    bootloader: Registry,
    active: DeviceMode,
}

impl SessionState {
    fn registry(&self, mode: DeviceMode) -> &Registry {
        match mode {
            DeviceMode::Bridge => &self.bridge,
            DeviceMode::Bootloader => &self.bootloader,
        }
    }

    fn registry_mut(&mut self, mode: DeviceMode) -> &mut Registry {
        match mode {
            DeviceMode::Bridge => &mut self.bridge,
            DeviceMode::Bootloader => &mut self.bootloader,
        }
    }
}

/// Device counts per mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCounts {
    pub bridge: usize,
    pub bootloader: usize,
}

impl DeviceCounts {
    pub fn get(&self, mode: DeviceMode) -> usize {
        match mode {
            DeviceMode::Bridge => self.bridge,
            DeviceMode::Bootloader => self.bootloader,
        }
    }

    pub fn total(&self) -> usize {
        self.bridge + self.bootloader
    }
}

/// Consistent view of the session for the prompt
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub active: DeviceMode,
    pub selected: Option<Device>,
    pub counts: DeviceCounts,
}

/// Device session shared by the console and the monitor
pub struct Session<R: ProcessRunner> {
    adb: AdbClient<R>,
    fastboot: FastbootClient<R>,
    state: Mutex<SessionState>,
}

impl<R: ProcessRunner> Session<R> {
    pub fn new(runner: Arc<R>, adb_path: PathBuf, fastboot_path: PathBuf) -> Self {
        Self {
            adb: AdbClient::new(Arc::clone(&runner), adb_path),
            fastboot: FastbootClient::new(runner, fastboot_path),
            state: Mutex::new(SessionState {
                bridge: Registry::default(),
                bootloader: Registry::default(),
                active: DeviceMode::Bridge,
            }),
        }
    }

    pub fn adb(&self) -> &AdbClient<R> {
        &self.adb
    }

    pub fn fastboot(&self) -> &FastbootClient<R> {
        &self.fastboot
    }

    /// Enumerate one mode and replace its device list.
    ///
    /// On failure the previous list and selection are left as they were.
    pub async fn try_refresh(&self, mode: DeviceMode) -> std::result::Result<usize, RunnerError> {
        let devices = match mode {
            DeviceMode::Bridge => self.adb.list_devices().await?,
            DeviceMode::Bootloader => self.fastboot.list_devices().await?,
        };

        let mut state = self.state.lock();
        let registry = state.registry_mut(mode);
        let had_selection = registry.selected.is_some();
        registry.replace(devices);
        if had_selection && registry.selected.is_none() {
            info!("Selected {} device disconnected", mode);
        }
        Ok(registry.devices.len())
    }

    /// Like `try_refresh`, reporting no devices when enumeration fails
    pub async fn refresh(&self, mode: DeviceMode) -> usize {
        match self.try_refresh(mode).await {
            Ok(count) => count,
            Err(e) => {
                warn!("{} enumeration failed: {}", mode, e);
                0
            }
        }
    }

    /// Select a device by position and fetch its details in bridge mode
    pub async fn select(&self, mode: DeviceMode, index: usize) -> Result<Device> {
        let serial = {
            let mut state = self.state.lock();
            let registry = state.registry_mut(mode);
            let count = registry.devices.len();
            let device = registry.devices.get(index).ok_or_else(|| {
                ShellError::DeviceNotFound(format!("index {} ({} {} devices)", index, count, mode))
            })?;
            let serial = device.serial.clone();
            registry.selected = Some(index);
            serial
        };
        info!("Selected {} device {}", mode, serial);
        self.load_details(mode, serial).await
    }

    /// Select the first device unless something is already selected.
    ///
    /// The check and the selection happen under one lock, so a selection made
    /// concurrently by the operator is never replaced. `None` when nothing changed.
    pub async fn select_first_if_unselected(&self, mode: DeviceMode) -> Result<Option<Device>> {
        let serial = {
            let mut state = self.state.lock();
            let registry = state.registry_mut(mode);
            if registry.selected.is_some() {
                return Ok(None);
            }
            let Some(device) = registry.devices.first() else {
                return Ok(None);
            };
            let serial = device.serial.clone();
            registry.selected = Some(0);
            serial
        };
        info!("Auto-selected {} device {}", mode, serial);
        self.load_details(mode, serial).await.map(Some)
    }

    /// Fetch version details for a bridge device and return its current entry
    async fn load_details(&self, mode: DeviceMode, serial: String) -> Result<Device> {
        if mode == DeviceMode::Bridge {
            let version = self.adb.get_prop(&serial, "ro.build.version.release").await;
            let api_level = self.adb.get_prop(&serial, "ro.build.version.sdk").await;

            let mut state = self.state.lock();
            if let Some(device) = state.bridge.devices.iter_mut().find(|d| d.serial == serial) {
                device.android_version = version;
                device.api_level = api_level;
            }
        }

        let state = self.state.lock();
        state
            .registry(mode)
            .devices
            .iter()
            .find(|d| d.serial == serial)
            .cloned()
            .ok_or(ShellError::DeviceNotFound(serial))
    }

    /// Select a device by serial
    pub async fn select_by_serial(&self, mode: DeviceMode, serial: &str) -> Result<Device> {
        let index = self
            .state
            .lock()
            .registry(mode)
            .devices
            .iter()
            .position(|d| d.serial == serial)
            .ok_or_else(|| ShellError::DeviceNotFound(serial.to_string()))?;
        self.select(mode, index).await
    }

    /// Currently selected device in a mode
    pub fn selected(&self, mode: DeviceMode) -> Option<Device> {
        self.state.lock().registry(mode).selected().cloned()
    }

    /// Selected device or `NoDevice`
    pub fn require_selected(&self, mode: DeviceMode) -> Result<Device> {
        self.selected(mode).ok_or(ShellError::NoDevice)
    }

    pub fn selected_index(&self, mode: DeviceMode) -> Option<usize> {
        self.state.lock().registry(mode).selected
    }

    pub fn devices(&self, mode: DeviceMode) -> Vec<Device> {
        self.state.lock().registry(mode).devices.clone()
    }

    pub fn active_mode(&self) -> DeviceMode {
        self.state.lock().active
    }

    pub fn set_active_mode(&self, mode: DeviceMode) {
        let mut state = self.state.lock();
        if state.active != mode {
            info!("Active mode: {}", mode);
            state.active = mode;
        }
    }

    pub fn counts(&self) -> DeviceCounts {
        let state = self.state.lock();
        DeviceCounts {
            bridge: state.bridge.devices.len(),
            bootloader: state.bootloader.devices.len(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            active: state.active,
            selected: state.registry(state.active).selected().cloned(),
            counts: DeviceCounts {
                bridge: state.bridge.devices.len(),
                bootloader: state.bootloader.devices.len(),
            },
        }
    }

    /// Refresh once per second until a device shows up in `mode`.
    ///
    /// `timeout_secs` of 0 waits until cancelled. Returns the device count, 0 on
    /// timeout or cancellation.
    pub async fn wait_for_device(
        &self,
        mode: DeviceMode,
        timeout_secs: u64,
        cancel: &CancellationToken,
    ) -> usize {
        let started = Instant::now();
        let timeout = Duration::from_secs(timeout_secs);

        loop {
            let count = self.refresh(mode).await;
            if count > 0 {
                return count;
            }
            if timeout_secs > 0 && started.elapsed() >= timeout {
                debug!("No {} device after {}s", mode, timeout_secs);
                return 0;
            }

            tokio::select! {
                _ = cancel.cancelled() => return 0,
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folkadb_device_bridge::{FakeRunner, ProcessOutput};

    fn session() -> (Arc<FakeRunner>, Session<FakeRunner>) {
        let fake = Arc::new(FakeRunner::new());
        let session = Session::new(
            Arc::clone(&fake),
            PathBuf::from("adb"),
            PathBuf::from("fastboot"),
        );
        (fake, session)
    }

    fn adb_list(serials: &[&str]) -> String {
        let mut out = String::from("List of devices attached\n");
        for serial in serials {
            out.push_str(&format!("{serial}\tdevice product:p device:d\n"));
        }
        out
    }

    #[tokio::test]
    async fn test_selection_follows_serial_after_reorder() {
        let (fake, session) = session();
        fake.set("adb", &["devices", "-l"], &adb_list(&["A", "B", "C"]));
        assert_eq!(session.refresh(DeviceMode::Bridge).await, 3);
        session.select(DeviceMode::Bridge, 1).await.unwrap();

        fake.set("adb", &["devices", "-l"], &adb_list(&["C", "A", "B"]));
        session.refresh(DeviceMode::Bridge).await;

        assert_eq!(session.selected_index(DeviceMode::Bridge), Some(2));
        assert_eq!(session.selected(DeviceMode::Bridge).unwrap().serial, "B");
    }

    #[tokio::test]
    async fn test_selection_cleared_when_device_leaves() {
        let (fake, session) = session();
        fake.set("adb", &["devices", "-l"], &adb_list(&["A", "B", "C"]));
        session.refresh(DeviceMode::Bridge).await;
        session.select(DeviceMode::Bridge, 2).await.unwrap();

        fake.set("adb", &["devices", "-l"], &adb_list(&["A"]));
        session.refresh(DeviceMode::Bridge).await;

        assert_eq!(session.selected(DeviceMode::Bridge), None);
        assert!(matches!(
            session.require_selected(DeviceMode::Bridge),
            Err(ShellError::NoDevice)
        ));
    }

    #[tokio::test]
    async fn test_select_out_of_range_keeps_previous() {
        let (fake, session) = session();
        fake.set("adb", &["devices", "-l"], &adb_list(&["A", "B"]));
        session.refresh(DeviceMode::Bridge).await;
        session.select(DeviceMode::Bridge, 0).await.unwrap();

        let err = session.select(DeviceMode::Bridge, 5).await.unwrap_err();
        assert!(matches!(err, ShellError::DeviceNotFound(_)));
        assert_eq!(session.selected(DeviceMode::Bridge).unwrap().serial, "A");
    }

    #[tokio::test]
    async fn test_select_fetches_details_in_bridge_mode() {
        let (fake, session) = session();
        fake.set("adb", &["devices", "-l"], &adb_list(&["A"]));
        fake.set("adb", &["ro.build.version.release"], "14\n");
        fake.set("adb", &["ro.build.version.sdk"], "34\n");
        session.refresh(DeviceMode::Bridge).await;

        let device = session.select(DeviceMode::Bridge, 0).await.unwrap();
        assert_eq!(device.android_version.as_deref(), Some("14"));
        assert_eq!(device.api_level.as_deref(), Some("34"));

        // details survive a refresh
        session.refresh(DeviceMode::Bridge).await;
        let device = session.selected(DeviceMode::Bridge).unwrap();
        assert_eq!(device.api_level.as_deref(), Some("34"));
    }

    #[tokio::test]
    async fn test_bootloader_select_runs_nothing() {
        let (fake, session) = session();
        fake.set("fastboot", &["devices"], "F1\tfastboot\n");
        session.refresh(DeviceMode::Bootloader).await;
        fake.clear_calls();

        session.select_by_serial(DeviceMode::Bootloader, "F1").await.unwrap();
        assert!(fake.calls().is_empty());
        assert!(session.select_by_serial(DeviceMode::Bootloader, "F9").await.is_err());
    }

    #[tokio::test]
    async fn test_failed_enumeration_keeps_previous_list() {
        let (fake, session) = session();
        fake.set("adb", &["devices", "-l"], &adb_list(&["A", "B"]));
        session.refresh(DeviceMode::Bridge).await;
        session.select(DeviceMode::Bridge, 1).await.unwrap();

        fake.on("adb", &["devices", "-l"], ProcessOutput::failed(1, "daemon died"));
        assert_eq!(session.refresh(DeviceMode::Bridge).await, 0);
        assert_eq!(session.devices(DeviceMode::Bridge).len(), 2);

        fake.fail_spawn("adb", &["devices"]);
        assert!(session.try_refresh(DeviceMode::Bridge).await.is_err());
        assert_eq!(session.selected(DeviceMode::Bridge).unwrap().serial, "B");
    }

    #[tokio::test]
    async fn test_snapshot_reflects_active_mode() {
        let (fake, session) = session();
        fake.set("adb", &["devices", "-l"], &adb_list(&["A"]));
        fake.set("fastboot", &["devices"], "F1\tfastboot\nF2\tfastboot\n");
        session.refresh(DeviceMode::Bridge).await;
        session.refresh(DeviceMode::Bootloader).await;
        session.select(DeviceMode::Bridge, 0).await.unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.active, DeviceMode::Bridge);
        assert_eq!(snapshot.selected.unwrap().serial, "A");
        assert_eq!(snapshot.counts, DeviceCounts { bridge: 1, bootloader: 2 });

        session.set_active_mode(DeviceMode::Bootloader);
        assert!(session.snapshot().selected.is_none());
    }

    #[tokio::test]
    async fn test_wait_for_device_cancelled() {
        let (_fake, session) = session();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(session.wait_for_device(DeviceMode::Bridge, 0, &cancel).await, 0);
    }

    #[tokio::test]
    async fn test_wait_for_device_immediate() {
        let (fake, session) = session();
        fake.set("adb", &["devices", "-l"], &adb_list(&["A"]));

        let cancel = CancellationToken::new();
        assert_eq!(session.wait_for_device(DeviceMode::Bridge, 10, &cancel).await, 1);
    }

    #[tokio::test]
    async fn test_select_first_keeps_existing_selection() {
        let (fake, session) = session();
        fake.set("adb", &["devices", "-l"], &adb_list(&["A", "B"]));
        session.refresh(DeviceMode::Bridge).await;
        session.select(DeviceMode::Bridge, 1).await.unwrap();

        let picked = session.select_first_if_unselected(DeviceMode::Bridge).await.unwrap();
        assert!(picked.is_none());
        assert_eq!(session.selected(DeviceMode::Bridge).unwrap().serial, "B");
    }

    #[tokio::test]
    async fn test_select_first_when_unselected() {
        let (fake, session) = session();
        assert!(session
            .select_first_if_unselected(DeviceMode::Bootloader)
            .await
            .unwrap()
            .is_none());

        fake.set("fastboot", &["devices"], "F1\tfastboot\nF2\tfastboot\n");
        session.refresh(DeviceMode::Bootloader).await;
        let picked = session.select_first_if_unselected(DeviceMode::Bootloader).await.unwrap();
        assert_eq!(picked.unwrap().serial, "F1");
        assert_eq!(session.selected_index(DeviceMode::Bootloader), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_device_times_out() {
        let (fake, session) = session();
        let cancel = CancellationToken::new();

        assert_eq!(session.wait_for_device(DeviceMode::Bridge, 1, &cancel).await, 0);
        // one refresh at start, one after the single second
        assert_eq!(fake.calls_to("adb").len(), 2);
    }
}
