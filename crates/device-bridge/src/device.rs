//! Device Types and Enumeration Parsing
//!
//! Represents devices seen by `adb devices -l` and `fastboot devices`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::MAX_DEVICES;

/// Operating mode a device was enumerated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceMode {
    /// Android userspace reachable through adb
    Bridge,
    /// Bootloader reachable through fastboot
    Bootloader,
}

impl DeviceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceMode::Bridge => "adb",
            DeviceMode::Bootloader => "fastboot",
        }
    }

    /// The other mode
    pub fn other(&self) -> Self {
        match self {
            DeviceMode::Bridge => DeviceMode::Bootloader,
            DeviceMode::Bootloader => DeviceMode::Bridge,
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device serial number
    pub serial: String,
    /// Connection state as printed by the tool ("device", "offline", "fastboot", ...)
    pub status: String,
    /// Product name from the `product:` field
    pub model: Option<String>,
    /// Device codename from the `device:` field
    pub codename: Option<String>,
    /// Android version, fetched on selection
    pub android_version: Option<String>,
    /// SDK/API level, fetched on selection
    pub api_level: Option<String>,
}

impl Device {
    pub fn new(serial: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    /// Check if adb reports the device as usable
    pub fn is_online(&self) -> bool {
        self.status == "device"
    }

    /// Get display name
    pub fn display_name(&self) -> String {
        if let Some(ref model) = self.model {
            format!("{} ({})", model.replace('_', " "), self.serial)
        } else {
            self.serial.clone()
        }
    }
}

/// Parse the table printed by `adb devices -l`
pub fn parse_bridge_devices(output: &str) -> Vec<Device> {
    let mut devices = Vec::new();

    for line in output.lines() {
        if devices.len() >= MAX_DEVICES {
            break;
        }
        if line.contains("List of devices") || line.contains("daemon") {
            continue;
        }
        let Some(mut device) = parse_line(line) else {
            continue;
        };

        device.model = extract_field(line, "product:");
        device.codename = extract_field(line, "device:");
        devices.push(device);
    }

    devices
}

/// Parse the table printed by `fastboot devices`
pub fn parse_bootloader_devices(output: &str) -> Vec<Device> {
    output
        .lines()
        .filter_map(parse_line)
        .take(MAX_DEVICES)
        .collect()
}

fn parse_line(line: &str) -> Option<Device> {
    let mut parts = line.split_whitespace();
    let serial = parts.next()?;
    let status = parts.next()?;
    Some(Device::new(serial, status))
}

/// Read `key:value` up to the next comma, space or line end
fn extract_field(line: &str, key: &str) -> Option<String> {
    // " device:" must not match the status column "device" or "transport_id:"
    let start = line
        .match_indices(key)
        .find(|(pos, _)| *pos == 0 || line[..*pos].ends_with(char::is_whitespace))
        .map(|(pos, _)| pos + key.len())?;

    let value: String = line[start..]
        .chars()
        .take_while(|c| !matches!(c, ',' | ' ' | '\t' | '\r' | '\n'))
        .collect();

    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADB_OUTPUT: &str = "\
* daemon not running; starting now at tcp:5037
* daemon started successfully
List of devices attached
R58M123ABC             device usb:1-1 product:beyond1qltexx model:SM_G973F device:beyond1q transport_id:1
emulator-5554          offline
ZY22ABCDEF             unauthorized usb:1-2 transport_id:3

";

    #[test]
    fn test_parse_bridge_devices() {
        let devices = parse_bridge_devices(ADB_OUTPUT);
        assert_eq!(devices.len(), 3);

        assert_eq!(devices[0].serial, "R58M123ABC");
        assert_eq!(devices[0].status, "device");
        assert_eq!(devices[0].model.as_deref(), Some("beyond1qltexx"));
        assert_eq!(devices[0].codename.as_deref(), Some("beyond1q"));
        assert!(devices[0].is_online());

        assert_eq!(devices[1].status, "offline");
        assert_eq!(devices[1].model, None);
        assert_eq!(devices[2].status, "unauthorized");
        assert_eq!(devices[2].codename, None);
    }

    #[test]
    fn test_single_token_line_is_skipped() {
        let devices = parse_bridge_devices("List of devices attached\ngarbage\nABC device\n");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].serial, "ABC");
    }

    #[test]
    fn test_parse_bootloader_devices() {
        let devices = parse_bootloader_devices("0123456789ABCDEF\tfastboot\n\n98765\tfastboot\n");
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].serial, "0123456789ABCDEF");
        assert_eq!(devices[0].status, "fastboot");
        assert_eq!(devices[0].model, None);
    }

    #[test]
    fn test_enumeration_is_capped() {
        let output: String = (0..20).map(|i| format!("SER{i}\tfastboot\n")).collect();
        assert_eq!(parse_bootloader_devices(&output).len(), MAX_DEVICES);
    }

    #[test]
    fn test_field_value_stops_at_comma() {
        assert_eq!(
            extract_field("X device product:foo,bar device:baz", "product:").as_deref(),
            Some("foo")
        );
    }

    #[test]
    fn test_display_name() {
        let mut device = Device::new("ABC", "device");
        assert_eq!(device.display_name(), "ABC");
        device.model = Some("Pixel_7".into());
        assert_eq!(device.display_name(), "Pixel 7 (ABC)");
    }
}
