// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device capability traits.

use scanhelper_core::error::{Result, ScanhelperError};
use scanhelper_core::types::DeviceInfo;

/// A scanner with named boolean signals ("buttons").
///
/// The device and the scanning subprocess never use the hardware at the same
/// time: callers `close()` the device before spawning the tool and the device
/// reopens itself on the next `read_signal`, or explicitly via `reopen()`.
pub trait ScannerDevice {
    /// Identity of the device.
    fn info(&self) -> &DeviceInfo;

    /// Backend-qualified device name.
    fn name(&self) -> &str {
        &self.info().name
    }

    /// Names of all hardware signals, in device order.
    fn signals(&self) -> Vec<String>;

    /// Whether the device exposes a signal called `name`.
    fn has_signal(&self, name: &str) -> bool;

    /// Current value of a signal.  Reopens a closed device first.
    fn read_signal(&mut self, name: &str) -> Result<bool>;

    /// Release the hardware.  Idempotent.
    fn close(&mut self);

    /// Reacquire the hardware after `close()`.  Idempotent.
    fn reopen(&mut self) -> Result<()>;

    /// Whether the device currently holds the hardware.
    fn is_open(&self) -> bool;
}

/// Lists and opens scanners.
pub trait DeviceEnumerator {
    /// All devices the backend can see.
    fn list_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Open a device for button access.
    fn open(&self, info: DeviceInfo) -> Result<Box<dyn ScannerDevice>>;

    /// The options `device` adds to the tool's own, one per line.
    fn device_help(&self, device: &str) -> Result<String>;
}

/// Pick the device to use.
///
/// An explicit name always wins, even when enumeration does not list it
/// (network backends are often missing from the list).  Without a name the
/// only device present is used.
pub fn select_device(devices: &[DeviceInfo], requested: Option<&str>) -> Result<DeviceInfo> {
    if let Some(name) = requested {
        return Ok(devices
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .unwrap_or_else(|| DeviceInfo::named(name)));
    }
    match devices {
        [] => Err(ScanhelperError::NoDevices),
        [only] => Ok(only.clone()),
        many => Err(ScanhelperError::AmbiguousDevice(
            many.iter().map(|d| d.name.clone()).collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str) -> DeviceInfo {
        DeviceInfo {
            name: name.into(),
            vendor: "Noname".into(),
            model: "frontend-tester".into(),
            kind: "virtual device".into(),
        }
    }

    #[test]
    fn explicit_name_wins() {
        let devices = [device("test:0"), device("test:1")];
        assert_eq!(select_device(&devices, Some("test:1")).unwrap(), devices[1]);
        let unlisted = select_device(&devices, Some("net:host:epson")).unwrap();
        assert_eq!(unlisted.name, "net:host:epson");
        assert!(unlisted.vendor.is_empty());
    }

    #[test]
    fn single_device_is_chosen() {
        let devices = [device("test:0")];
        assert_eq!(select_device(&devices, None).unwrap().name, "test:0");
    }

    #[test]
    fn zero_or_many_devices_need_a_choice() {
        assert!(matches!(select_device(&[], None), Err(ScanhelperError::NoDevices)));
        let devices = [device("a"), device("b")];
        assert!(matches!(
            select_device(&devices, None),
            Err(ScanhelperError::AmbiguousDevice(names)) if names == ["a", "b"]
        ));
    }
}
