// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory device with scripted button readings.

use std::collections::{BTreeMap, VecDeque};

use scanhelper_core::error::{Result, ScanhelperError};
use scanhelper_core::types::DeviceInfo;

/// A device whose buttons return pre-recorded values.
///
/// Each `read_signal` pops the next scripted value for that button; once the
/// script is used up the last value repeats (or `false` if none was given).
#[derive(Debug, Clone)]
pub struct MemoryDevice {
    info: DeviceInfo,
    scripts: BTreeMap<String, VecDeque<bool>>,
    last: BTreeMap<String, bool>,
    open: bool,
    /// Number of `read_signal` calls, across all buttons.
    pub reads: usize,
    /// Number of `close()` calls that released an open device.
    pub closes: usize,
}

impl MemoryDevice {
    pub fn new(name: &str) -> Self {
        Self {
            info: DeviceInfo {
                name: name.to_owned(),
                vendor: "Noname".into(),
                model: "memory".into(),
                kind: "virtual device".into(),
            },
            scripts: BTreeMap::new(),
            last: BTreeMap::new(),
            open: true,
            reads: 0,
            closes: 0,
        }
    }

    /// Add a button that reads `values` in order.
    pub fn with_button(mut self, name: &str, values: impl IntoIterator<Item = bool>) -> Self {
        self.scripts.insert(name.to_owned(), values.into_iter().collect());
        self.last.insert(name.to_owned(), false);
        self
    }
}

impl crate::traits::ScannerDevice for MemoryDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn signals(&self) -> Vec<String> {
        self.scripts.keys().cloned().collect()
    }

    fn has_signal(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    fn read_signal(&mut self, name: &str) -> Result<bool> {
        self.reopen()?;
        self.reads += 1;
        let script = self
            .scripts
            .get_mut(name)
            .ok_or_else(|| ScanhelperError::NoSuchButton(name.to_owned()))?;
        let last = self.last.entry(name.to_owned()).or_insert(false);
        if let Some(value) = script.pop_front() {
            *last = value;
        }
        Ok(*last)
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.closes += 1;
        }
    }

    fn reopen(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ScannerDevice;

    #[test]
    fn script_then_repeat_last() {
        let mut dev = MemoryDevice::new("mem").with_button("scan", [false, true]);
        assert!(!dev.read_signal("scan").unwrap());
        assert!(dev.read_signal("scan").unwrap());
        assert!(dev.read_signal("scan").unwrap());
        assert_eq!(dev.reads, 3);
    }

    #[test]
    fn read_reopens_closed_device() {
        let mut dev = MemoryDevice::new("mem").with_button("scan", [true]);
        dev.close();
        dev.close();
        assert_eq!(dev.closes, 1);
        assert!(!dev.is_open());
        dev.read_signal("scan").unwrap();
        assert!(dev.is_open());
    }

    #[test]
    fn unknown_button_errors() {
        let mut dev = MemoryDevice::new("mem");
        assert!(!dev.has_signal("scan"));
        assert!(matches!(
            dev.read_signal("scan"),
            Err(ScanhelperError::NoSuchButton(_))
        ));
    }
}
