// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanhelper-device — Scanner enumeration and button capabilities.
//
// The batch loop only needs to know which named buttons a scanner has and
// whether one is currently pressed.  `ScanimageDevice` answers those questions
// by asking the scanimage tool; `MemoryDevice` answers them from a script and
// backs the tests of every crate that drives a device.

pub mod memory;
pub mod scanimage;
pub mod traits;

pub use memory::MemoryDevice;
pub use scanimage::{ScanimageDevice, ScanimageTool};
pub use traits::{DeviceEnumerator, ScannerDevice, select_device};
