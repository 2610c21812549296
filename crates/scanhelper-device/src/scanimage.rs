// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device access through the scanimage command-line tool.
//
// scanimage prints every option of a device with `--all-options`; options
// the backend marks as hardware-selected are the scanner's buttons and
// sensors, and the bracketed value after the option is its current state:
//
//     --button[=(yes|no)] [no] [hardware]
//
// Nothing here keeps the device open between calls, so releasing the device
// for the scanning subprocess is only bookkeeping.

use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};

use scanhelper_core::error::{Result, ScanhelperError};
use scanhelper_core::types::DeviceInfo;

use crate::traits::{DeviceEnumerator, ScannerDevice};

/// Name of the scanning tool on `PATH`.
pub const SCANIMAGE: &str = "scanimage";

/// Device list format: name, vendor, model, type separated by tabs.
const DEVICE_LIST_FORMAT: &str = "%d\t%v\t%m\t%t%n";

static OPTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+--?([A-Za-z0-9][A-Za-z0-9_-]*)(.*)$").expect("option line regex")
});

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\[([^\]]*)\]").expect("bracketed value regex"));

/// A hardware-selected option and its current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareOption {
    pub name: String,
    pub value: Option<String>,
}

impl HardwareOption {
    /// Buttons and sensors report `yes` while active.
    pub fn is_active(&self) -> bool {
        self.value.as_deref() == Some("yes")
    }
}

/// Runs scanimage queries.
#[derive(Debug, Clone)]
pub struct ScanimageTool {
    program: String,
}

impl Default for ScanimageTool {
    fn default() -> Self {
        Self::new(SCANIMAGE)
    }
}

impl ScanimageTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run the tool and return its standard output.
    ///
    /// A missing binary becomes `ToolNotInstalled`; a non-zero exit becomes
    /// `DeviceQuery` carrying the tool's error output.
    fn run(&self, args: &[&str]) -> Result<String> {
        debug!(program = %self.program, ?args, "querying scanner tool");
        let output = Command::new(&self.program).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanhelperError::tool_not_installed(&self.program)
            } else {
                ScanhelperError::Spawn {
                    command: self.program.clone(),
                    detail: e.to_string(),
                }
            }
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanhelperError::DeviceQuery(format!(
                "{} {}: {}",
                self.program,
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Current hardware options of `device`.
    #[instrument(skip(self))]
    pub fn hardware_options(&self, device: &str) -> Result<Vec<HardwareOption>> {
        let text = self
            .run(&["--device-name", device, "--all-options"])
            .map_err(|e| match e {
                ScanhelperError::DeviceQuery(detail) => {
                    warn!(%detail, "device did not answer option query");
                    ScanhelperError::NoSuchDevice(device.to_owned())
                }
                other => other,
            })?;
        Ok(parse_hardware_options(&text))
    }
}

impl DeviceEnumerator for ScanimageTool {
    #[instrument(skip(self))]
    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let format = format!("--formatted-device-list={DEVICE_LIST_FORMAT}");
        let text = self.run(&[&format])?;
        let devices = parse_device_list(&text);
        debug!(count = devices.len(), "devices listed");
        Ok(devices)
    }

    fn open(&self, info: DeviceInfo) -> Result<Box<dyn ScannerDevice>> {
        Ok(Box::new(ScanimageDevice::open(self.clone(), info)?))
    }

    #[instrument(skip(self))]
    fn device_help(&self, device: &str) -> Result<String> {
        let text = self.run(&["--device-name", device, "--help"])?;
        Ok(extract_device_help(&text))
    }
}

/// A scanner whose buttons are read through scanimage.
#[derive(Debug)]
pub struct ScanimageDevice {
    tool: ScanimageTool,
    info: DeviceInfo,
    signals: Vec<String>,
    open: bool,
}

impl ScanimageDevice {
    /// Query the device once to learn its buttons.  Fails with
    /// `NoSuchDevice` if the backend cannot open it.
    pub fn open(tool: ScanimageTool, info: DeviceInfo) -> Result<Self> {
        let signals = tool
            .hardware_options(&info.name)?
            .into_iter()
            .map(|opt| opt.name)
            .collect();
        Ok(Self {
            tool,
            info,
            signals,
            open: true,
        })
    }
}

impl ScannerDevice for ScanimageDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn signals(&self) -> Vec<String> {
        self.signals.clone()
    }

    fn has_signal(&self, name: &str) -> bool {
        self.signals.iter().any(|s| s == name)
    }

    fn read_signal(&mut self, name: &str) -> Result<bool> {
        if !self.has_signal(name) {
            return Err(ScanhelperError::NoSuchButton(name.to_owned()));
        }
        self.reopen()?;
        let options = self.tool.hardware_options(&self.info.name)?;
        Ok(options
            .iter()
            .find(|opt| opt.name == name)
            .is_some_and(HardwareOption::is_active))
    }

    fn close(&mut self) {
        if self.open {
            debug!(device = %self.info.name, "releasing device");
            self.open = false;
        }
    }

    fn reopen(&mut self) -> Result<()> {
        if !self.open {
            debug!(device = %self.info.name, "reacquiring device");
            self.open = true;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Parse `--formatted-device-list` output.
pub fn parse_device_list(text: &str) -> Vec<DeviceInfo> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.split('\t');
            let mut next = || fields.next().unwrap_or_default().trim().to_owned();
            DeviceInfo {
                name: next(),
                vendor: next(),
                model: next(),
                kind: next(),
            }
        })
        .collect()
}

/// Extract hardware-selected options from `--all-options` output.
pub fn parse_hardware_options(text: &str) -> Vec<HardwareOption> {
    text.lines()
        .filter_map(|line| {
            let caps = OPTION_LINE.captures(line)?;
            let name = caps.get(1)?.as_str();
            let rest = caps.get(2).map_or("", |m| m.as_str());
            let brackets: Vec<&str> = BRACKETED
                .captures_iter(rest)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .collect();
            let hardware = brackets.contains(&"hardware");
            if !hardware && name != "button" {
                return None;
            }
            let value = brackets
                .first()
                .filter(|v| **v != "hardware")
                .map(|v| (*v).to_owned());
            Some(HardwareOption {
                name: name.to_owned(),
                value,
            })
        })
        .collect()
}

/// Keep the "Options specific to device" block of `--help` output.
pub fn extract_device_help(text: &str) -> String {
    let mut lines = text
        .lines()
        .skip_while(|line| !line.starts_with("Options specific to device"));
    lines.next();
    let mut out = String::new();
    for line in lines.take_while(|line| !line.trim().is_empty()) {
        out.push_str(line);
        out.push('\n');
    }
    out
}
