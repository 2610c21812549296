// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Waiting for the trigger that starts the next batch.

use std::io::{BufRead, BufReader, Stdin};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use tracing::debug;

use scanhelper_core::error::{Result, ScanhelperError};
use scanhelper_device::ScannerDevice;

use crate::cancel::CancelToken;
use crate::observer::BatchObserver;

/// Default interval between button reads.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What ended a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Scan the next batch.
    Fired,
    /// The operator ended the run (end of input).
    Stop,
    /// Interrupted.
    Cancelled,
}

/// Source of operator confirmations when no button is configured.
pub trait Confirmation {
    /// Block until the operator confirms, input ends, or `cancel` is set.
    fn confirm(&mut self, cancel: &CancelToken) -> Result<Trigger>;
}

/// Confirmation by pressing Enter on standard input (or any line source).
///
/// The input is read on a helper thread so that the wait can notice an
/// interrupt.
#[derive(Debug)]
pub struct StdinPrompt<R = BufReader<Stdin>> {
    source: Option<R>,
    lines: Option<Receiver<Option<String>>>,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self::from_reader(BufReader::new(std::io::stdin()))
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufRead + Send + 'static> StdinPrompt<R> {
    pub fn from_reader(source: R) -> Self {
        Self {
            source: Some(source),
            lines: None,
        }
    }

    fn lines(&mut self) -> Result<&Receiver<Option<String>>> {
        if let Some(mut source) = self.source.take() {
            let (tx, rx) = mpsc::channel();
            std::thread::Builder::new()
                .name("scanhelper-stdin".into())
                .spawn(move || {
                    let mut line = String::new();
                    loop {
                        line.clear();
                        let read = source.read_line(&mut line);
                        let item = match read {
                            Ok(0) | Err(_) => None,
                            Ok(_) => Some(line.trim_end().to_owned()),
                        };
                        let last = item.is_none();
                        if tx.send(item).is_err() || last {
                            break;
                        }
                    }
                })?;
            self.lines = Some(rx);
        }
        self.lines
            .as_ref()
            .ok_or_else(|| ScanhelperError::Worker("stdin reader unavailable".into()))
    }
}

impl<R: BufRead + Send + 'static> Confirmation for StdinPrompt<R> {
    fn confirm(&mut self, cancel: &CancelToken) -> Result<Trigger> {
        let lines = self.lines()?;
        loop {
            if cancel.is_cancelled() {
                return Ok(Trigger::Cancelled);
            }
            match lines.recv_timeout(POLL_INTERVAL) {
                Ok(Some(_)) => return Ok(Trigger::Fired),
                Ok(None) | Err(RecvTimeoutError::Disconnected) => return Ok(Trigger::Stop),
                Err(RecvTimeoutError::Timeout) => continue,
            }
        }
    }
}

/// Blocks until the next batch may start.
pub struct ButtonWaiter {
    button: Option<String>,
    poll_interval: Duration,
    confirmation: Box<dyn Confirmation>,
}

impl ButtonWaiter {
    /// Wait for `button`, or for `confirmation` when no button is given.
    pub fn new(button: Option<String>, confirmation: Box<dyn Confirmation>) -> Self {
        Self {
            button,
            poll_interval: POLL_INTERVAL,
            confirmation,
        }
    }

    pub fn with_poll_interval(self, poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..self
        }
    }

    pub fn button(&self) -> Option<&str> {
        self.button.as_deref()
    }

    /// Fail if the configured button does not exist on `device`.
    pub fn validate(&self, device: &dyn ScannerDevice) -> Result<()> {
        match &self.button {
            Some(name) if !device.has_signal(name) => {
                Err(ScanhelperError::NoSuchButton(name.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Block until triggered.  Polling is unbounded; only `cancel` ends it
    /// early.
    pub fn wait(
        &mut self,
        device: &mut dyn ScannerDevice,
        observer: &dyn BatchObserver,
        cancel: &CancelToken,
    ) -> Result<Trigger> {
        let Some(name) = self.button.clone() else {
            observer.notice("Press Enter to scan the next batch, or Ctrl-D to finish");
            return self.confirmation.confirm(cancel);
        };
        self.validate(device)?;
        observer.notice(&format!("Press {name:?} button to continue"));
        loop {
            if cancel.is_cancelled() {
                return Ok(Trigger::Cancelled);
            }
            if device.read_signal(&name)? {
                debug!(button = %name, "button pressed");
                return Ok(Trigger::Fired);
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}
