// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted stand-ins for the scanner tool, the operator, and page finishing.
//
// Every collaborator of the controller has a scripted double here so that
// whole runs can be replayed without a scanner or a terminal.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scanhelper_core::error::{Result, ScanhelperError};
use scanhelper_core::types::{PageFinisher, PageJob, ProcessOutcome};

use crate::button::{Confirmation, Trigger};
use crate::cancel::CancelToken;
use crate::observer::BatchObserver;
use crate::pool::PageSink;
use crate::process::{ProcessChannel, ProcessHandle, ScanCommand};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Output and exit status of one scripted process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedRun {
    pub lines: Vec<String>,
    pub code: u32,
    pub signal: Option<String>,
    /// `wait` fails instead of reporting an exit status.
    pub status_lost: bool,
}

impl ScriptedRun {
    /// A process printing `lines` and exiting with status 0.
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            code: 0,
            signal: None,
            status_lost: false,
        }
    }

    /// A process printing `Scanned page N` for each of `pages`.
    pub fn pages(pages: impl IntoIterator<Item = u32>) -> Self {
        Self::lines(pages.into_iter().flat_map(|n| {
            [
                format!("Scanning page {n}"),
                format!("Scanned page {n}. (scanner status = 5)"),
            ]
        }))
    }

    pub fn exit(self, code: u32) -> Self {
        Self { code, ..self }
    }

    pub fn killed(self, signal: &str) -> Self {
        Self {
            signal: Some(signal.to_owned()),
            ..self
        }
    }

    pub fn status_lost(self) -> Self {
        Self {
            status_lost: true,
            ..self
        }
    }

    pub fn into_handle(self) -> ScriptedHandle {
        ScriptedHandle {
            lines: self.lines.into(),
            code: self.code,
            signal: self.signal,
            status_lost: self.status_lost,
        }
    }
}

/// A running scripted process.
#[derive(Debug)]
pub struct ScriptedHandle {
    lines: VecDeque<String>,
    code: u32,
    signal: Option<String>,
    status_lost: bool,
}

impl ProcessHandle for ScriptedHandle {
    fn read_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    fn wait(self: Box<Self>) -> Result<ProcessOutcome> {
        if self.status_lost {
            return Err(ScanhelperError::Io(std::io::Error::other("no child process")));
        }
        Ok(ProcessOutcome::from_exit(self.code, self.signal.as_deref()))
    }
}

/// Hands out scripted processes in order and records what was spawned.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    runs: VecDeque<ScriptedRun>,
    spawned: Arc<Mutex<Vec<ScanCommand>>>,
    missing_tool: bool,
}

impl ScriptedChannel {
    pub fn new(runs: impl IntoIterator<Item = ScriptedRun>) -> Self {
        Self {
            runs: runs.into_iter().collect(),
            ..Self::default()
        }
    }

    /// A channel whose tool is not installed.
    pub fn missing_tool() -> Self {
        Self {
            missing_tool: true,
            ..Self::default()
        }
    }

    /// Shared log of spawned commands, readable after the channel moved.
    pub fn spawned(&self) -> Arc<Mutex<Vec<ScanCommand>>> {
        Arc::clone(&self.spawned)
    }
}

impl ProcessChannel for ScriptedChannel {
    fn spawn(&mut self, command: &ScanCommand) -> Result<Box<dyn ProcessHandle>> {
        if self.missing_tool {
            return Err(ScanhelperError::tool_not_installed(&command.program));
        }
        let run = self.runs.pop_front().ok_or_else(|| ScanhelperError::Spawn {
            command: command.to_string(),
            detail: "no scripted run left".into(),
        })?;
        lock(&self.spawned).push(command.clone());
        Ok(Box::new(run.into_handle()))
    }
}

/// Something the observer was told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Command(String),
    Line(String),
    Notice(String),
}

/// Remembers everything shown to the operator.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    /// Everything observed so far, clearing the record.
    pub fn take(&self) -> Vec<Observed> {
        std::mem::take(&mut *lock(&self.seen))
    }
}

impl BatchObserver for RecordingObserver {
    fn command_started(&self, command: &ScanCommand) {
        lock(&self.seen).push(Observed::Command(command.to_string()));
    }

    fn subprocess_line(&self, line: &str) {
        lock(&self.seen).push(Observed::Line(line.to_owned()));
    }

    fn notice(&self, message: &str) {
        lock(&self.seen).push(Observed::Notice(message.to_owned()));
    }
}

/// Answers confirmations from a list, then stops.
#[derive(Debug, Default)]
pub struct ScriptedConfirmation {
    answers: VecDeque<Trigger>,
    /// Cancel this token when the answers run out.
    cancel_when_done: Option<CancelToken>,
}

impl ScriptedConfirmation {
    pub fn new(answers: impl IntoIterator<Item = Trigger>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            cancel_when_done: None,
        }
    }

    /// Confirm `batches` times.
    pub fn times(batches: usize) -> Self {
        Self::new(std::iter::repeat_n(Trigger::Fired, batches))
    }

    /// Simulate an interrupt arriving while the last confirmed batch runs.
    pub fn then_interrupt(self, token: CancelToken) -> Self {
        Self {
            cancel_when_done: Some(token),
            ..self
        }
    }
}

impl Confirmation for ScriptedConfirmation {
    fn confirm(&mut self, cancel: &CancelToken) -> Result<Trigger> {
        if cancel.is_cancelled() {
            return Ok(Trigger::Cancelled);
        }
        let answer = self.answers.pop_front().unwrap_or(Trigger::Stop);
        if self.answers.is_empty() {
            if let Some(token) = &self.cancel_when_done {
                token.cancel();
            }
        }
        Ok(answer)
    }
}

/// Records finished pages; optionally fails one page.
#[derive(Debug, Default)]
pub struct RecordingFinisher {
    pages: Mutex<Vec<u32>>,
    fail_on: Option<u32>,
}

impl RecordingFinisher {
    pub fn failing_on(page: u32) -> Self {
        Self {
            fail_on: Some(page),
            ..Self::default()
        }
    }

    /// Pages seen, in call order.
    pub fn pages(&self) -> Vec<u32> {
        lock(&self.pages).clone()
    }
}

impl PageFinisher for RecordingFinisher {
    fn finish_page(&self, job: &PageJob) -> Result<PathBuf> {
        lock(&self.pages).push(job.page);
        if self.fail_on == Some(job.page) {
            return Err(ScanhelperError::ImageError("scripted failure".into()));
        }
        Ok(job.path.clone())
    }
}

/// Collects jobs without finishing them.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub jobs: Vec<PageJob>,
    pub drains: usize,
    pub fail_on: Option<u32>,
}

impl PageSink for RecordingSink {
    fn page_scanned(&mut self, job: PageJob) -> Result<()> {
        let page = job.page;
        let path = job.path.display().to_string();
        self.jobs.push(job);
        if self.fail_on == Some(page) {
            return Err(ScanhelperError::page_finish(
                path,
                ScanhelperError::ImageError("scripted failure".into()),
            ));
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        self.drains += 1;
        Ok(())
    }
}
