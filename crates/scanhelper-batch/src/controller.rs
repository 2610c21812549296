// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The batch control loop.
//
//   Idle -> WaitingForTrigger -> Scanning -> Finalizing -> WaitingForTrigger
//                         \                          \--> Done | Failed
//                          \--> Done (operator stop or interrupt)
//
// The request is never changed in place: each scanned page replaces it with
// its successor, so the start number and the remaining budget always describe
// the next page.  The page sink is drained whatever the run's outcome.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use scanhelper_core::error::Result;
use scanhelper_core::types::{BatchRequest, PageEvent, PageJob, ProcessOutcome};
use scanhelper_device::ScannerDevice;

use crate::button::{ButtonWaiter, Trigger};
use crate::cancel::CancelToken;
use crate::command::ToolOptions;
use crate::observer::{BatchObserver, ConsoleObserver};
use crate::parser::BatchLineParser;
use crate::pool::PageSink;
use crate::process::{ProcessChannel, ScanCommand};

/// Why a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    /// Every page of the budget was scanned.
    BudgetExhausted,
    /// The operator ended the prompt loop.
    OperatorStopped,
    /// The feeder was empty (or jammed) before the first page of a batch.
    NoDocuments,
    /// Interrupted by the operator.
    Cancelled,
}

/// Where the controller is in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    WaitingForTrigger,
    Scanning,
    Finalizing,
    Done(DoneReason),
    Failed,
}

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub pages: u32,
    pub batches: u32,
    /// Page number the next page would have had.
    pub next_start: u32,
    pub reason: DoneReason,
}

struct BatchResult {
    request: BatchRequest,
    pages: u32,
    outcome: ProcessOutcome,
    command: ScanCommand,
}

/// Runs batches until the budget is spent, the feeder is empty, or the
/// operator stops.
pub struct BatchController {
    channel: Box<dyn ProcessChannel>,
    waiter: ButtonWaiter,
    tool: ToolOptions,
    output_dir: PathBuf,
    observer: Arc<dyn BatchObserver>,
    cancel: CancelToken,
    state: BatchState,
}

impl BatchController {
    /// Pages are written to `output_dir`, which must also be the working
    /// directory of processes started through `channel`.
    pub fn new(
        channel: Box<dyn ProcessChannel>,
        waiter: ButtonWaiter,
        tool: ToolOptions,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            channel,
            waiter,
            tool,
            output_dir: output_dir.into(),
            observer: Arc::new(ConsoleObserver),
            cancel: CancelToken::new(),
            state: BatchState::Idle,
        }
    }

    pub fn with_observer(self, observer: Arc<dyn BatchObserver>) -> Self {
        Self { observer, ..self }
    }

    pub fn with_cancel(self, cancel: CancelToken) -> Self {
        Self { cancel, ..self }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Scan with `device` starting from `request`, handing pages to `sink`.
    #[instrument(skip_all, fields(device = %device.name(), start = request.start))]
    pub fn run(
        &mut self,
        device: &mut dyn ScannerDevice,
        request: BatchRequest,
        sink: &mut dyn PageSink,
    ) -> Result<RunSummary> {
        self.state = BatchState::Idle;
        let result = self.run_batches(device, request, sink);
        let drained = sink.drain();
        let result = match (result, drained) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
            (Err(e), Err(later)) => {
                warn!(error = %later, "page conversion failed after the run had failed");
                Err(e)
            }
        };
        match &result {
            Ok(summary) => {
                self.state = BatchState::Done(summary.reason);
                info!(
                    pages = summary.pages,
                    batches = summary.batches,
                    reason = ?summary.reason,
                    "scanning finished"
                );
            }
            Err(e) => {
                self.state = BatchState::Failed;
                error!(error = %e, "scanning failed");
            }
        }
        result
    }

    fn run_batches(
        &mut self,
        device: &mut dyn ScannerDevice,
        mut request: BatchRequest,
        sink: &mut dyn PageSink,
    ) -> Result<RunSummary> {
        self.waiter.validate(device)?;
        let mut pages = 0;
        let mut batches = 0;
        let summary = |request: &BatchRequest, pages, batches, reason| RunSummary {
            pages,
            batches,
            next_start: request.start,
            reason,
        };

        loop {
            if request.budget.is_exhausted() {
                return Ok(summary(&request, pages, batches, DoneReason::BudgetExhausted));
            }

            self.state = BatchState::WaitingForTrigger;
            if self.waiter.button().is_some() {
                device.reopen()?;
            }
            match self.waiter.wait(device, self.observer.as_ref(), &self.cancel)? {
                Trigger::Fired => {}
                Trigger::Stop => {
                    return Ok(summary(&request, pages, batches, DoneReason::OperatorStopped));
                }
                Trigger::Cancelled => {
                    info!("interrupted while waiting for the next batch");
                    return Ok(summary(&request, pages, batches, DoneReason::Cancelled));
                }
            }

            self.state = BatchState::Scanning;
            let batch = self.scan_batch(device, request, sink)?;
            batches += 1;
            pages += batch.pages;
            request = batch.request;

            if let ProcessOutcome::Fatal(exit) = &batch.outcome {
                if self.cancel.is_cancelled() {
                    warn!(?exit, "scanner tool failed after interrupt");
                    return Ok(summary(&request, pages, batches, DoneReason::Cancelled));
                }
            }
            let outcome = batch.outcome.into_result(&batch.command.to_string())?;
            if let ProcessOutcome::BenignStop(reason) = outcome {
                if batch.pages == 0 {
                    info!(?reason, "no documents to scan");
                    return Ok(summary(&request, pages, batches, DoneReason::NoDocuments));
                }
                info!(?reason, pages = batch.pages, "batch ended early");
            }
            if self.cancel.is_cancelled() {
                info!("interrupted; not starting another batch");
                return Ok(summary(&request, pages, batches, DoneReason::Cancelled));
            }
        }
    }

    /// Run one batch to completion.  The process is always waited for, even
    /// when a page fails, so no batch is ever cut short.
    fn scan_batch(
        &mut self,
        device: &mut dyn ScannerDevice,
        mut request: BatchRequest,
        sink: &mut dyn PageSink,
    ) -> Result<BatchResult> {
        device.close();
        let command = self.tool.command(device.name(), &request);
        self.observer.command_started(&command);
        let mut handle = self.channel.spawn(&command)?;

        let mut scanned = 0;
        let mut failure = None;
        for event in BatchLineParser::new(handle.as_mut(), self.observer.as_ref()) {
            let PageEvent(reported) = match event {
                Ok(event) => event,
                Err(e) => {
                    failure.get_or_insert(e);
                    continue;
                }
            };
            if failure.is_some() {
                continue;
            }
            if request.budget.is_exhausted() {
                warn!(page = reported, "tool reported more pages than the budget allows");
                continue;
            }
            if reported != request.start {
                warn!(reported, expected = request.start, "unexpected page number");
            }
            let job = PageJob::new(request.start, self.output_dir.join(request.filename()));
            debug!(page = job.page, path = %job.path.display(), "page scanned");
            if let Err(e) = sink.page_scanned(job) {
                failure = Some(e);
                continue;
            }
            request = request.after_page();
            scanned += 1;
        }

        self.state = BatchState::Finalizing;
        let outcome = handle.wait();
        if let Some(e) = failure {
            if let Err(later) = outcome {
                warn!(error = %later, "could not collect the scanner tool's exit status");
            }
            return Err(e);
        }
        let outcome = outcome?;
        Ok(BatchResult {
            request,
            pages: scanned,
            outcome,
            command,
        })
    }
}
