// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Where scanned pages go: finished inline, or queued to a bounded pool of
// conversion workers so the scanner never waits for the encoder.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use scanhelper_core::error::{Result, ScanhelperError};
use scanhelper_core::types::{PageFinisher, PageJob};

/// Receives scanned pages from the controller.
pub trait PageSink {
    /// Accept one page.  Never blocks on earlier pages; an error may report
    /// a failure of an earlier page.
    fn page_scanned(&mut self, job: PageJob) -> Result<()>;

    /// Block until every accepted page is finished.
    fn drain(&mut self) -> Result<()>;
}

fn wrap(job: &PageJob, err: ScanhelperError) -> ScanhelperError {
    ScanhelperError::page_finish(job.path.display().to_string(), err)
}

/// Finishes each page before returning.
pub struct InlineSink {
    finisher: Arc<dyn PageFinisher>,
    finished: usize,
}

impl InlineSink {
    pub fn new(finisher: Arc<dyn PageFinisher>) -> Self {
        Self {
            finisher,
            finished: 0,
        }
    }

    pub fn finished(&self) -> usize {
        self.finished
    }
}

impl PageSink for InlineSink {
    fn page_scanned(&mut self, job: PageJob) -> Result<()> {
        self.finisher
            .finish_page(&job)
            .map_err(|e| wrap(&job, e))?;
        self.finished += 1;
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Finishes pages on up to `workers` blocking threads.
///
/// The queue is unbounded.  Failures surface on the next `page_scanned` or on
/// `drain`, naming the page that failed.
pub struct ConversionPool {
    runtime: Runtime,
    finisher: Arc<dyn PageFinisher>,
    pending: Vec<(PageJob, JoinHandle<Result<PathBuf>>)>,
    finished: usize,
}

impl ConversionPool {
    pub fn new(finisher: Arc<dyn PageFinisher>, workers: usize) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .max_blocking_threads(workers.max(1))
            .thread_name("scanhelper-convert")
            .build()?;
        info!(workers = workers.max(1), "conversion pool started");
        Ok(Self {
            runtime,
            finisher,
            pending: Vec::new(),
            finished: 0,
        })
    }

    /// Pages finished so far.
    pub fn finished(&self) -> usize {
        self.finished
    }

    /// Pages queued or in progress.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn settle(&mut self, job: &PageJob, handle: JoinHandle<Result<PathBuf>>) -> Result<()> {
        match self.runtime.block_on(handle) {
            Ok(Ok(path)) => {
                debug!(path = %path.display(), "background conversion done");
                self.finished += 1;
                Ok(())
            }
            Ok(Err(e)) => Err(wrap(job, e)),
            Err(join) => Err(wrap(job, ScanhelperError::Worker(join.to_string()))),
        }
    }

    /// Collect tasks that already ended, in submission order.
    fn reap(&mut self) -> Result<()> {
        let mut first_error = None;
        let pending = std::mem::take(&mut self.pending);
        for (job, handle) in pending {
            if !handle.is_finished() {
                self.pending.push((job, handle));
                continue;
            }
            if let Err(e) = self.settle(&job, handle) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl PageSink for ConversionPool {
    fn page_scanned(&mut self, job: PageJob) -> Result<()> {
        let finisher = Arc::clone(&self.finisher);
        let task_job = job.clone();
        let handle = self
            .runtime
            .spawn_blocking(move || finisher.finish_page(&task_job));
        self.pending.push((job, handle));
        self.reap()
    }

    #[instrument(skip(self), fields(pending = self.pending.len()))]
    fn drain(&mut self) -> Result<()> {
        let mut first_error = None;
        for (job, handle) in std::mem::take(&mut self.pending) {
            if let Err(e) = self.settle(&job, handle) {
                warn!(error = %e, "background conversion failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
