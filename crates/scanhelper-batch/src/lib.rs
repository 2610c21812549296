// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanhelper-batch — The batch-scanning control loop.
//
// One run is a sequence of batches.  Before each batch the controller waits
// for a trigger (a scanner button or the operator pressing Enter), then runs
// scanimage in a pseudo-terminal, echoes its output, and hands every page it
// reports to a page sink.  Batches end when the page budget is spent, the
// feeder runs dry, or the operator stops.

pub mod button;
pub mod cancel;
pub mod command;
pub mod controller;
pub mod observer;
pub mod parser;
pub mod pool;
pub mod process;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;

pub use button::{ButtonWaiter, Confirmation, StdinPrompt, Trigger};
pub use cancel::CancelToken;
pub use command::ToolOptions;
pub use controller::{BatchController, BatchState, DoneReason, RunSummary};
pub use observer::{BatchObserver, ConsoleObserver};
pub use parser::{BatchLineParser, parse_progress_line};
pub use pool::{ConversionPool, InlineSink, PageSink};
pub use process::{ProcessChannel, ProcessHandle, PtyChannel, ScanCommand};
