// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-facing output of a run.
//
// Diagnostics go through `tracing`; what the operator is meant to read while
// scanning (the tool's own output, prompts) goes through a `BatchObserver`
// handed to the controller.

use std::io::Write;

use crate::process::ScanCommand;

/// Receives everything the operator should see during a run.
pub trait BatchObserver {
    /// A scanning command is about to start.
    fn command_started(&self, command: &ScanCommand);

    /// One line of output from the scanning tool, in arrival order.
    fn subprocess_line(&self, line: &str);

    /// A message from scanhelper itself, such as a prompt.
    fn notice(&self, message: &str);
}

/// Writes to the terminal: tool output on stdout prefixed with `| `, the
/// command line on stderr prefixed with `+ `.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleObserver;

impl BatchObserver for ConsoleObserver {
    fn command_started(&self, command: &ScanCommand) {
        let _ = std::io::stdout().flush();
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "+ {command}");
    }

    fn subprocess_line(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.flush();
        let _ = writeln!(out, "| {line}");
        let _ = out.flush();
    }

    fn notice(&self, message: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{message}");
        let _ = out.flush();
    }
}
