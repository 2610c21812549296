// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page events from the scanning tool's progress output.
//
// scanimage reports each finished page as `Scanned page N. (scanner status =
// S)` among free-form progress text.  Every line is echoed to the operator as
// it is pulled, matched or not, so the operator sees output in the order the
// tool produced it.

use std::sync::LazyLock;

use regex::Regex;

use scanhelper_core::error::{Result, ScanhelperError};
use scanhelper_core::types::PageEvent;

use crate::observer::BatchObserver;
use crate::process::ProcessHandle;

static SCANNED_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Scanned page ([0-9]*)").expect("page regex"));

/// Recognise a page-completion line.
///
/// Lines starting with `Scanned page ` but without a usable number are a
/// protocol violation.
pub fn parse_progress_line(line: &str) -> Result<Option<PageEvent>> {
    let Some(caps) = SCANNED_PAGE.captures(line) else {
        return Ok(None);
    };
    caps.get(1)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(|page| Some(PageEvent(page)))
        .ok_or_else(|| ScanhelperError::ProtocolViolation {
            line: line.to_owned(),
        })
}

/// Lazy sequence of page events from one process.
///
/// Ends when the process output ends.  A malformed page line yields an error
/// item; iteration may continue past it.
pub struct BatchLineParser<'a> {
    handle: &'a mut dyn ProcessHandle,
    observer: &'a dyn BatchObserver,
    finished: bool,
}

impl<'a> BatchLineParser<'a> {
    pub fn new(handle: &'a mut dyn ProcessHandle, observer: &'a dyn BatchObserver) -> Self {
        Self {
            handle,
            observer,
            finished: false,
        }
    }
}

impl Iterator for BatchLineParser<'_> {
    type Item = Result<PageEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let Some(line) = self.handle.read_line() else {
                self.finished = true;
                break;
            };
            self.observer.subprocess_line(&line);
            match parse_progress_line(&line) {
                Ok(None) => continue,
                Ok(Some(event)) => return Some(Ok(event)),
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}
