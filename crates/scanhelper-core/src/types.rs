// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for batch scanning.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanhelperError};
use crate::template::FilenameTemplate;

/// Suffix appended to files the scanning tool writes before conversion.
pub const TEMPORARY_SUFFIX: &str = ".tmp.scanhelper~";

/// SANE status reported when the document feeder jammed.
pub const STATUS_JAMMED: u32 = 6;

/// SANE status reported when the document feeder ran empty.
pub const STATUS_NO_DOCS: u32 = 7;

/// A scanner as reported by device enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Backend-qualified device name, e.g. `genesys:libusb:001:004`.
    pub name: String,
    pub vendor: String,
    pub model: String,
    /// Device type, e.g. "flatbed scanner".
    pub kind: String,
}

impl DeviceInfo {
    /// Info for a device known only by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vendor: String::new(),
            model: String::new(),
            kind: String::new(),
        }
    }
}

/// File format of the finished pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Pnm,
    Tiff,
    Png,
}

impl OutputFormat {
    /// Whether the scanning tool writes this format itself.
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Pnm | Self::Tiff)
    }

    /// Value for the scanning tool's `--format=` option.  Non-native formats
    /// are scanned as TIFF and converted afterwards.
    pub fn tool_format(&self) -> &'static str {
        match self {
            Self::Pnm => "pnm",
            Self::Tiff | Self::Png => "tiff",
        }
    }

    /// Lowercase format name as accepted on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pnm => "pnm",
            Self::Tiff => "tiff",
            Self::Png => "png",
        }
    }

    /// Extension used by the default filename template.
    pub fn extension(&self) -> &'static str {
        &self.name()[..3]
    }

    /// IANA media type.
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Pnm => "image/x-portable-anymap",
            Self::Tiff => "image/tiff",
            Self::Png => "image/png",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ScanhelperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pnm" => Ok(Self::Pnm),
            "tiff" => Ok(Self::Tiff),
            "png" => Ok(Self::Png),
            other => Err(ScanhelperError::InvalidOption(format!(
                "unknown output format {other:?} (choose from pnm, tiff, png)"
            ))),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Remaining number of pages a run may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageBudget {
    Unlimited,
    Pages(u32),
}

impl PageBudget {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Pages(0))
    }

    /// The budget after one more page.  Never increases.
    pub fn after_one_page(self) -> Self {
        match self {
            Self::Unlimited => Self::Unlimited,
            Self::Pages(n) => Self::Pages(n.saturating_sub(1)),
        }
    }

    /// Finite remaining count, if any.
    pub fn remaining(&self) -> Option<u32> {
        match self {
            Self::Unlimited => None,
            Self::Pages(n) => Some(*n),
        }
    }
}

/// Immutable parameters of the next batch.
///
/// A request is never modified in place; after each scanned page the
/// controller derives the successor with [`BatchRequest::after_page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    /// Page number of the next page to be scanned.
    pub start: u32,
    /// Step between consecutive page numbers (2 for duplex-by-hand).
    pub increment: u32,
    /// Maximum pages in a single batch.
    pub batch_cap: Option<u32>,
    /// Pages still allowed in the whole run.
    pub budget: PageBudget,
    /// Template for output filenames.
    pub template: FilenameTemplate,
    /// Extra arguments passed to the scanning tool verbatim.
    pub extra_args: Vec<String>,
}

impl BatchRequest {
    pub fn new(template: FilenameTemplate) -> Self {
        Self {
            start: 1,
            increment: 1,
            batch_cap: None,
            budget: PageBudget::Unlimited,
            template,
            extra_args: Vec::new(),
        }
    }

    pub fn with_start(self, start: u32) -> Self {
        Self { start, ..self }
    }

    pub fn with_increment(self, increment: u32) -> Self {
        Self {
            increment: increment.max(1),
            ..self
        }
    }

    pub fn with_batch_cap(self, batch_cap: Option<u32>) -> Self {
        Self { batch_cap, ..self }
    }

    pub fn with_budget(self, budget: PageBudget) -> Self {
        Self { budget, ..self }
    }

    pub fn with_extra_args(self, extra_args: Vec<String>) -> Self {
        Self { extra_args, ..self }
    }

    /// Page count for the next batch: the smaller of the per-batch cap and the
    /// remaining budget, or `None` when both are unlimited.
    pub fn batch_count(&self) -> Option<u32> {
        match (self.batch_cap, self.budget.remaining()) {
            (Some(cap), Some(left)) => Some(cap.min(left)),
            (Some(cap), None) => Some(cap),
            (None, left) => left,
        }
    }

    /// Filename of the page about to be scanned.
    pub fn filename(&self) -> String {
        self.template.format(self.start)
    }

    /// The request that follows once the current page has been scanned.
    pub fn after_page(&self) -> Self {
        Self {
            start: self.start.saturating_add(self.increment),
            budget: self.budget.after_one_page(),
            ..self.clone()
        }
    }
}

/// One "Scanned page N" notification from the scanning tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEvent(pub u32);

/// Why the scanning tool ended a batch early without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    NoDocuments,
    Jammed,
}

/// How the scanning tool terminated, when that counts as a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalExit {
    Code(u32),
    Signal(String),
}

/// Result of waiting on the scanning tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Success,
    BenignStop(StopReason),
    Fatal(FatalExit),
}

impl ProcessOutcome {
    /// Classify a termination.  A signal wins over the exit code.
    pub fn from_exit(code: u32, signal: Option<&str>) -> Self {
        if let Some(signal) = signal {
            return Self::Fatal(FatalExit::Signal(signal.to_owned()));
        }
        match code {
            0 => Self::Success,
            STATUS_NO_DOCS => Self::BenignStop(StopReason::NoDocuments),
            STATUS_JAMMED => Self::BenignStop(StopReason::Jammed),
            other => Self::Fatal(FatalExit::Code(other)),
        }
    }

    /// Turn a fatal outcome into the error surfaced to the operator.
    pub fn into_result(self, command: &str) -> Result<Self> {
        match self {
            Self::Fatal(FatalExit::Code(code)) => Err(ScanhelperError::SubprocessFailed {
                command: command.to_owned(),
                code,
            }),
            Self::Fatal(FatalExit::Signal(signal)) => Err(ScanhelperError::SubprocessKilled {
                command: command.to_owned(),
                signal,
            }),
            other => Ok(other),
        }
    }
}

/// A scanned page handed to the page-completion hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageJob {
    /// Page number used in the filename.
    pub page: u32,
    /// Final output path.
    pub path: PathBuf,
}

impl PageJob {
    pub fn new(page: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            page,
            path: path.into(),
        }
    }

    /// Where the scanning tool left the raw file when conversion is needed.
    pub fn temporary_path(&self) -> PathBuf {
        temporary_path_for(&self.path)
    }
}

/// `<path>.tmp.scanhelper~`
pub fn temporary_path_for(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(TEMPORARY_SUFFIX);
    PathBuf::from(raw)
}

/// Page-completion hook: conversion and metadata for one scanned page.
///
/// Implementations must be shareable across conversion workers.
pub trait PageFinisher: Send + Sync {
    /// Finish the page and return the path of the final file.
    fn finish_page(&self, job: &PageJob) -> Result<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BatchRequest {
        BatchRequest::new(FilenameTemplate::default_for_extension("png"))
    }

    #[test]
    fn exit_codes_classify() {
        assert_eq!(ProcessOutcome::from_exit(0, None), ProcessOutcome::Success);
        assert_eq!(
            ProcessOutcome::from_exit(7, None),
            ProcessOutcome::BenignStop(StopReason::NoDocuments)
        );
        assert_eq!(
            ProcessOutcome::from_exit(6, None),
            ProcessOutcome::BenignStop(StopReason::Jammed)
        );
        assert_eq!(
            ProcessOutcome::from_exit(9, None),
            ProcessOutcome::Fatal(FatalExit::Code(9))
        );
        assert_eq!(
            ProcessOutcome::from_exit(0, Some("Killed")),
            ProcessOutcome::Fatal(FatalExit::Signal("Killed".into()))
        );
    }

    #[test]
    fn fatal_outcome_keeps_code_in_error() {
        let err = ProcessOutcome::from_exit(9, None)
            .into_result("scanimage --batch")
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("scanimage --batch"));
        assert!(text.contains('9'));
    }

    #[test]
    fn batch_count_takes_the_smaller_limit() {
        let r = request();
        assert_eq!(r.batch_count(), None);
        let r = r.with_batch_cap(Some(10));
        assert_eq!(r.batch_count(), Some(10));
        let r = r.with_budget(PageBudget::Pages(3));
        assert_eq!(r.batch_count(), Some(3));
        let r = r.with_batch_cap(None);
        assert_eq!(r.batch_count(), Some(3));
    }

    #[test]
    fn after_page_advances_start_and_spends_budget() {
        let r = request()
            .with_start(5)
            .with_increment(2)
            .with_budget(PageBudget::Pages(2));
        let next = r.after_page();
        assert_eq!(next.start, 7);
        assert_eq!(next.budget, PageBudget::Pages(1));
        let last = next.after_page().after_page();
        assert_eq!(last.start, 11);
        assert!(last.budget.is_exhausted());
        // The earlier request is untouched.
        assert_eq!(r.start, 5);
    }

    #[test]
    fn unlimited_budget_never_exhausts() {
        assert!(!PageBudget::Unlimited.after_one_page().is_exhausted());
    }

    #[test]
    fn output_format_details() {
        assert_eq!("PNG".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert!("jpeg".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Tiff.extension(), "tif");
        assert_eq!(OutputFormat::Png.tool_format(), "tiff");
        assert!(!OutputFormat::Png.is_native());
    }

    #[test]
    fn temporary_path_appends_suffix() {
        let job = PageJob::new(1, "out/p0001.png");
        assert_eq!(
            job.temporary_path(),
            PathBuf::from("out/p0001.png.tmp.scanhelper~")
        );
    }
}
