// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for scanhelper.

use thiserror::Error;

/// Top-level error type for all scanhelper operations.
#[derive(Debug, Error)]
pub enum ScanhelperError {
    // -- Device errors --
    #[error("no scanner devices")]
    NoDevices,

    #[error("please select a scanner device (found: {})", .0.join(", "))]
    AmbiguousDevice(Vec<String>),

    #[error("no such scanner device: {0}")]
    NoSuchDevice(String),

    #[error("no such button: {0:?}")]
    NoSuchButton(String),

    #[error("device query failed: {0}")]
    DeviceQuery(String),

    // -- External tool errors --
    #[error("{tool} is not installed; please install the {package} package")]
    ToolNotInstalled { tool: String, package: String },

    #[error("cannot start {command}: {detail}")]
    Spawn { command: String, detail: String },

    #[error("Command {command:?} returned non-zero exit status {code}")]
    SubprocessFailed { command: String, code: u32 },

    #[error("Command {command:?} was interrupted by signal {signal}")]
    SubprocessKilled { command: String, signal: String },

    #[error("unexpected progress line from scanner tool: {line:?}")]
    ProtocolViolation { line: String },

    // -- Page finishing errors --
    #[error("cannot finish page {filename}: {source}")]
    PageFinish {
        filename: String,
        #[source]
        source: Box<ScanhelperError>,
    },

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("metadata error: {0}")]
    Metadata(String),

    // -- Options / configuration --
    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("{0} option is not yet supported")]
    Unsupported(String),

    #[error("configuration error: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("background conversion failed: {0}")]
    Worker(String),
}

impl ScanhelperError {
    /// Process exit code for this error: `2` for bad option combinations,
    /// `1` for everything operational.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidOption(_) | Self::Unsupported(_) => 2,
            _ => 1,
        }
    }

    /// The external program `tool` could not be found on `PATH`.
    pub fn tool_not_installed(tool: &str) -> Self {
        let package = match tool {
            "scanimage" => "sane-utils",
            other => other,
        };
        Self::ToolNotInstalled {
            tool: tool.to_owned(),
            package: package.to_owned(),
        }
    }

    /// Wrap a page-finishing failure so the offending file can be named.
    pub fn page_finish(filename: impl Into<String>, source: ScanhelperError) -> Self {
        Self::PageFinish {
            filename: filename.into(),
            source: Box::new(source),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanhelperError>;
