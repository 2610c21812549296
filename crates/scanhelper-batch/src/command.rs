// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanimage command lines.

use scanhelper_core::types::{BatchRequest, OutputFormat, TEMPORARY_SUFFIX};
use scanhelper_device::scanimage::SCANIMAGE;

use crate::process::ScanCommand;

/// Options that stay the same for every batch of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOptions {
    pub program: String,
    pub output_format: OutputFormat,
    pub icc_profile: Option<String>,
    pub accept_md5_only: bool,
    pub progress: bool,
    pub verbose: bool,
    /// Input buffer size in kB.
    pub buffer_size: Option<u32>,
}

impl ToolOptions {
    pub fn new(output_format: OutputFormat) -> Self {
        Self {
            program: SCANIMAGE.to_owned(),
            output_format,
            icc_profile: None,
            accept_md5_only: false,
            progress: false,
            verbose: false,
            buffer_size: None,
        }
    }

    /// The command scanning the batch described by `request` on `device`.
    ///
    /// Formats the tool cannot write are scanned as TIFF into temporary files
    /// named after the final ones.
    pub fn command(&self, device: &str, request: &BatchRequest) -> ScanCommand {
        let suffix = if self.output_format.is_native() {
            ""
        } else {
            TEMPORARY_SUFFIX
        };
        let mut args = vec![
            "--device-name".to_owned(),
            device.to_owned(),
            format!("--format={}", self.output_format.tool_format()),
        ];
        if let Some(profile) = &self.icc_profile {
            args.push("--icc-profile".to_owned());
            args.push(profile.clone());
        }
        args.push(format!("--batch={}{suffix}", request.template));
        args.push(format!("--batch-start={}", request.start));
        if let Some(count) = request.batch_count() {
            args.push(format!("--batch-count={count}"));
        }
        if request.increment > 1 {
            args.push(format!("--batch-increment={}", request.increment));
        }
        if self.accept_md5_only {
            args.push("--accept-md5-only".to_owned());
        }
        if self.progress {
            args.push("--progress".to_owned());
        }
        if self.verbose {
            args.push("--verbose".to_owned());
        }
        if let Some(size) = self.buffer_size {
            args.push(format!("--buffer-size={size}"));
        }
        args.extend(request.extra_args.iter().cloned());
        ScanCommand::new(&self.program, args)
    }
}
