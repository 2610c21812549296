// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recovery of raw scans left behind by interrupted runs.

use std::path::Path;

use tracing::{info, instrument};
use walkdir::WalkDir;

use scanhelper_core::error::Result;
use scanhelper_core::types::TEMPORARY_SUFFIX;

use crate::convert::convert_by_extension;

/// Convert every `*.tmp.scanhelper~` file under `root` into the file it was
/// meant to become.  Returns how many files were converted.
#[instrument]
pub fn clean_temporary_files(root: &Path) -> Result<usize> {
    let mut converted = 0;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(target) = path
            .to_str()
            .and_then(|p| p.strip_suffix(TEMPORARY_SUFFIX))
        else {
            continue;
        };
        info!(file = target, "converting left-over scan");
        convert_by_extension(Path::new(target))?;
        converted += 1;
    }
    Ok(converted)
}

/// Operator message for a cleanup count.
pub fn describe_count(count: usize) -> String {
    match count {
        0 => "No files have been converted".to_owned(),
        1 => "1 file has been converted".to_owned(),
        n => format!("{n} files have been converted"),
    }
}
