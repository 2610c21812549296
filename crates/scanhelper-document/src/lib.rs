// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanhelper-document — Everything that happens to a page after the scanner
// wrote it: format conversion, XMP sidecar metadata, and cleanup of
// temporary files left behind by interrupted runs.

pub mod clean;
pub mod convert;
pub mod finisher;
pub mod xmp;

pub use clean::{clean_temporary_files, describe_count};
pub use convert::convert_page;
pub use finisher::DocumentFinisher;
pub use xmp::{XmpMetadata, XmpOverride};
