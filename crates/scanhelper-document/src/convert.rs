// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion of raw scanner output into the requested output format.
//
// The scanning tool only writes PNM and TIFF.  For any other format it writes
// `<filename>.tmp.scanhelper~`, which is decoded here (format guessed from the
// content, not the name) and re-encoded as `<filename>`.  The temporary file
// is removed only once the final file is known to exist.

use std::path::Path;

use image::{ImageFormat, ImageReader};
use tracing::{debug, instrument};

use scanhelper_core::error::{Result, ScanhelperError};
use scanhelper_core::types::{OutputFormat, temporary_path_for};

/// `image` crate format for an output format.
pub fn image_format(format: OutputFormat) -> ImageFormat {
    match format {
        OutputFormat::Pnm => ImageFormat::Pnm,
        OutputFormat::Tiff => ImageFormat::Tiff,
        OutputFormat::Png => ImageFormat::Png,
    }
}

/// Convert the temporary file belonging to `target` into `target`.
pub fn convert_page(target: &Path, format: OutputFormat) -> Result<()> {
    convert_to(target, image_format(format))
}

/// Like [`convert_page`], with the format taken from `target`'s extension.
pub fn convert_by_extension(target: &Path) -> Result<()> {
    let format = ImageFormat::from_path(target).map_err(|err| {
        ScanhelperError::ImageError(format!("{}: {err}", target.display()))
    })?;
    convert_to(target, format)
}

#[instrument(skip_all, fields(target = %target.display(), ?format))]
fn convert_to(target: &Path, format: ImageFormat) -> Result<()> {
    let temporary = temporary_path_for(target);
    debug!(source = %temporary.display(), "converting page");

    let image = ImageReader::open(&temporary)?
        .with_guessed_format()?
        .decode()
        .map_err(|err| {
            ScanhelperError::ImageError(format!(
                "failed to decode {}: {err}",
                temporary.display()
            ))
        })?;

    image
        .save_with_format(target, format)
        .map_err(|err| {
            ScanhelperError::ImageError(format!("failed to write {}: {err}", target.display()))
        })?;

    // The final file must exist before the raw one goes.
    std::fs::metadata(target)?;
    std::fs::remove_file(&temporary)?;
    debug!(width = image.width(), height = image.height(), "page converted");
    Ok(())
}
