// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The page-completion hook used by real scans.

use std::path::PathBuf;

use tracing::debug;

use scanhelper_core::error::Result;
use scanhelper_core::types::{DeviceInfo, OutputFormat, PageFinisher, PageJob};

use crate::convert::convert_page;
use crate::xmp::{XmpMetadata, XmpOverride};

#[derive(Debug, Clone)]
struct XmpSettings {
    device: DeviceInfo,
    overrides: Vec<XmpOverride>,
}

/// Converts non-native formats and optionally writes XMP sidecars.
#[derive(Debug, Clone)]
pub struct DocumentFinisher {
    format: OutputFormat,
    xmp: Option<XmpSettings>,
}

impl DocumentFinisher {
    pub fn new(format: OutputFormat) -> Self {
        Self { format, xmp: None }
    }

    /// Also write `<page>.xmp` describing the page and `device`.
    pub fn with_xmp(self, device: DeviceInfo, overrides: Vec<XmpOverride>) -> Self {
        Self {
            xmp: Some(XmpSettings { device, overrides }),
            ..self
        }
    }
}

impl PageFinisher for DocumentFinisher {
    fn finish_page(&self, job: &PageJob) -> Result<PathBuf> {
        if !self.format.is_native() {
            convert_page(&job.path, self.format)?;
        }
        if let Some(settings) = &self.xmp {
            let mut meta = XmpMetadata::for_image(&job.path, &settings.device)?;
            meta.apply_overrides(&settings.overrides)?;
            meta.write_sidecar(&job.path)?;
        }
        debug!(page = job.page, path = %job.path.display(), "page finished");
        Ok(job.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use scanhelper_core::types::temporary_path_for;

    fn raw_page(dir: &std::path::Path, name: &str) -> PageJob {
        let job = PageJob::new(1, dir.join(name));
        DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([0, 0, 255])))
            .save_with_format(temporary_path_for(&job.path), ImageFormat::Tiff)
            .unwrap();
        job
    }

    #[test]
    fn png_pages_are_converted_with_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let job = raw_page(dir.path(), "p0001.png");
        let finisher = DocumentFinisher::new(OutputFormat::Png).with_xmp(
            DeviceInfo::named("test:0"),
            vec!["dpi=150".parse().unwrap()],
        );

        let path = finisher.finish_page(&job).unwrap();

        assert_eq!(path, job.path);
        assert!(path.exists());
        let xmp = std::fs::read_to_string(dir.path().join("p0001.png.xmp")).unwrap();
        assert!(xmp.contains("<tiff:XResolution>150/1</tiff:XResolution>"));
    }

    #[test]
    fn native_pages_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let job = PageJob::new(4, dir.path().join("p0004.pnm"));
        std::fs::write(&job.path, b"P1\n1 1\n0\n").unwrap();

        DocumentFinisher::new(OutputFormat::Pnm).finish_page(&job).unwrap();

        assert_eq!(std::fs::read(&job.path).unwrap(), b"P1\n1 1\n0\n");
        assert!(!dir.path().join("p0004.pnm.xmp").exists());
    }

    #[test]
    fn missing_raw_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let job = PageJob::new(2, dir.path().join("p0002.png"));
        assert!(DocumentFinisher::new(OutputFormat::Png).finish_page(&job).is_err());
    }
}
