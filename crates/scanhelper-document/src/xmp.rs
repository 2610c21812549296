// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// XMP sidecar metadata.
//
// With `--xmp` every finished page gets a companion `<image>.xmp` file
// describing when and with which scanner it was made.  `--reconstruct-xmp`
// writes the same sidecar for images that already exist, and
// `--override-xmp KEY=VALUE` replaces individual values where they cannot be
// recovered from the image itself (resolution, for instance).

use std::fmt::{Display, Write as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone};
use image::{ImageFormat, ImageReader};
use tracing::{debug, instrument};
use uuid::Uuid;

use scanhelper_core::error::{Result, ScanhelperError};
use scanhelper_core::types::DeviceInfo;

/// Keys accepted by `--override-xmp`, with their descriptions.
pub const DOCUMENTED_KEYS: [(&str, &str); 10] = [
    ("version", "version of scanhelper"),
    ("image_timestamp", "image creation date (e.g. 2005-09-07T15:01:43-07:00)"),
    ("metadata_timestamp", "metadata creation date (e.g. 2005-09-07T15:01:43-07:00)"),
    ("document_id", "document identifier (e.g. urn:uuid:...)"),
    ("media_type", "media type (e.g. image/png)"),
    ("device_vendor", "scanner vendor"),
    ("device_model", "scanner model"),
    ("width", "image width, in pixels"),
    ("height", "image height, in pixels"),
    ("dpi", "image resolution, in dots per inch"),
];

/// One `KEY=VALUE` override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmpOverride {
    pub key: String,
    pub value: String,
}

impl FromStr for XmpOverride {
    type Err = ScanhelperError;

    fn from_str(s: &str) -> Result<Self> {
        let (key, value) = s.split_once('=').ok_or_else(|| {
            ScanhelperError::Config(format!("XMP override {s:?} is not of the form KEY=VALUE"))
        })?;
        if !DOCUMENTED_KEYS.iter().any(|(k, _)| *k == key) {
            return Err(ScanhelperError::Config(format!("unknown XMP key {key:?}")));
        }
        Ok(Self {
            key: key.to_owned(),
            value: value.to_owned(),
        })
    }
}

/// The values written into a sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmpMetadata {
    pub version: String,
    pub image_timestamp: String,
    pub metadata_timestamp: String,
    pub document_id: String,
    pub media_type: String,
    pub device_vendor: String,
    pub device_model: String,
    pub width: u32,
    pub height: u32,
    pub dpi: Option<u32>,
}

impl XmpMetadata {
    /// Gather metadata for an existing image scanned with `device`.
    #[instrument(skip_all, fields(image = %image.display()))]
    pub fn for_image(image: &Path, device: &DeviceInfo) -> Result<Self> {
        let modified = std::fs::metadata(image)?.modified()?;
        let reader = ImageReader::open(image)?.with_guessed_format()?;
        let format = reader.format().ok_or_else(|| {
            ScanhelperError::Metadata(format!("{}: unrecognised image format", image.display()))
        })?;
        let (width, height) = reader.into_dimensions().map_err(|err| {
            ScanhelperError::Metadata(format!("{}: {err}", image.display()))
        })?;
        debug!(width, height, ?format, "image inspected");

        Ok(Self {
            version: format!("scanhelper {}", env!("CARGO_PKG_VERSION")),
            image_timestamp: rfc3339(&DateTime::<Local>::from(modified)),
            metadata_timestamp: rfc3339(&Local::now()),
            document_id: uuid_urn(),
            media_type: media_type(format).to_owned(),
            device_vendor: device.vendor.clone(),
            device_model: device.model.clone(),
            width,
            height,
            dpi: None,
        })
    }

    /// Apply `--override-xmp` values in order.
    pub fn apply_overrides(&mut self, overrides: &[XmpOverride]) -> Result<()> {
        for o in overrides {
            self.set(&o.key, &o.value)?;
        }
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let number = |v: &str| {
            v.parse::<u32>().map_err(|_| {
                ScanhelperError::Config(format!("XMP key {key:?} needs a number, got {v:?}"))
            })
        };
        match key {
            "version" => self.version = value.to_owned(),
            "image_timestamp" => self.image_timestamp = value.to_owned(),
            "metadata_timestamp" => self.metadata_timestamp = value.to_owned(),
            "document_id" => self.document_id = value.to_owned(),
            "media_type" => self.media_type = value.to_owned(),
            "device_vendor" => self.device_vendor = value.to_owned(),
            "device_model" => self.device_model = value.to_owned(),
            "width" => self.width = number(value)?,
            "height" => self.height = number(value)?,
            "dpi" if value.is_empty() => self.dpi = None,
            "dpi" => self.dpi = Some(number(value)?),
            other => return Err(ScanhelperError::Config(format!("unknown XMP key {other:?}"))),
        }
        Ok(())
    }

    /// Serialise as RDF/XML.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(1024);
        out.push_str(concat!(
            "<rdf:RDF\n",
            "    xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\"\n",
            "    xmlns:xmp=\"http://ns.adobe.com/xap/1.0/\"\n",
            "    xmlns:xmpMM=\"http://ns.adobe.com/xap/1.0/mm/\"\n",
            "    xmlns:dc=\"http://purl.org/dc/elements/1.1/\"\n",
            "    xmlns:tiff=\"http://ns.adobe.com/tiff/1.0/\"\n",
            ">\n",
            "    <rdf:Description rdf:about=\"\">\n",
        ));
        let mut field = |name: &str, value: &dyn Display| {
            let _ = writeln!(out, "        <{name}>{}</{name}>", escape(&value.to_string()));
        };
        field("xmp:CreatorTool", &self.version);
        field("xmp:CreateDate", &self.image_timestamp);
        field("xmp:MetadataDate", &self.metadata_timestamp);
        field("xmpMM:DocumentID", &self.document_id);
        field("xmpMM:InstanceID", &self.document_id);
        field("dc:format", &self.media_type);
        field("tiff:Make", &self.device_vendor);
        field("tiff:Model", &self.device_model);
        field("tiff:ImageWidth", &self.width);
        field("tiff:ImageHeight", &self.height);
        if let Some(dpi) = self.dpi {
            let rational = format!("{dpi}/1");
            field("tiff:XResolution", &rational);
            field("tiff:YResolution", &rational);
            field("tiff:ResolutionUnit", &2);
        }
        out.push_str("    </rdf:Description>\n</rdf:RDF>\n");
        out
    }

    /// Write `<image>.xmp` and return its path.
    pub fn write_sidecar(&self, image: &Path) -> Result<PathBuf> {
        let path = sidecar_path(image);
        std::fs::write(&path, self.render())?;
        debug!(path = %path.display(), "XMP sidecar written");
        Ok(path)
    }
}

/// `<image>.xmp`
pub fn sidecar_path(image: &Path) -> PathBuf {
    let mut raw = image.as_os_str().to_owned();
    raw.push(".xmp");
    PathBuf::from(raw)
}

/// RFC 3339 timestamp with whole seconds and an explicit offset.
pub fn rfc3339<Tz>(timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    timestamp.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// A fresh `urn:uuid:` identifier (random, version 4).
pub fn uuid_urn() -> String {
    Uuid::new_v4().urn().to_string()
}

/// Media type written to `dc:format`.
pub fn media_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Pnm => "image/x-portable-anymap",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Png => "image/png",
        other => other.to_mime_type(),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use image::{DynamicImage, GrayImage, Luma};
    use pretty_assertions::assert_eq;

    fn at(offset_secs: i32) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(offset_secs).unwrap();
        DateTime::from_timestamp(1_261_171_514, 0)
            .unwrap()
            .with_timezone(&offset)
    }

    fn metadata() -> XmpMetadata {
        XmpMetadata {
            version: "scanhelper 0.7.0".into(),
            image_timestamp: "2009-12-18T21:25:14+00:00".into(),
            metadata_timestamp: "2009-12-18T21:25:15+00:00".into(),
            document_id: "urn:uuid:00000000-0000-4000-8000-000000000000".into(),
            media_type: "image/png".into(),
            device_vendor: "Canon".into(),
            device_model: "LiDE <110>".into(),
            width: 2480,
            height: 3508,
            dpi: None,
        }
    }

    #[test]
    fn timestamps_carry_the_offset() {
        assert_eq!(rfc3339(&at(0)), "2009-12-18T21:25:14+00:00");
        assert_eq!(rfc3339(&at(3600)), "2009-12-18T22:25:14+01:00");
        assert_eq!(rfc3339(&at(-5 * 3600)), "2009-12-18T16:25:14-05:00");
        assert_eq!(rfc3339(&at(5 * 3600 + 45 * 60)), "2009-12-19T03:10:14+05:45");
    }

    #[test]
    fn uuid_urns_are_random_v4() {
        let a = uuid_urn();
        let b = uuid_urn();
        assert_ne!(a, b);
        let uuid = Uuid::parse_str(a.trim_start_matches("urn:uuid:")).unwrap();
        assert!(a.starts_with("urn:uuid:"));
        assert_eq!(uuid.get_version_num(), 4);
    }

    #[test]
    fn render_escapes_values() {
        let xml = metadata().render();
        assert!(xml.contains("<tiff:Model>LiDE &lt;110&gt;</tiff:Model>"));
        assert!(xml.contains("<tiff:ImageWidth>2480</tiff:ImageWidth>"));
        assert!(!xml.contains("XResolution"));
    }

    #[test]
    fn dpi_override_adds_resolution() {
        let mut meta = metadata();
        meta.apply_overrides(&["dpi=300".parse().unwrap()]).unwrap();
        let xml = meta.render();
        assert!(xml.contains("<tiff:XResolution>300/1</tiff:XResolution>"));
        assert!(xml.contains("<tiff:ResolutionUnit>2</tiff:ResolutionUnit>"));
    }

    #[test]
    fn overrides_are_validated() {
        assert!(matches!(
            "colour=red".parse::<XmpOverride>(),
            Err(ScanhelperError::Config(_))
        ));
        assert!(matches!(
            "dpi".parse::<XmpOverride>(),
            Err(ScanhelperError::Config(_))
        ));
        let mut meta = metadata();
        let bad: XmpOverride = "width=wide".parse().unwrap();
        assert!(meta.apply_overrides(&[bad]).is_err());
    }

    #[test]
    fn sidecar_for_real_image() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("p0001.png");
        DynamicImage::ImageLuma8(GrayImage::from_pixel(7, 5, Luma([128])))
            .save_with_format(&image, ImageFormat::Png)
            .unwrap();
        let device = DeviceInfo {
            name: "test:0".into(),
            vendor: "Noname".into(),
            model: "frontend-tester".into(),
            kind: "virtual device".into(),
        };

        let meta = XmpMetadata::for_image(&image, &device).unwrap();
        assert_eq!((meta.width, meta.height), (7, 5));
        assert_eq!(meta.media_type, "image/png");
        assert_eq!(meta.device_vendor, "Noname");

        let path = meta.write_sidecar(&image).unwrap();
        assert_eq!(path, dir.path().join("p0001.png.xmp"));
        let xml = std::fs::read_to_string(path).unwrap();
        assert!(xml.contains("<dc:format>image/png</dc:format>"));
    }
}
