// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Time-based output directories.

use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use tracing::debug;

use scanhelper_core::error::{Result, ScanhelperError};

/// Longest letter suffix tried before giving up.
const MAX_SUFFIX: u32 = 3;

/// Directory name prefix for `--target-directory-prefix`: a prefix ending in
/// a letter or digit is separated from the timestamp with `-`.
pub fn directory_prefix(prefix: Option<&str>) -> String {
    match prefix {
        Some(p) if p.chars().last().is_some_and(char::is_alphanumeric) => format!("{p}-"),
        Some(p) => p.to_owned(),
        None => String::new(),
    }
}

/// Suffixes "", "a".."z", "aa".."zz", "aaa".."zzz", in that order.
fn suffixes() -> impl Iterator<Item = String> {
    (0..=MAX_SUFFIX).flat_map(|len| {
        (0..26usize.pow(len)).map(move |mut n| {
            let mut letters = vec!['a'; len as usize];
            for slot in letters.iter_mut().rev() {
                *slot = char::from(b'a' + (n % 26) as u8);
                n /= 26;
            }
            letters.into_iter().collect::<String>()
        })
    })
}

/// Create `<prefix>YYYY-MM-DDTHH:MM:SS<suffix>` for the first suffix whose
/// directory does not exist yet.
pub fn create_unique_directory(prefix: &str, now: NaiveDateTime) -> Result<PathBuf> {
    let stem = format!("{prefix}{}", now.format("%Y-%m-%dT%H:%M:%S"));
    for suffix in suffixes() {
        let path = PathBuf::from(format!("{stem}{suffix}"));
        debug!(path = %path.display(), "trying to create target directory");
        match std::fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(ScanhelperError::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("every target directory named {stem}* already exists"),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(12, 0, 5)
            .unwrap()
    }

    #[test]
    fn prefix_separator() {
        assert_eq!(directory_prefix(None), "");
        assert_eq!(directory_prefix(Some("invoice")), "invoice-");
        assert_eq!(directory_prefix(Some("invoice_")), "invoice_");
        assert_eq!(directory_prefix(Some("scans/")), "scans/");
    }

    #[test]
    fn suffix_order() {
        let all: Vec<String> = suffixes().collect();
        assert_eq!(all.len(), 1 + 26 + 26 * 26 + 26 * 26 * 26);
        assert_eq!(all[..3].to_vec(), vec!["", "a", "b"]);
        assert_eq!(all[26], "z");
        assert_eq!(all[27], "aa");
        assert_eq!(all[28], "ab");
        assert_eq!(all.last().map(String::as_str), Some("zzz"));
    }

    #[test]
    fn collisions_get_letter_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = format!("{}/", dir.path().display());

        let first = create_unique_directory(&prefix, noon()).unwrap();
        let second = create_unique_directory(&prefix, noon()).unwrap();
        let third = create_unique_directory(&prefix, noon()).unwrap();

        assert_eq!(first, dir.path().join("2026-03-14T12:00:05"));
        assert_eq!(second, dir.path().join("2026-03-14T12:00:05a"));
        assert_eq!(third, dir.path().join("2026-03-14T12:00:05b"));
        assert!(third.is_dir());
    }

    #[test]
    fn missing_parent_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = format!("{}/missing/", dir.path().display());
        assert!(matches!(
            create_unique_directory(&prefix, noon()),
            Err(ScanhelperError::Io(_))
        ));
    }
}
