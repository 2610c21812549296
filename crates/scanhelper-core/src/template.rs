// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output filename templates.
//
// Templates use printf-style integer conversions because the same string is
// handed to scanimage's `--batch=` option, which formats it with printf.  Both
// sides must agree on every filename, so only the conversions scanimage would
// accept for an int argument are allowed.

use std::fmt;

use crate::error::{Result, ScanhelperError};

/// A parsed filename template such as `p%04d.png`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Number(Conversion),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Conversion {
    left_align: bool,
    zero_pad: bool,
    plus_sign: bool,
    space_sign: bool,
    width: usize,
    precision: Option<usize>,
}

impl FilenameTemplate {
    /// Parse a template.  Exactly one integer conversion is required.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |why: &str| ScanhelperError::InvalidOption(format!("filename template {raw:?}: {why}"));

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();
        let mut conversions = 0;

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                literal.push('%');
                continue;
            }

            let mut conv = Conversion::default();
            while let Some(&flag) = chars.peek() {
                match flag {
                    '-' => conv.left_align = true,
                    '0' => conv.zero_pad = true,
                    '+' => conv.plus_sign = true,
                    ' ' => conv.space_sign = true,
                    _ => break,
                }
                chars.next();
            }
            conv.width = take_digits(&mut chars).unwrap_or(0);
            if chars.peek() == Some(&'.') {
                chars.next();
                conv.precision = Some(take_digits(&mut chars).unwrap_or(0));
            }
            // Length modifiers are harmless for an int argument.
            while matches!(chars.peek(), Some('h' | 'l' | 'j' | 'z' | 't')) {
                chars.next();
            }
            match chars.next() {
                Some('d' | 'i' | 'u') => {}
                Some(other) => return Err(invalid(&format!("unsupported conversion %{other}"))),
                None => return Err(invalid("dangling %")),
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Number(conv));
            conversions += 1;
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        match conversions {
            1 => Ok(Self {
                raw: raw.to_owned(),
                segments,
            }),
            0 => Err(invalid("no page number conversion (e.g. %04d)")),
            _ => Err(invalid("more than one page number conversion")),
        }
    }

    /// The default template for a file extension: `p%04d.<ext>`.
    pub fn default_for_extension(extension: &str) -> Self {
        let raw = format!("p%04d.{}", extension.replace('%', "%%"));
        let literal = format!(".{extension}");
        Self {
            raw,
            segments: vec![
                Segment::Literal("p".into()),
                Segment::Number(Conversion {
                    zero_pad: true,
                    width: 4,
                    ..Conversion::default()
                }),
                Segment::Literal(literal),
            ],
        }
    }

    /// The template exactly as given, for the scanning tool's command line.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Substitute a page number.
    pub fn format(&self, page: u32) -> String {
        let mut out = String::with_capacity(self.raw.len() + 8);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Number(conv) => out.push_str(&conv.render(page)),
            }
        }
        out
    }
}

impl fmt::Display for FilenameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Conversion {
    fn render(&self, value: u32) -> String {
        let mut digits = value.to_string();
        if let Some(precision) = self.precision {
            if precision == 0 && value == 0 {
                digits.clear();
            }
            while digits.len() < precision {
                digits.insert(0, '0');
            }
        }
        let sign = if self.plus_sign {
            "+"
        } else if self.space_sign {
            " "
        } else {
            ""
        };

        let len = sign.len() + digits.len();
        if len >= self.width {
            return format!("{sign}{digits}");
        }
        let pad = self.width - len;
        if self.left_align {
            format!("{sign}{digits}{}", " ".repeat(pad))
        } else if self.zero_pad && self.precision.is_none() {
            format!("{sign}{}{digits}", "0".repeat(pad))
        } else {
            format!("{}{sign}{digits}", " ".repeat(pad))
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut value: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        chars.next();
        value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(d as usize));
    }
    value
}
