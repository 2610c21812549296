// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the operator at the scanner.
//
// Every technical error is mapped to a plain summary with a concrete next
// step. Nothing here is retried automatically: scanner failures need a person
// to clear the jam, reload the feeder, or install the missing tool.

use crate::error::ScanhelperError;

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The operator must do something (pick a device, fix a typo, clear a jam).
    ActionRequired,
    /// Cannot be fixed by operator action at the scanner.
    Permanent,
    /// A package has to be installed first.
    InstallRequired,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// One-line summary.
    pub message: String,
    /// What the operator should try next.
    pub suggestion: String,
    /// Severity level.
    pub severity: Severity,
}

/// Convert a `ScanhelperError` into a `HumanError`.
pub fn humanize_error(err: &ScanhelperError) -> HumanError {
    match err {
        // -- Device errors --
        ScanhelperError::NoDevices => HumanError {
            message: "No scanner was found.".into(),
            suggestion: "Check that the scanner is plugged in and switched on, then run `scanhelper --list-devices`.".into(),
            severity: Severity::ActionRequired,
        },

        ScanhelperError::AmbiguousDevice(names) => HumanError {
            message: "More than one scanner is available.".into(),
            suggestion: format!("Choose one with --device-name (available: {}).", names.join(", ")),
            severity: Severity::ActionRequired,
        },

        ScanhelperError::NoSuchDevice(name) => HumanError {
            message: format!("The scanner {name:?} could not be opened."),
            suggestion: "Run `scanhelper --list-devices` to see the device names that work.".into(),
            severity: Severity::ActionRequired,
        },

        ScanhelperError::NoSuchButton(name) => HumanError {
            message: format!("The scanner has no button called {name:?}."),
            suggestion: "Run `scanhelper --list-buttons` to see the buttons this scanner exposes.".into(),
            severity: Severity::ActionRequired,
        },

        ScanhelperError::DeviceQuery(detail) => HumanError {
            message: "The scanner did not answer.".into(),
            suggestion: format!("Check the cable and that no other program is using the scanner. ({detail})"),
            severity: Severity::ActionRequired,
        },

        // -- External tool --
        ScanhelperError::ToolNotInstalled { tool, package } => HumanError {
            message: format!("{tool} is not installed."),
            suggestion: format!("Install the {package} package (it provides {tool}) and try again."),
            severity: Severity::InstallRequired,
        },

        ScanhelperError::Spawn { command, detail } => HumanError {
            message: "The scanning program could not be started.".into(),
            suggestion: format!("Check that {command} runs on its own. ({detail})"),
            severity: Severity::Permanent,
        },

        ScanhelperError::SubprocessFailed { code, .. } => humanize_exit_code(*code),

        ScanhelperError::SubprocessKilled { signal, .. } => HumanError {
            message: format!("The scanning program was stopped by {signal}."),
            suggestion: "Pages scanned before the interruption are kept. Start a new run from the next page number.".into(),
            severity: Severity::ActionRequired,
        },

        ScanhelperError::ProtocolViolation { line } => HumanError {
            message: "The scanning program printed progress in an unexpected format.".into(),
            suggestion: format!("Your scanimage version may be incompatible with scanhelper. (Line: {line:?})"),
            severity: Severity::Permanent,
        },

        // -- Page finishing --
        ScanhelperError::PageFinish { filename, .. } => HumanError {
            message: format!("The page {filename} was scanned but could not be finished."),
            suggestion: "Earlier pages are complete. Fix the problem below, then run --clean-temporary-files on the target directory.".into(),
            severity: Severity::ActionRequired,
        },

        ScanhelperError::ImageError(_) => HumanError {
            message: "A scanned image could not be converted.".into(),
            suggestion: "The raw file is kept next to the output; try --clean-temporary-files later.".into(),
            severity: Severity::Permanent,
        },

        ScanhelperError::Metadata(_) => HumanError {
            message: "The XMP metadata could not be written.".into(),
            suggestion: "Check the --override-xmp values and that the target directory is writable.".into(),
            severity: Severity::ActionRequired,
        },

        ScanhelperError::Worker(_) => HumanError {
            message: "A background conversion stopped unexpectedly.".into(),
            suggestion: "Run again with --jobs 0 to convert pages one at a time.".into(),
            severity: Severity::Permanent,
        },

        // -- Options / configuration --
        ScanhelperError::InvalidOption(detail) | ScanhelperError::Config(detail) => HumanError {
            message: "The options don't fit together.".into(),
            suggestion: format!("{detail}. See `scanhelper --help`."),
            severity: Severity::ActionRequired,
        },

        ScanhelperError::Unsupported(option) => HumanError {
            message: format!("The {option} option is not supported yet."),
            suggestion: "Remove it from the command line or the configuration file.".into(),
            severity: Severity::Permanent,
        },

        // -- Storage --
        ScanhelperError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "A file or directory couldn't be found.".into(),
                    suggestion: "Check the target directory and filename template.".into(),
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "scanhelper doesn't have permission to write there.".into(),
                    suggestion: "Choose a different --target-directory or fix its permissions.".into(),
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Check that the disk isn't full.".into(),
                    severity: Severity::ActionRequired,
                }
            }
        }

        ScanhelperError::Serialization(_) => HumanError {
            message: "The configuration file couldn't be read.".into(),
            suggestion: "Run `scanhelper --show-config` to find it and check that it is valid JSON.".into(),
            severity: Severity::ActionRequired,
        },
    }
}

/// Map the scanning tool's SANE status codes to advice.
fn humanize_exit_code(code: u32) -> HumanError {
    match code {
        3 => HumanError {
            message: "The scanner is busy.".into(),
            suggestion: "Close other scanning programs and try again.".into(),
            severity: Severity::ActionRequired,
        },
        8 => HumanError {
            message: "The scanner cover is open.".into(),
            suggestion: "Close the cover and press the button again.".into(),
            severity: Severity::ActionRequired,
        },
        9 => HumanError {
            message: "The scanner reported an I/O error.".into(),
            suggestion: "Check the cable, switch the scanner off and on, then retry.".into(),
            severity: Severity::ActionRequired,
        },
        11 => HumanError {
            message: "Access to the scanner was denied.".into(),
            suggestion: "Make sure your user may access the scanner (e.g. is in the `scanner` group).".into(),
            severity: Severity::ActionRequired,
        },
        _ => HumanError {
            message: "The scanning program failed.".into(),
            suggestion: format!("Run scanimage on its own to see what went wrong. (Exit status {code})"),
            severity: Severity::Permanent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_requires_install() {
        let err = ScanhelperError::ToolNotInstalled {
            tool: "scanimage".into(),
            package: "sane-utils".into(),
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::InstallRequired);
        assert!(human.suggestion.contains("sane-utils"));
    }

    #[test]
    fn bad_button_is_action_required() {
        let human = humanize_error(&ScanhelperError::NoSuchButton("scan".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.suggestion.contains("--list-buttons"));
    }

    #[test]
    fn cover_open_exit_is_action_required() {
        let err = ScanhelperError::SubprocessFailed {
            command: "scanimage".into(),
            code: 8,
        };
        assert_eq!(humanize_error(&err).severity, Severity::ActionRequired);
    }

    #[test]
    fn unknown_exit_code_is_reported() {
        let err = ScanhelperError::SubprocessFailed {
            command: "scanimage".into(),
            code: 42,
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Permanent);
        assert!(human.suggestion.contains("42"));
    }

    #[test]
    fn page_failure_names_file() {
        let err = ScanhelperError::page_finish("p0007.png", ScanhelperError::Metadata("x".into()));
        assert!(humanize_error(&err).message.contains("p0007.png"));
    }
}
