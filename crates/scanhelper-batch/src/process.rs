// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External scanning process, run inside a pseudo-terminal.
//
// scanimage only line-buffers its progress messages when stdout is a
// terminal, so the child gets the slave end of a fresh PTY for both stdout and
// stderr and the parent reads the master end line by line.  The child runs in
// its own session, so a Ctrl-C typed at our terminal never reaches it and an
// interrupted run still lets the current batch finish.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::PathBuf;

use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tracing::{debug, info, instrument};

use scanhelper_core::error::{Result, ScanhelperError};
use scanhelper_core::shell::shell_escape_list;
use scanhelper_core::types::ProcessOutcome;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ScanCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Program followed by arguments.
    pub fn words(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for ScanCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_escape_list(&self.words()))
    }
}

/// A running scanning process.
pub trait ProcessHandle {
    /// Next output line without its terminator, or `None` at end of stream.
    fn read_line(&mut self) -> Option<String>;

    /// Wait for the process to exit and classify how it ended.
    fn wait(self: Box<Self>) -> Result<ProcessOutcome>;
}

/// Starts scanning processes.
///
/// Callers must have released the scanner device before calling `spawn`.
pub trait ProcessChannel {
    fn spawn(&mut self, command: &ScanCommand) -> Result<Box<dyn ProcessHandle>>;
}

/// Runs commands in a pseudo-terminal with `work_dir` as working directory.
#[derive(Debug, Clone)]
pub struct PtyChannel {
    work_dir: PathBuf,
    rows: u16,
    cols: u16,
}

impl PtyChannel {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            rows: 24,
            cols: 80,
        }
    }
}

impl ProcessChannel for PtyChannel {
    #[instrument(skip_all, fields(program = %command.program))]
    fn spawn(&mut self, command: &ScanCommand) -> Result<Box<dyn ProcessHandle>> {
        let program = find_program(&command.program, std::env::var_os("PATH").as_deref())
            .ok_or_else(|| ScanhelperError::tool_not_installed(&command.program))?;
        let spawn_error = |detail: String| ScanhelperError::Spawn {
            command: command.to_string(),
            detail,
        };

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: self.rows,
                cols: self.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| spawn_error(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&program);
        cmd.args(&command.args);
        cmd.cwd(&self.work_dir);
        let locale = LocaleEnv::from_vars(std::env::vars_os());
        for key in &locale.remove {
            cmd.env_remove(key);
        }
        if let Some(ctype) = &locale.ctype {
            cmd.env("LC_CTYPE", ctype);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| spawn_error(e.to_string()))?;
        // The child holds its own copy; ours would keep the stream open forever.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_error(e.to_string()))?;
        info!(pid = ?child.process_id(), command = %command, "scanner tool started");

        Ok(Box::new(PtyHandle {
            child,
            reader: BufReader::new(reader),
            _master: pair.master,
            buf: Vec::with_capacity(256),
        }))
    }
}

struct PtyHandle {
    child: Box<dyn Child + Send + Sync>,
    reader: BufReader<Box<dyn Read + Send>>,
    _master: Box<dyn MasterPty + Send>,
    buf: Vec<u8>,
}

impl ProcessHandle for PtyHandle {
    fn read_line(&mut self) -> Option<String> {
        self.buf.clear();
        loop {
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => break,
                Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                    continue;
                }
                // Linux reports EIO on the master once the child side is gone.
                Err(e) => {
                    debug!(error = %e, "pseudo-terminal closed");
                    if self.buf.is_empty() {
                        return None;
                    }
                    break;
                }
            }
        }
        let line = String::from_utf8_lossy(&self.buf);
        Some(line.trim_end_matches(['\r', '\n']).to_owned())
    }

    fn wait(mut self: Box<Self>) -> Result<ProcessOutcome> {
        let status = self.child.wait()?;
        let outcome = ProcessOutcome::from_exit(status.exit_code(), status.signal());
        debug!(code = status.exit_code(), ?outcome, "scanner tool exited");
        Ok(outcome)
    }
}

/// Locate `program` the way a shell would.
pub fn find_program(program: &str, path: Option<&OsStr>) -> Option<PathBuf> {
    if program.contains('/') {
        let candidate = PathBuf::from(program);
        return candidate.is_file().then_some(candidate);
    }
    std::env::split_paths(path?)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Locale adjustments for the child.
///
/// Progress lines are matched in English, so message catalogs are switched
/// off while the character type of the operator's locale is kept for file
/// names.  Values are passed through untouched; variables whose names are not
/// UTF-8 cannot be locale settings and are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleEnv {
    /// Variables to unset.
    pub remove: Vec<String>,
    /// Value for `LC_CTYPE`, if the operator had one in effect.
    pub ctype: Option<OsString>,
}

impl LocaleEnv {
    pub fn from_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Self {
        let vars: Vec<(String, OsString)> = vars
            .into_iter()
            .filter_map(|(k, v)| Some((k.to_str()?.to_owned(), v)))
            .collect();
        let lookup = |name: &str| {
            vars.iter()
                .find(|(k, v)| k == name && !v.is_empty())
                .map(|(_, v)| v.clone())
        };
        let ctype = lookup("LC_ALL")
            .or_else(|| lookup("LC_CTYPE"))
            .or_else(|| lookup("LANG"));
        let mut remove: Vec<String> = vars
            .iter()
            .map(|(k, _)| k)
            .filter(|k| k.starts_with("LC_") || *k == "LANG" || *k == "LANGUAGE")
            .cloned()
            .collect();
        remove.sort();
        Self { remove, ctype }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use std::path::Path;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(OsString, OsString)> {
        pairs
            .iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v)))
            .collect()
    }

    #[test]
    fn command_display_is_shell_quoted() {
        let cmd = ScanCommand::new(
            "scanimage",
            vec!["--device-name".into(), "net:host:HP Scanjet".into()],
        );
        assert_eq!(cmd.to_string(), "scanimage --device-name 'net:host:HP Scanjet'");
    }

    #[test]
    fn locale_keeps_character_type_only() {
        let env = LocaleEnv::from_vars(vars(&[
            ("LANG", "pl_PL.UTF-8"),
            ("LC_MESSAGES", "pl_PL.UTF-8"),
            ("LANGUAGE", "pl"),
            ("PATH", "/usr/bin"),
        ]));
        assert_eq!(env.remove, vec!["LANG", "LANGUAGE", "LC_MESSAGES"]);
        assert_eq!(env.ctype.as_deref(), Some(OsStr::new("pl_PL.UTF-8")));
    }

    #[test]
    fn locale_precedence() {
        let env = LocaleEnv::from_vars(vars(&[
            ("LC_ALL", ""),
            ("LC_CTYPE", "C.UTF-8"),
            ("LANG", "de_DE.UTF-8"),
        ]));
        assert_eq!(env.ctype.as_deref(), Some(OsStr::new("C.UTF-8")));
        assert_eq!(LocaleEnv::from_vars(Vec::new()), LocaleEnv::default());
    }

    #[cfg(unix)]
    #[test]
    fn locale_tolerates_non_utf8_environment() {
        use std::os::unix::ffi::OsStringExt;

        let latin1 = OsString::from_vec(b"de_DE.ISO-8859-1@caf\xe9".to_vec());
        let mut env = vars(&[("LC_MESSAGES", "de_DE")]);
        env.push((OsString::from("LANG"), latin1.clone()));
        env.push((OsString::from("TITLE"), OsString::from_vec(b"caf\xe9".to_vec())));
        env.push((OsString::from_vec(b"LC_\xff".to_vec()), OsString::from("C")));

        let locale = LocaleEnv::from_vars(env);
        assert_eq!(locale.remove, vec!["LANG", "LC_MESSAGES"]);
        assert_eq!(locale.ctype, Some(latin1));
    }

    #[test]
    fn programs_are_found_on_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("scanimage");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        let path = std::env::join_paths([Path::new("/nonexistent"), dir.path()]).unwrap();

        assert_eq!(find_program("scanimage", Some(&path)), Some(tool.clone()));
        assert_eq!(find_program("missing-tool", Some(&path)), None);
        assert_eq!(find_program(tool.to_str().unwrap(), None), Some(tool));
        assert_eq!(find_program("scanimage", None), None);
    }
}
