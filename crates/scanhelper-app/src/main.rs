// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanhelper — Batch scanning helper for scanimage
//
// Entry point. Loads configuration, parses the command line, initialises
// logging, and runs the selected mode.

mod actions;
mod cli;
mod target_dir;

use std::ffi::OsString;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use scanhelper_core::config::{AppConfig, ConfigEnv};
use scanhelper_core::error::ScanhelperError;
use scanhelper_core::human_errors::humanize_error;
use scanhelper_device::ScanimageTool;

use cli::CliError;

fn main() -> ExitCode {
    let config_env = ConfigEnv::from_process();
    let argv: Vec<OsString> = std::env::args_os().collect();

    let parsed = AppConfig::load(&config_env)
        .map_err(CliError::App)
        .and_then(|config| cli::parse(&argv, &config).map(|args| (config, args)));
    let (config, args) = match parsed {
        Ok(parsed) => parsed,
        Err(CliError::Usage(e)) => e.exit(),
        Err(CliError::App(e)) => {
            init_logging(false);
            return report(&e);
        }
    };

    init_logging(args.verbose);
    tracing::debug!(mode = ?args.mode(), "scanhelper starting");

    match actions::dispatch(&args, &config, &config_env, &ScanimageTool::default()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Tell the operator what went wrong and what to try next.
fn report(err: &ScanhelperError) -> ExitCode {
    tracing::debug!(error = ?err, "run failed");
    let human = humanize_error(err);
    eprintln!("scanhelper: {err}");
    eprintln!("{}", human.message);
    eprintln!("{}", human.suggestion);
    ExitCode::from(err.exit_code())
}
