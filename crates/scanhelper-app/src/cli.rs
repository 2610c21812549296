// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line options.
//
// Default arguments from the configuration are parsed in front of the real
// command line, so anything the operator types wins.  When the result names a
// profile, the command line is parsed again with the profile's arguments
// inserted after the defaults.

use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use scanhelper_batch::ToolOptions;
use scanhelper_core::config::AppConfig;
use scanhelper_core::error::{Result, ScanhelperError};
use scanhelper_core::template::FilenameTemplate;
use scanhelper_core::types::{BatchRequest, OutputFormat, PageBudget};
use scanhelper_document::XmpOverride;

pub const AFTER_HELP: &str = "\
Arguments after `--` are passed to scanimage unchanged.

Without --batch-button, scanhelper asks for Enter before every batch; end
the run with Ctrl-D.";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "scanhelper",
    version,
    about = "Scan batches of pages with scanimage",
    after_help = AFTER_HELP,
    disable_help_flag = true,
    args_override_self = true,
    group(ArgGroup::new("mode").args([
        "list_devices",
        "list_buttons",
        "show_config",
        "clean_temporary_files",
        "reconstruct_xmp",
    ])),
)]
pub struct Args {
    /// Use a given scanner device (default: $SANE_DEFAULT_DEVICE)
    #[arg(short = 'd', long = "device-name", value_name = "DEVICE")]
    pub device: Option<String>,

    /// File format of output files
    #[arg(long, value_name = "FORMAT", default_value = "png")]
    pub format: OutputFormat,

    /// Output directory (default: a unique, time-based directory is created)
    #[arg(short = 't', long, value_name = "DIRECTORY")]
    pub target_directory: Option<PathBuf>,

    /// Prefix for the directory name if --target-directory is not used
    #[arg(long, value_name = "PREFIX")]
    pub target_directory_prefix: Option<String>,

    /// Include this ICC profile in TIFF files
    #[arg(short = 'i', long, value_name = "PROFILE")]
    pub icc_profile: Option<String>,

    /// Show available scanner devices
    #[arg(short = 'L', long)]
    pub list_devices: bool,

    /// Show available buttons
    #[arg(long)]
    pub list_buttons: bool,

    /// Output filename template (default: p%04d.<ext>)
    #[arg(short = 'b', long = "batch-mode", value_name = "TEMPLATE")]
    pub template: Option<String>,

    /// Page number to start naming files with
    #[arg(long, value_name = "#", default_value_t = 1)]
    pub batch_start: u32,

    /// How many pages to scan in total (default: no limit)
    #[arg(long, value_name = "#")]
    pub batch_count: Option<u32>,

    /// Most pages to scan in a single batch (default: no limit)
    #[arg(long, value_name = "#", value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: Option<u32>,

    /// Increase page number in filename by #
    #[arg(long, value_name = "#", default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_increment: u32,

    /// Same as --batch-increment=2
    #[arg(long)]
    pub batch_double: bool,

    /// (not supported)
    #[arg(long)]
    pub batch_prompt: bool,

    /// Button triggering the next batch
    #[arg(long, value_name = "BUTTON")]
    pub batch_button: Option<String>,

    /// Only accept authorization requests using MD5
    #[arg(long)]
    pub accept_md5_only: bool,

    /// Print progress messages
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// (not supported)
    #[arg(short = 'n', long)]
    pub dont_scan: bool,

    /// (not supported)
    #[arg(short = 'T', long)]
    pub test: bool,

    /// More informational messages
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Input buffer size in kB
    #[arg(short = 'B', long, value_name = "#")]
    pub buffer_size: Option<u32>,

    /// Add the arguments of a configuration profile
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Write an XMP sidecar next to every page
    #[arg(long)]
    pub xmp: bool,

    /// Override an XMP value (repeatable)
    #[arg(long, value_name = "KEY=VALUE")]
    pub override_xmp: Vec<XmpOverride>,

    /// Write XMP sidecars for existing images and exit
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub reconstruct_xmp: Vec<PathBuf>,

    /// Number of background conversion workers; 0 converts inline
    /// (default: number of CPUs)
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Convert temporary files left by aborted runs
    #[arg(long)]
    pub clean_temporary_files: bool,

    /// Show status of configuration files
    #[arg(long)]
    pub show_config: bool,

    /// Print help, including the options of the selected device
    #[arg(short = 'h', long)]
    pub help: bool,

    /// Extra arguments for scanimage
    #[arg(last = true, value_name = "SCANIMAGE-ARGS")]
    pub extra_args: Vec<String>,
}

/// What one invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Help,
    Scan,
    ListDevices,
    ListButtons,
    ReconstructXmp(Vec<PathBuf>),
    ShowConfig,
    CleanTemporaryFiles(PathBuf),
}

/// Why the command line was rejected.
#[derive(Debug)]
pub enum CliError {
    /// Usage error or `--version`; clap prints and exits.
    Usage(clap::Error),
    App(ScanhelperError),
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> Self {
        Self::Usage(err)
    }
}

impl From<ScanhelperError> for CliError {
    fn from(err: ScanhelperError) -> Self {
        Self::App(err)
    }
}

/// Parse `argv` (program name first) with the arguments from `config`.
pub fn parse(argv: &[OsString], config: &AppConfig) -> std::result::Result<Args, CliError> {
    let (program, rest) = match argv.split_first() {
        Some((program, rest)) => (program.clone(), rest),
        None => (OsString::from("scanhelper"), argv),
    };
    let with_prefix = |prefix: Vec<String>| {
        std::iter::once(program.clone())
            .chain(prefix.into_iter().map(OsString::from))
            .chain(rest.iter().cloned())
            .collect::<Vec<_>>()
    };

    let mut args = Args::try_parse_from(with_prefix(config.args_for(None)?))?;
    if let Some(profile) = args.profile.clone() {
        args = Args::try_parse_from(with_prefix(config.args_for(Some(&profile))?))?;
    }
    args.check()?;
    Ok(args)
}

impl Args {
    /// Reject combinations clap cannot express.
    fn check(&self) -> Result<()> {
        if self.help {
            return Ok(());
        }
        let unsupported = [
            ("--batch-prompt", self.batch_prompt),
            ("--dont-scan", self.dont_scan),
            ("--test", self.test),
        ];
        if let Some((option, _)) = unsupported.iter().find(|(_, given)| *given) {
            return Err(ScanhelperError::Unsupported((*option).to_owned()));
        }
        if self.clean_temporary_files && self.target_directory.is_none() {
            return Err(ScanhelperError::InvalidOption(
                "--target-directory is obligatory with --clean-temporary-files".into(),
            ));
        }
        Ok(())
    }

    pub fn mode(&self) -> RunMode {
        if self.help {
            RunMode::Help
        } else if self.list_devices {
            RunMode::ListDevices
        } else if self.list_buttons {
            RunMode::ListButtons
        } else if self.show_config {
            RunMode::ShowConfig
        } else if !self.reconstruct_xmp.is_empty() {
            RunMode::ReconstructXmp(self.reconstruct_xmp.clone())
        } else if let (true, Some(dir)) = (self.clean_temporary_files, &self.target_directory) {
            RunMode::CleanTemporaryFiles(dir.clone())
        } else {
            RunMode::Scan
        }
    }

    /// The device asked for on the command line, else `env_default`.
    pub fn requested_device(&self, env_default: Option<String>) -> Option<String> {
        self.device
            .clone()
            .or_else(|| env_default.filter(|name| !name.is_empty()))
    }

    pub fn increment(&self) -> u32 {
        if self.batch_double { 2 } else { self.batch_increment }
    }

    pub fn template(&self) -> Result<FilenameTemplate> {
        match &self.template {
            Some(raw) => FilenameTemplate::parse(raw),
            None => Ok(FilenameTemplate::default_for_extension(self.format.extension())),
        }
    }

    /// The request for the first batch of a scan.
    pub fn batch_request(&self) -> Result<BatchRequest> {
        let budget = self.batch_count.map_or(PageBudget::Unlimited, PageBudget::Pages);
        Ok(BatchRequest::new(self.template()?)
            .with_start(self.batch_start)
            .with_increment(self.increment())
            .with_batch_cap(self.batch_size)
            .with_budget(budget)
            .with_extra_args(self.extra_args.clone()))
    }

    pub fn tool_options(&self) -> ToolOptions {
        ToolOptions {
            icc_profile: self.icc_profile.clone(),
            accept_md5_only: self.accept_md5_only,
            progress: self.progress,
            verbose: self.verbose,
            buffer_size: self.buffer_size,
            ..ToolOptions::new(self.format)
        }
    }

    /// Conversion workers to start.
    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn argv(words: &[&str]) -> Vec<OsString> {
        std::iter::once("scanhelper")
            .chain(words.iter().copied())
            .map(OsString::from)
            .collect()
    }

    fn parse_plain(words: &[&str]) -> Args {
        match parse(&argv(words), &AppConfig::default()) {
            Ok(args) => args,
            Err(e) => panic!("{words:?} rejected: {e:?}"),
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            default_args: vec!["--format".into(), "tiff".into(), "--xmp".into()],
            profiles: BTreeMap::from([(
                "duplex".into(),
                vec!["--batch-double".into(), "--batch-button".into(), "scan".into()],
            )]),
        }
    }

    #[test]
    fn defaults() {
        let args = parse_plain(&[]);
        assert_eq!(args.mode(), RunMode::Scan);
        assert_eq!(args.format, OutputFormat::Png);
        let request = args.batch_request().unwrap();
        assert_eq!(request.start, 1);
        assert_eq!(request.increment, 1);
        assert_eq!(request.budget, PageBudget::Unlimited);
        assert_eq!(request.template.as_str(), "p%04d.png");
    }

    #[test]
    fn config_defaults_come_first() {
        let args = parse(&argv(&["--format", "pnm"]), &config()).unwrap();
        assert_eq!(args.format, OutputFormat::Pnm);
        assert!(args.xmp);
        assert_eq!(args.batch_button, None);
    }

    #[test]
    fn profile_arguments_are_added() {
        let args = parse(&argv(&["--profile", "duplex"]), &config()).unwrap();
        assert_eq!(args.format, OutputFormat::Tiff);
        assert_eq!(args.increment(), 2);
        assert_eq!(args.batch_button.as_deref(), Some("scan"));
        assert_eq!(args.template().unwrap().as_str(), "p%04d.tif");
    }

    #[test]
    fn unknown_profile_is_a_config_error() {
        let err = parse(&argv(&["--profile", "simplex"]), &config()).unwrap_err();
        assert!(matches!(err, CliError::App(ScanhelperError::Config(_))));
    }

    #[test]
    fn unsupported_options_exit_with_two() {
        for option in ["--batch-prompt", "--dont-scan", "-n", "--test", "-T"] {
            let err = parse(&argv(&[option]), &AppConfig::default()).unwrap_err();
            let CliError::App(err) = err else {
                panic!("{option} should be rejected by scanhelper, not clap");
            };
            assert_eq!(err.exit_code(), 2);
            assert!(err.to_string().ends_with("option is not yet supported"));
        }
    }

    #[test]
    fn clean_needs_target_directory() {
        let err = parse(&argv(&["--clean-temporary-files"]), &AppConfig::default()).unwrap_err();
        assert!(matches!(err, CliError::App(ScanhelperError::InvalidOption(_))));

        let args = parse_plain(&["--clean-temporary-files", "-t", "out"]);
        assert_eq!(args.mode(), RunMode::CleanTemporaryFiles(PathBuf::from("out")));
    }

    #[test]
    fn help_wins_over_other_checks() {
        assert_eq!(parse_plain(&["--help"]).mode(), RunMode::Help);
        assert_eq!(parse_plain(&["-d", "test:0", "-h"]).mode(), RunMode::Help);
        assert_eq!(parse_plain(&["--clean-temporary-files", "-h"]).mode(), RunMode::Help);
    }

    #[test]
    fn modes_are_exclusive() {
        let err = parse(&argv(&["-L", "--show-config"]), &AppConfig::default()).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
        assert_eq!(parse_plain(&["--list-buttons"]).mode(), RunMode::ListButtons);
        assert_eq!(
            parse_plain(&["--reconstruct-xmp", "a.png", "b.png"]).mode(),
            RunMode::ReconstructXmp(vec!["a.png".into(), "b.png".into()])
        );
    }

    #[test]
    fn batch_options_shape_the_request() {
        let args = parse_plain(&[
            "--batch-start",
            "5",
            "--batch-count",
            "10",
            "--batch-size",
            "4",
            "--batch-double",
            "-b",
            "scan-%03d.png",
            "--",
            "--resolution",
            "300",
        ]);
        let request = args.batch_request().unwrap();
        assert_eq!(request.start, 5);
        assert_eq!(request.increment, 2);
        assert_eq!(request.batch_cap, Some(4));
        assert_eq!(request.budget, PageBudget::Pages(10));
        assert_eq!(request.filename(), "scan-005.png");
        assert_eq!(request.extra_args, vec!["--resolution", "300"]);
    }

    #[test]
    fn tool_options_follow_flags() {
        let args = parse_plain(&["-p", "-v", "-B", "64", "-i", "a.icc", "--accept-md5-only"]);
        let tool = args.tool_options();
        assert!(tool.progress && tool.verbose && tool.accept_md5_only);
        assert_eq!(tool.buffer_size, Some(64));
        assert_eq!(tool.icc_profile.as_deref(), Some("a.icc"));
        assert_eq!(tool.output_format, OutputFormat::Png);
    }

    #[test]
    fn xmp_overrides_are_validated() {
        let args = parse_plain(&["--override-xmp", "dpi=300"]);
        assert_eq!(args.override_xmp.len(), 1);
        let err = parse(&argv(&["--override-xmp", "colour=red"]), &AppConfig::default());
        assert!(matches!(err, Err(CliError::Usage(_))));
    }

    #[test]
    fn device_falls_back_to_environment() {
        let args = parse_plain(&[]);
        assert_eq!(args.requested_device(Some("env:0".into())).as_deref(), Some("env:0"));
        assert_eq!(args.requested_device(Some(String::new())), None);
        let args = parse_plain(&["-d", "cli:0"]);
        assert_eq!(args.requested_device(Some("env:0".into())).as_deref(), Some("cli:0"));
    }

    #[test]
    fn repeated_flags_from_config_are_accepted() {
        let args = parse(&argv(&["--xmp", "--format", "png"]), &config()).unwrap();
        assert!(args.xmp);
        assert_eq!(args.format, OutputFormat::Png);
    }

    #[test]
    fn zero_jobs_means_inline() {
        assert_eq!(parse_plain(&["--jobs", "0"]).jobs(), 0);
        assert!(parse_plain(&[]).jobs() >= 1);
    }
}
