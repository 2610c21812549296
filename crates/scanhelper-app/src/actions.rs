// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One function per run mode.
//
// Listing modes write to the given writer; scanning talks to the terminal
// through the batch observer.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use clap::CommandFactory;
use tracing::{info, instrument, warn};

use scanhelper_batch::{
    BatchController, ButtonWaiter, CancelToken, ConversionPool, DoneReason, InlineSink,
    PageSink, PtyChannel, RunSummary, StdinPrompt,
};
use scanhelper_core::config::{AppConfig, ConfigEnv};
use scanhelper_core::error::{Result, ScanhelperError};
use scanhelper_core::shell::shell_escape_list;
use scanhelper_core::types::{DeviceInfo, PageFinisher};
use scanhelper_device::{DeviceEnumerator, select_device};
use scanhelper_document::{DocumentFinisher, XmpMetadata, clean_temporary_files, describe_count};

use crate::cli::{AFTER_HELP, Args, RunMode};
use crate::target_dir::{create_unique_directory, directory_prefix};

/// Run whatever `args` asks for.
pub fn dispatch(
    args: &Args,
    config: &AppConfig,
    config_env: &ConfigEnv,
    tool: &dyn DeviceEnumerator,
) -> Result<()> {
    let requested = args.requested_device(std::env::var("SANE_DEFAULT_DEVICE").ok());
    let mut out = std::io::stdout();
    match args.mode() {
        RunMode::Help => {
            write!(out, "{}", help_text(tool, requested.as_deref()))?;
            Ok(())
        }
        RunMode::Scan => {
            let summary = scan(args, tool, requested.as_deref())?;
            if summary.reason == DoneReason::Cancelled {
                writeln!(out, "Interrupted after {} page(s)", summary.pages)?;
            }
            Ok(())
        }
        RunMode::ListDevices => list_devices(tool, &mut out),
        RunMode::ListButtons => list_buttons(tool, requested.as_deref(), &mut out),
        RunMode::ReconstructXmp(files) => {
            let device = resolve_device(tool, requested.as_deref()).unwrap_or_else(|e| {
                warn!(error = %e, "no device details for the sidecars");
                DeviceInfo::named(requested.unwrap_or_default())
            });
            reconstruct_xmp(&files, &device, args, &mut out)
        }
        RunMode::ShowConfig => {
            let home = config_env.home.as_deref().map(Path::new);
            show_config(config_env, config, home, &mut out)
        }
        RunMode::CleanTemporaryFiles(dir) => clean(&dir, &mut out),
    }
}

/// Usage followed by the options `device` adds, or a hint on how to see them.
pub fn help_text(tool: &dyn DeviceEnumerator, device: Option<&str>) -> String {
    let mut epilog = format!("{AFTER_HELP}\n\nDevice-specific options:\n");
    match device {
        None => epilog.push_str("  use 'scanhelper -d DEVICE --help' to list the options of DEVICE"),
        Some(name) => match tool.device_help(name) {
            Ok(options) => epilog.push_str(options.trim_end()),
            Err(e) => {
                warn!(device = name, error = %e, "cannot query device options");
                epilog.push_str(&format!("  not available for {name}"));
            }
        },
    }
    Args::command().after_help(epilog).render_help().to_string()
}

/// The device to use.  With an explicit name, enumeration is only consulted
/// for vendor and model and its failure is not fatal.
pub fn resolve_device(tool: &dyn DeviceEnumerator, requested: Option<&str>) -> Result<DeviceInfo> {
    let devices = match tool.list_devices() {
        Ok(devices) => devices,
        Err(e) if requested.is_some() => {
            warn!(error = %e, "cannot list devices; using the requested name");
            Vec::new()
        }
        Err(e) => return Err(e),
    };
    select_device(&devices, requested)
}

pub fn list_devices(tool: &dyn DeviceEnumerator, out: &mut dyn Write) -> Result<()> {
    for device in tool.list_devices()? {
        writeln!(
            out,
            "{:<24} {} {} ({})",
            device.name, device.vendor, device.model, device.kind
        )?;
    }
    Ok(())
}

pub fn list_buttons(
    tool: &dyn DeviceEnumerator,
    requested: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    let device = tool.open(resolve_device(tool, requested)?)?;
    for name in device.signals() {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

pub fn show_config(
    env: &ConfigEnv,
    config: &AppConfig,
    home: Option<&Path>,
    out: &mut dyn Write,
) -> Result<()> {
    writeln!(out, "Configuration files:")?;
    for path in env.config_paths() {
        writeln!(out, "    {}", abbreviate_home(&path, home))?;
    }
    writeln!(out)?;
    if config.default_args.is_empty() {
        writeln!(out, "No default options")?;
    } else {
        writeln!(out, "Default options:")?;
        writeln!(out, "    {}", shell_escape_list(&config.default_args))?;
    }
    let mut profiles = 0;
    for (name, args) in &config.profiles {
        writeln!(out)?;
        writeln!(out, "Options for profile '{name}':")?;
        writeln!(out, "    {}", shell_escape_list(args))?;
        profiles += 1;
    }
    if profiles == 0 {
        writeln!(out)?;
        writeln!(out, "No profiles")?;
    }
    writeln!(out)?;
    Ok(())
}

/// `~/...` for paths under `home`.
fn abbreviate_home(path: &Path, home: Option<&Path>) -> String {
    match home.and_then(|home| path.strip_prefix(home).ok()) {
        Some(rest) => format!("~/{}", rest.display()),
        None => path.display().to_string(),
    }
}

#[instrument(skip(out))]
pub fn clean(dir: &Path, out: &mut dyn Write) -> Result<()> {
    let count = clean_temporary_files(dir)?;
    info!(count, "temporary files converted");
    writeln!(out, "{}", describe_count(count))?;
    Ok(())
}

pub fn reconstruct_xmp(
    files: &[PathBuf],
    device: &DeviceInfo,
    args: &Args,
    out: &mut dyn Write,
) -> Result<()> {
    for file in files {
        let sidecar = XmpMetadata::for_image(file, device)
            .and_then(|mut meta| {
                meta.apply_overrides(&args.override_xmp)?;
                meta.write_sidecar(file)
            })
            .map_err(|e| ScanhelperError::page_finish(file.display().to_string(), e))?;
        writeln!(out, "{}", sidecar.display())?;
    }
    Ok(())
}

/// Scan batches into the target directory until the run ends.
#[instrument(skip_all, fields(device = ?requested))]
pub fn scan(
    args: &Args,
    tool: &dyn DeviceEnumerator,
    requested: Option<&str>,
) -> Result<RunSummary> {
    let info = resolve_device(tool, requested)?;
    let mut device = tool.open(info.clone())?;

    let target = match &args.target_directory {
        Some(dir) => {
            std::fs::metadata(dir)?;
            dir.clone()
        }
        None => {
            let prefix = directory_prefix(args.target_directory_prefix.as_deref());
            create_unique_directory(&prefix, Local::now().naive_local())?
        }
    };
    info!(target = %target.display(), "target directory");

    let mut finisher = DocumentFinisher::new(args.format);
    if args.xmp {
        finisher = finisher.with_xmp(info, args.override_xmp.clone());
    }
    let finisher: Arc<dyn PageFinisher> = Arc::new(finisher);
    let mut sink: Box<dyn PageSink> = match args.jobs() {
        0 => Box::new(InlineSink::new(finisher)),
        workers => Box::new(ConversionPool::new(finisher, workers)?),
    };

    let waiter = ButtonWaiter::new(args.batch_button.clone(), Box::new(StdinPrompt::new()));
    let mut controller = BatchController::new(
        Box::new(PtyChannel::new(&target)),
        waiter,
        args.tool_options(),
        &target,
    )
    .with_cancel(CancelToken::install_sigint()?);

    controller.run(device.as_mut(), args.batch_request()?, sink.as_mut())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli;
    use pretty_assertions::assert_eq;
    use scanhelper_device::{MemoryDevice, ScannerDevice};
    use std::collections::BTreeMap;
    use std::ffi::OsString;

    /// Enumerator over in-memory devices.
    struct Devices(Vec<DeviceInfo>);

    impl DeviceEnumerator for Devices {
        fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
            if self.0.is_empty() {
                return Err(ScanhelperError::tool_not_installed("scanimage"));
            }
            Ok(self.0.clone())
        }

        fn open(&self, info: DeviceInfo) -> Result<Box<dyn ScannerDevice>> {
            Ok(Box::new(
                MemoryDevice::new(&info.name)
                    .with_button("email", [false])
                    .with_button("scan", [false]),
            ))
        }

        fn device_help(&self, device: &str) -> Result<String> {
            match self.0.iter().find(|d| d.name == device) {
                Some(_) => Ok("  Scan Mode:\n    --mode Gray|Color [Gray]\n".into()),
                None => Err(ScanhelperError::NoSuchDevice(device.to_owned())),
            }
        }
    }

    fn device(name: &str) -> DeviceInfo {
        DeviceInfo {
            name: name.into(),
            vendor: "Canon".into(),
            model: "LiDE 210".into(),
            kind: "flatbed scanner".into(),
        }
    }

    fn output(f: impl FnOnce(&mut dyn Write) -> Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn args(words: &[&str]) -> Args {
        let argv: Vec<OsString> = std::iter::once("scanhelper")
            .chain(words.iter().copied())
            .map(OsString::from)
            .collect();
        match cli::parse(&argv, &AppConfig::default()) {
            Ok(args) => args,
            Err(e) => panic!("{e:?}"),
        }
    }

    #[test]
    fn devices_are_listed_in_columns() {
        let tool = Devices(vec![device("genesys:libusb:001:004")]);
        assert_eq!(
            output(|out| list_devices(&tool, out)),
            "genesys:libusb:001:004   Canon LiDE 210 (flatbed scanner)\n"
        );
    }

    #[test]
    fn help_ends_with_device_options() {
        let tool = Devices(vec![device("test:0")]);

        let generic = help_text(&tool, None);
        assert!(generic.contains("--batch-button <BUTTON>"));
        assert!(generic.trim_end().ends_with(
            "Device-specific options:\n  use 'scanhelper -d DEVICE --help' to list the options of DEVICE"
        ));

        let specific = help_text(&tool, Some("test:0"));
        assert!(specific
            .trim_end()
            .ends_with("Device-specific options:\n  Scan Mode:\n    --mode Gray|Color [Gray]"));

        let unknown = help_text(&tool, Some("net:host"));
        assert!(unknown.trim_end().ends_with("  not available for net:host"));
    }

    #[test]
    fn buttons_of_the_only_device() {
        let tool = Devices(vec![device("test:0")]);
        assert_eq!(output(|out| list_buttons(&tool, None, out)), "email\nscan\n");
    }

    #[test]
    fn device_choice() {
        let two = Devices(vec![device("a:0"), device("b:0")]);
        assert!(matches!(
            resolve_device(&two, None),
            Err(ScanhelperError::AmbiguousDevice(_))
        ));
        assert_eq!(resolve_device(&two, Some("b:0")).unwrap().vendor, "Canon");

        let broken = Devices(Vec::new());
        assert!(matches!(
            resolve_device(&broken, None),
            Err(ScanhelperError::ToolNotInstalled { .. })
        ));
        assert_eq!(resolve_device(&broken, Some("net:host")).unwrap().name, "net:host");
    }

    #[test]
    fn show_config_lists_files_and_profiles() {
        let env = ConfigEnv {
            xdg_config_home: None,
            xdg_config_dirs: None,
            home: Some("/home/op".into()),
        };
        let config = AppConfig {
            default_args: vec!["--format".into(), "tiff".into()],
            profiles: BTreeMap::from([(
                "duplex".into(),
                vec!["--batch-button".into(), "scan me".into()],
            )]),
        };
        let text = output(|out| show_config(&env, &config, Some(Path::new("/home/op")), out));
        assert_eq!(
            text,
            "Configuration files:\n\
             \x20   ~/.config/scanhelper/config.json\n\
             \x20   /etc/xdg/scanhelper/config.json\n\
             \n\
             Default options:\n\
             \x20   --format tiff\n\
             \n\
             Options for profile 'duplex':\n\
             \x20   --batch-button 'scan me'\n\
             \n"
        );
    }

    #[test]
    fn show_config_without_settings() {
        let env = ConfigEnv {
            xdg_config_home: Some("/cfg".into()),
            xdg_config_dirs: Some("/site".into()),
            home: None,
        };
        let text = output(|out| show_config(&env, &AppConfig::default(), None, out));
        assert!(text.contains("    /cfg/scanhelper/config.json\n"));
        assert!(text.contains("No default options\n"));
        assert!(text.ends_with("\nNo profiles\n\n"));
    }

    #[test]
    fn clean_reports_nothing_to_do() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            output(|out| clean(dir.path(), out)),
            "No files have been converted\n"
        );
    }

    #[test]
    fn reconstruct_writes_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("p0001.png");
        image::RgbImage::new(4, 3).save(&image).unwrap();

        let args = args(&["--reconstruct-xmp", "p0001.png", "--override-xmp", "dpi=300"]);
        let text = output(|out| reconstruct_xmp(&[image.clone()], &device("test:0"), &args, out));

        let sidecar = dir.path().join("p0001.png.xmp");
        assert_eq!(text, format!("{}\n", sidecar.display()));
        let xml = std::fs::read_to_string(sidecar).unwrap();
        assert!(xml.contains("LiDE 210"));
        assert!(xml.contains("300"));
    }

    #[test]
    fn reconstruct_names_the_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("p0002.png");
        let mut sink = Vec::new();
        let err = reconstruct_xmp(&[missing], &device("test:0"), &args(&[]), &mut sink).unwrap_err();
        assert!(err.to_string().contains("p0002.png"));
    }
}
