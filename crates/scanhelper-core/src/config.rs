// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration: default arguments and named profiles.
//
// Configuration files live in the XDG configuration directories.  Every file
// that exists contributes, user directory first, so a site-wide profile can
// be extended by the user.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ScanhelperError};

/// Name of the configuration file inside each `scanhelper` directory.
pub const CONFIG_FILE: &str = "config.json";

/// Persistent settings, stored as JSON.
///
/// ```json
/// {
///   "default_args": ["--format", "png"],
///   "profiles": { "duplex": ["--batch-double", "--batch-button", "scan"] }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Arguments prepended to every command line.
    pub default_args: Vec<String>,
    /// Arguments added by `--profile NAME`.
    pub profiles: BTreeMap<String, Vec<String>>,
}

impl AppConfig {
    /// Load and merge every configuration file found under `env`.
    pub fn load(env: &ConfigEnv) -> Result<Self> {
        let mut config = Self::default();
        for path in env.config_paths() {
            if !path.exists() {
                continue;
            }
            debug!(path = %path.display(), "loading configuration");
            config.merge(Self::load_file(&path)?);
        }
        Ok(config)
    }

    /// Parse a single configuration file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| {
            ScanhelperError::Config(format!("{}: {e}", path.display()))
        })
    }

    /// Write this configuration as pretty JSON.
    pub fn save_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Append `other`'s arguments after ours.
    pub fn merge(&mut self, other: AppConfig) {
        self.default_args.extend(other.default_args);
        for (name, args) in other.profiles {
            self.profiles.entry(name).or_default().extend(args);
        }
    }

    /// Arguments contributed by configuration: defaults, then the profile.
    pub fn args_for(&self, profile: Option<&str>) -> Result<Vec<String>> {
        let mut args = self.default_args.clone();
        if let Some(name) = profile {
            let extra = self
                .profiles
                .get(name)
                .ok_or_else(|| ScanhelperError::Config(format!("no such profile: {name:?}")))?;
            args.extend(extra.iter().cloned());
        }
        Ok(args)
    }
}

/// The environment variables that decide where configuration lives.
#[derive(Debug, Clone, Default)]
pub struct ConfigEnv {
    pub xdg_config_home: Option<String>,
    pub xdg_config_dirs: Option<String>,
    pub home: Option<String>,
}

impl ConfigEnv {
    /// Snapshot the current process environment.
    pub fn from_process() -> Self {
        Self {
            xdg_config_home: std::env::var("XDG_CONFIG_HOME").ok(),
            xdg_config_dirs: std::env::var("XDG_CONFIG_DIRS").ok(),
            home: std::env::var("HOME").ok(),
        }
    }

    /// The user's configuration directory.  Relative or empty
    /// `XDG_CONFIG_HOME` values are ignored, as XDG requires.
    pub fn config_home(&self) -> PathBuf {
        match self.xdg_config_home.as_deref() {
            Some(dir) if Path::new(dir).is_absolute() => PathBuf::from(dir),
            _ => {
                let home = self.home.as_deref().unwrap_or("/");
                PathBuf::from(home).join(".config")
            }
        }
    }

    /// Candidate configuration files, most personal first.  The first entry
    /// is the one `--show-config` reports as writable.
    pub fn config_paths(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.config_home()];
        let system = match self.xdg_config_dirs.as_deref() {
            Some(value) if !value.is_empty() => value,
            _ => "/etc/xdg",
        };
        dirs.extend(
            system
                .split(':')
                .filter(|dir| Path::new(dir).is_absolute())
                .map(PathBuf::from),
        );
        dirs.into_iter()
            .map(|dir| dir.join("scanhelper").join(CONFIG_FILE))
            .collect()
    }
}
