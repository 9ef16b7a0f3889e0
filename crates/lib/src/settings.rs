//! Deployment settings.
//!
//! Settings are layered, later sources winning:
//! 1. built-in defaults (`~/.config/nix` deployed to `/etc/nixos` or `/etc/nix-config`)
//! 2. `concierge.toml` in the concierge config dir, or an explicit settings file
//! 3. `CONCIERGE_CONFIG_PATH` / `CONCIERGE_INSTALL_PATH`
//! 4. command line flags, applied by the caller through the setters below

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{DEFAULT_SYNC_EXCLUSIONS, FLAKE_FILENAME, FLAKE_LOCK_FILENAME, SETTINGS_FILENAME};
use crate::nix::NixFlags;
use crate::platform::paths::{config_dir, default_config_path, expand_tilde};
use crate::platform::{HostOs, PlatformError, default_install_path, detect_host_os};

pub const CONFIG_PATH_ENV: &str = "CONCIERGE_CONFIG_PATH";
pub const INSTALL_PATH_ENV: &str = "CONCIERGE_INSTALL_PATH";

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error("settings file not found: {0}")]
  NotFound(PathBuf),

  #[error("failed to read settings file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid settings file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

/// The git repository the working config is kept in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoSettings {
  pub url: String,
  #[serde(default = "default_branch")]
  pub branch: String,
  /// Commit and push `flake.lock` when a deployment changed it.
  #[serde(default)]
  pub auto_commit: bool,
}

fn default_branch() -> String {
  "main".to_string()
}

/// On-disk shape of `concierge.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SettingsFile {
  pub config_path: Option<PathBuf>,
  pub install_path: Option<PathBuf>,
  pub target_os: Option<HostOs>,
  pub hostname: Option<String>,
  pub extra_exclusions: Vec<String>,
  pub repo: Option<RepoSettings>,
}

impl SettingsFile {
  pub fn parse(path: &Path, contents: &str) -> Result<Self, SettingsError> {
    toml::from_str(contents).map_err(|source| SettingsError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Read `explicit`, or the default settings file if there is one.
  pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
    let path = match explicit {
      Some(path) if !path.is_file() => return Err(SettingsError::NotFound(path.to_path_buf())),
      Some(path) => path.to_path_buf(),
      None => {
        let default = config_dir()?.join(SETTINGS_FILENAME);
        if !default.is_file() {
          debug!(path = %default.display(), "no settings file, using defaults");
          return Ok(Self::default());
        }
        default
      }
    };

    let contents = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
      path: path.clone(),
      source,
    })?;
    debug!(path = %path.display(), "loaded settings file");
    Self::parse(&path, &contents)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
  pub force_evaluation: bool,
  pub update: bool,
  pub fallback: bool,
  pub show_trace: bool,
  pub update_input: Option<String>,
  /// The working flake, usually a git checkout the user edits.
  pub config_path: PathBuf,
  /// Where the flake is copied to and built from.
  pub install_path: PathBuf,
  pub host_os: HostOs,
  /// Overrides the system hostname when locating per-host config.
  pub hostname: Option<String>,
  pub sync_exclusions: Vec<String>,
  pub repo: Option<RepoSettings>,
}

impl Settings {
  /// Defaults for the given paths and host, with no flags set.
  pub fn new(config_path: PathBuf, install_path: PathBuf, host_os: HostOs) -> Self {
    Self {
      force_evaluation: false,
      update: false,
      fallback: false,
      show_trace: false,
      update_input: None,
      config_path,
      install_path,
      host_os,
      hostname: None,
      sync_exclusions: DEFAULT_SYNC_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
      repo: None,
    }
  }

  /// Resolve settings from defaults, the settings file and the environment.
  ///
  /// `target_os` takes precedence over the settings file, which takes
  /// precedence over the detected host.
  pub fn load(settings_file: Option<&Path>, target_os: Option<HostOs>) -> Result<Self, SettingsError> {
    let file = SettingsFile::load(settings_file)?;
    Self::from_sources(file, target_os)
  }

  pub fn from_sources(file: SettingsFile, target_os: Option<HostOs>) -> Result<Self, SettingsError> {
    let host_os = match target_os.or(file.target_os) {
      Some(os) => os,
      None => detect_host_os()?,
    };

    let config_path = match env_path(CONFIG_PATH_ENV).or(file.config_path) {
      Some(path) => expand_tilde(&path)?,
      None => default_config_path()?,
    };
    let install_path = match env_path(INSTALL_PATH_ENV).or(file.install_path) {
      Some(path) => expand_tilde(&path)?,
      None => default_install_path(&host_os),
    };

    let mut settings = Self::new(config_path, install_path, host_os);
    settings.hostname = file.hostname;
    settings.repo = file.repo;
    for exclusion in file.extra_exclusions {
      settings.push_exclusion(exclusion);
    }

    debug!(?settings, "settings resolved");
    Ok(settings)
  }

  pub fn force_evaluation(&mut self) {
    self.force_evaluation = true;
  }

  pub fn update(&mut self) {
    self.update = true;
  }

  pub fn fallback(&mut self) {
    self.fallback = true;
  }

  pub fn show_trace(&mut self) {
    self.show_trace = true;
  }

  pub fn update_input(&mut self, input: impl Into<String>) {
    self.update_input = Some(input.into());
  }

  pub fn set_config_path(&mut self, path: &Path) -> Result<(), SettingsError> {
    self.config_path = expand_tilde(path)?;
    Ok(())
  }

  pub fn set_install_path(&mut self, path: &Path) -> Result<(), SettingsError> {
    self.install_path = expand_tilde(path)?;
    Ok(())
  }

  pub fn push_exclusion(&mut self, exclusion: impl Into<String>) {
    let exclusion = exclusion.into();
    if !self.sync_exclusions.contains(&exclusion) {
      self.sync_exclusions.push(exclusion);
    }
  }

  pub fn flake_file(&self) -> PathBuf {
    self.config_path.join(FLAKE_FILENAME)
  }

  pub fn flake_lock_file(&self) -> PathBuf {
    self.config_path.join(FLAKE_LOCK_FILENAME)
  }

  pub fn nix_flags(&self) -> NixFlags {
    NixFlags {
      show_trace: self.show_trace,
      fallback: self.fallback,
    }
  }
}

fn env_path(var: &str) -> Option<PathBuf> {
  std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}
