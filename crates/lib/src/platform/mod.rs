//! Host detection.
//!
//! Deployment differs per host: NixOS rebuilds with `nixos-rebuild`, macOS with
//! `darwin-rebuild`, and the install location depends on which one we are on.

pub mod os;
pub mod paths;

use std::fmt;
use std::path::PathBuf;

use sysinfo::System;
use thiserror::Error;

pub use os::{HostOs, Os};

#[derive(Debug, Error)]
pub enum PlatformError {
  #[error("unsupported operating system: {0}")]
  Unsupported(String),

  #[error("failed to determine the system hostname")]
  Hostname,

  #[error("HOME is not set")]
  HomeNotSet,
}

/// Platform identifier combining architecture and OS (e.g., "aarch64-darwin")
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
  pub arch: &'static str,
  pub os: Os,
}

impl Platform {
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: std::env::consts::ARCH,
      os: Os::current()?,
    })
  }

  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

/// Detect which flavour of host we are deploying to.
///
/// Linux hosts are told apart by their distribution id, so only NixOS maps to
/// [`HostOs::NixOs`]; every other distribution becomes [`HostOs::OtherLinux`].
pub fn detect_host_os() -> Result<HostOs, PlatformError> {
  match Os::current() {
    Some(Os::MacOs) => Ok(HostOs::Darwin),
    Some(Os::Linux) => Ok(HostOs::parse(&System::distribution_id())),
    None => Err(PlatformError::Unsupported(std::env::consts::OS.to_string())),
  }
}

/// The system hostname, used to locate per-host configuration.
pub fn hostname() -> Result<String, PlatformError> {
  System::host_name()
    .filter(|name| !name.is_empty())
    .ok_or(PlatformError::Hostname)
}

/// Where the flake gets installed and built from.
pub fn default_install_path(host: &HostOs) -> PathBuf {
  match host {
    HostOs::NixOs => PathBuf::from("/etc/nixos"),
    _ => PathBuf::from("/etc/nix-config"),
  }
}
