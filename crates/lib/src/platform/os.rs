use std::fmt;

use serde::{Deserialize, Serialize};

/// Operating system families concierge can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
}

impl Os {
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// The kind of host a configuration is deployed to.
///
/// Only NixOS and macOS (via nix-darwin) can be rebuilt; other Linux
/// distributions are recognised so they can be reported, not deployed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum HostOs {
  NixOs,
  Darwin,
  OtherLinux(String),
}

impl HostOs {
  /// Parse a distribution id or OS name. Never fails: unknown names are
  /// treated as some other Linux distribution.
  pub fn parse(name: &str) -> Self {
    match name.trim().to_ascii_lowercase().as_str() {
      "nixos" => Self::NixOs,
      "darwin" | "macos" => Self::Darwin,
      other => Self::OtherLinux(other.to_string()),
    }
  }

  pub fn is_darwin(&self) -> bool {
    matches!(self, Self::Darwin)
  }
}

impl fmt::Display for HostOs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::NixOs => write!(f, "nixos"),
      Self::Darwin => write!(f, "darwin"),
      Self::OtherLinux(distro) => write!(f, "{}", distro),
    }
  }
}

impl From<String> for HostOs {
  fn from(value: String) -> Self {
    Self::parse(&value)
  }
}

impl From<HostOs> for String {
  fn from(value: HostOs) -> Self {
    value.to_string()
  }
}
