//! Nix itself: making sure it is installed, and the commands used to update
//! and rebuild a flake configuration.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::platform::HostOs;
use crate::process::{self, CommandSpec, ProcessError};

/// Installer used when Nix is missing. Extras such as nix-darwin are set up by
/// the user's flake afterwards.
pub const NIX_INSTALLER: &str =
  "curl --proto '=https' --tlsv1.2 -sSf -L https://install.determinate.systems/nix | sh -s -- install";

#[derive(Debug, Error)]
pub enum NixError {
  #[error("cannot {action} on {host}: only NixOS and macOS are supported")]
  UnsupportedHost { action: &'static str, host: HostOs },

  #[error("failed to install Nix: {0}")]
  Install(#[source] ProcessError),

  #[error("install path is not valid UTF-8: {0}")]
  NonUtf8Path(String),
}

/// Flags that change how Nix evaluates and builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NixFlags {
  pub show_trace: bool,
  pub fallback: bool,
}

pub async fn is_nix_installed() -> bool {
  process::is_available("nix", "--version").await
}

/// Install Nix unless it is already present.
///
/// Returns `true` when an installation was performed.
pub async fn install_nix(host: &HostOs) -> Result<bool, NixError> {
  if is_nix_installed().await {
    return Ok(false);
  }

  info!(%host, "nix is not installed, running installer");
  let installer = CommandSpec::new("sh", ["-c", NIX_INSTALLER]);
  process::run_streaming(&installer).await.map_err(NixError::Install)?;
  Ok(true)
}

fn path_str(path: &Path) -> Result<&str, NixError> {
  path
    .to_str()
    .ok_or_else(|| NixError::NonUtf8Path(path.to_string_lossy().into_owned()))
}

/// `nix flake update` for the installed flake. Needs root everywhere except
/// macOS, where the install dir is owned by the user.
pub fn flake_update_command(install_path: &Path, host: &HostOs, flags: NixFlags) -> Result<CommandSpec, NixError> {
  let mut args: Vec<&str> = vec!["flake", "update"];
  if flags.show_trace {
    args.push("-vv");
  }
  if flags.fallback {
    args.push("--fallback");
  }
  if flags.show_trace {
    args.push("--show-trace");
  }
  args.push(path_str(install_path)?);

  Ok(as_root(CommandSpec::new("nix", args), host))
}

/// Prefix with `sudo` unless on macOS.
pub fn as_root(spec: CommandSpec, host: &HostOs) -> CommandSpec {
  if host.is_darwin() {
    return spec;
  }
  let mut args = Vec::with_capacity(spec.args.len() + 1);
  args.push(spec.program);
  args.extend(spec.args);
  CommandSpec {
    program: "sudo".to_string(),
    args,
    cwd: spec.cwd,
  }
}

/// Bump a single flake input in the working config.
pub fn update_input_command(config_path: &Path, input: &str) -> CommandSpec {
  CommandSpec::new("nix", ["flake", "lock", "--update-input", input]).in_dir(config_path)
}

/// Build and activate the installed configuration.
pub fn rebuild_command(install_path: &Path, host: &HostOs) -> Result<CommandSpec, NixError> {
  match host {
    HostOs::NixOs => Ok(CommandSpec::new("sudo", ["nixos-rebuild", "switch"])),
    HostOs::Darwin => Ok(CommandSpec::new(
      "darwin-rebuild",
      ["switch", "--flake", path_str(install_path)?],
    )),
    HostOs::OtherLinux(_) => Err(NixError::UnsupportedHost {
      action: "rebuild the system",
      host: host.clone(),
    }),
  }
}
