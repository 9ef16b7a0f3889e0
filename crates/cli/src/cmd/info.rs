//! Implementation of the `concierge info` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use concierge_lib::consts::SETTINGS_FILENAME;
use concierge_lib::nix::is_nix_installed;
use concierge_lib::platform::{self, HostOs, Platform, paths};
use concierge_lib::settings::Settings;

use super::{GlobalArgs, runtime};
use crate::output::{OutputFormat, print_json, print_stat};

#[derive(Debug, Serialize)]
struct Info {
  platform: Option<String>,
  host_os: HostOs,
  hostname: Option<String>,
  settings_file: PathBuf,
  config_path: PathBuf,
  install_path: PathBuf,
  nix_installed: bool,
}

pub fn cmd_info(global: &GlobalArgs, output: OutputFormat) -> Result<()> {
  let settings = Settings::load(global.settings.as_deref(), None).context("Failed to load settings")?;
  let settings_file = match &global.settings {
    Some(path) => path.clone(),
    None => paths::config_dir()?.join(SETTINGS_FILENAME),
  };

  let info = Info {
    platform: Platform::current().map(|p| p.triple()),
    host_os: settings.host_os.clone(),
    hostname: settings.hostname.clone().or_else(|| platform::hostname().ok()),
    settings_file,
    config_path: settings.config_path.clone(),
    install_path: settings.install_path.clone(),
    nix_installed: runtime()?.block_on(is_nix_installed()),
  };

  if output.is_json() {
    return print_json(&info);
  }

  println!("System:");
  print_stat("Platform", info.platform.as_deref().unwrap_or("unknown"));
  print_stat("Host OS", &info.host_os.to_string());
  print_stat("Hostname", info.hostname.as_deref().unwrap_or("unknown"));
  print_stat("Nix installed", if info.nix_installed { "yes" } else { "no" });
  println!("Paths:");
  print_stat("Settings", &info.settings_file.display().to_string());
  print_stat("Config", &info.config_path.display().to_string());
  print_stat("Install", &info.install_path.display().to_string());
  Ok(())
}
