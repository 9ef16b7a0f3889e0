mod deploy;
mod info;
mod plan;
mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use concierge_lib::platform::{self, HostOs};
use concierge_lib::settings::Settings;

pub use deploy::cmd_deploy;
pub use info::cmd_info;
pub use plan::cmd_plan;
pub use sync::cmd_sync;

/// Flags shared by every command.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
  /// Enable verbose logging
  #[arg(long, global = true)]
  pub verbose: bool,

  /// Settings file to use instead of ~/.config/concierge/concierge.toml
  #[arg(long, global = true, value_name = "FILE")]
  pub settings: Option<PathBuf>,
}

/// Flags describing a deployment.
#[derive(Debug, Clone, Default, Args)]
pub struct DeployArgs {
  /// Tag flake.nix so Nix re-evaluates the configuration
  #[arg(short = 'e', long)]
  pub force_eval: bool,

  /// Update all flake inputs and re-pull compose images
  #[arg(short, long)]
  pub update: bool,

  /// Build from source when a substitute is unavailable
  #[arg(short, long)]
  pub fallback: bool,

  /// Show Nix evaluation traces
  #[arg(short, long)]
  pub show_trace: bool,

  /// Update a single flake input
  #[arg(short = 'i', long, value_name = "INPUT")]
  pub update_input: Option<String>,

  /// Working flake configuration directory
  #[arg(long, value_name = "DIR")]
  pub config_path: Option<PathBuf>,

  /// Directory the flake is installed to and built from
  #[arg(long, value_name = "DIR")]
  pub install_path: Option<PathBuf>,

  /// Hostname used to find per-host configuration
  #[arg(long, value_name = "HOSTNAME")]
  pub host: Option<String>,

  /// Deploy as if on this host OS (nixos, darwin)
  #[arg(long, value_name = "OS", value_parser = parse_host_os)]
  pub target_os: Option<HostOs>,

  /// Don't install Nix when it is missing
  #[arg(long)]
  pub skip_install: bool,

  /// Walk through the deployment without installing, syncing or running any step
  #[arg(long)]
  pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
  #[command(flatten)]
  pub deploy: DeployArgs,

  /// Output format
  #[arg(short, long, value_enum, default_value_t)]
  pub output: crate::output::OutputFormat,
}

fn parse_host_os(value: &str) -> Result<HostOs, String> {
  Ok(HostOs::parse(value))
}

/// Resolve settings from the settings file, environment and `args`.
pub(crate) fn resolve_settings(global: &GlobalArgs, args: &DeployArgs) -> Result<Settings> {
  let mut settings =
    Settings::load(global.settings.as_deref(), args.target_os.clone()).context("Failed to load settings")?;

  if args.force_eval {
    settings.force_evaluation();
  }
  if args.update {
    settings.update();
  }
  if args.fallback {
    settings.fallback();
  }
  if args.show_trace {
    settings.show_trace();
  }
  if let Some(input) = &args.update_input {
    settings.update_input(input);
  }
  if let Some(path) = &args.config_path {
    settings.set_config_path(path)?;
  }
  if let Some(path) = &args.install_path {
    settings.set_install_path(path)?;
  }
  if let Some(host) = &args.host {
    settings.hostname = Some(host.clone());
  }

  Ok(settings)
}

/// The hostname per-host config is looked up by.
pub(crate) fn resolve_hostname(settings: &Settings) -> Result<String> {
  match &settings.hostname {
    Some(host) => Ok(host.clone()),
    None => platform::hostname().context("Failed to determine hostname (pass --host)"),
  }
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}
