use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use cmd::{DeployArgs, GlobalArgs, PlanArgs};

/// concierge - deploy your Nix flake configuration to this machine
#[derive(Parser)]
#[command(name = "concierge")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
  #[command(flatten)]
  global: GlobalArgs,

  /// Flags for the default `deploy` command
  #[command(flatten)]
  deploy: DeployArgs,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Deploy the working configuration and rebuild the system (default)
  Deploy(DeployArgs),

  /// Show the steps a deployment would take, without running them
  Plan(PlanArgs),

  /// Bring the working configuration up to date with its git remote
  Sync,

  /// Show detected platform, host and resolved paths
  Info {
    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: output::OutputFormat,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  // RUST_LOG wins; --verbose only changes the default
  let default_level = if cli.global.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    None => cmd::cmd_deploy(&cli.global, &cli.deploy),
    Some(Commands::Deploy(args)) => cmd::cmd_deploy(&cli.global, &args),
    Some(Commands::Plan(args)) => cmd::cmd_plan(&cli.global, &args),
    Some(Commands::Sync) => cmd::cmd_sync(&cli.global),
    Some(Commands::Info { output }) => cmd::cmd_info(&cli.global, output),
  }
}
