//! Implementation of the `concierge deploy` command, the default.
//!
//! A deployment:
//! - installs Nix if it is missing
//! - brings the working config up to date with its git remote, if one is configured
//! - plans and runs the deployment (tagging, compose2nix, rsync, rebuild)
//! - commits an updated `flake.lock` back, if enabled
//!
//! With `--dry-run` only the plan is built and each step is logged.

use anyhow::{Context, Result, bail};
use chrono::Local;
use tracing::debug;

use concierge_lib::execute::{ExecuteOptions, execute_plan};
use concierge_lib::nix::install_nix;
use concierge_lib::plan::build_plan;
use concierge_lib::sync::{SyncOutcome, commit_lock_changes, sync_config_repo};

use super::sync::print_outcome;
use super::{DeployArgs, GlobalArgs, plan::print_plan, resolve_hostname, resolve_settings, runtime};
use crate::output::{format_duration, print_error, print_info, print_stat, print_success, truncate_hash};

pub fn cmd_deploy(global: &GlobalArgs, args: &DeployArgs) -> Result<()> {
  let settings = resolve_settings(global, args)?;
  let rt = runtime()?;

  if args.skip_install || args.dry_run {
    debug!("skipping nix installation check");
  } else if rt.block_on(install_nix(&settings.host_os)).context("Failed to install Nix")? {
    print_success("Installed Nix");
  }

  let outcome: Option<SyncOutcome> = match &settings.repo {
    Some(_) if args.dry_run => None,
    Some(repo) => {
      let outcome = rt
        .block_on(sync_config_repo(&settings.config_path, repo))
        .context("Failed to sync config repository")?;
      print_outcome(&outcome, &settings.config_path);
      Some(outcome)
    }
    None => None,
  };

  let hostname = resolve_hostname(&settings)?;
  let plan = build_plan(&settings, &hostname, Local::now()).context("Failed to plan deployment")?;
  print_plan(&plan);
  println!();

  let result = rt
    .block_on(execute_plan(&plan, &ExecuteOptions { dry_run: args.dry_run }))
    .context("Deployment failed")?;

  if let Some((index, err)) = &result.failed {
    print_error(&format!("Step {}/{} failed: {}", index + 1, result.total, err));
    print_stat("Completed", &format!("{}/{}", result.completed, result.total));
    bail!("deployment of {} did not complete", plan.hostname);
  }

  println!();
  if args.dry_run {
    print_info(&format!("Dry run: {} steps checked, nothing changed", result.total));
    return Ok(());
  }

  print_success(&format!(
    "Deployed {} in {}",
    plan.hostname,
    format_duration(result.duration)
  ));

  if result.lock_changed() {
    let before = result.lock_before.as_ref().map_or("none", |h| truncate_hash(&h.0));
    let after = result.lock_after.as_ref().map_or("none", |h| truncate_hash(&h.0));
    print_info(&format!("flake.lock changed: {} -> {}", before, after));
  }

  if let (Some(repo), Some(outcome)) = (&settings.repo, outcome) {
    let committed = rt
      .block_on(commit_lock_changes(
        &settings.config_path,
        repo,
        outcome.is_clean(),
        result.lock_before.as_ref(),
        result.lock_after.as_ref(),
      ))
      .context("Failed to commit flake.lock")?;
    if committed {
      print_success(&format!("Committed and pushed flake.lock to {}", repo.branch));
    }
  }

  Ok(())
}
