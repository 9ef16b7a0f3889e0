//! Implementation of the `concierge sync` command.

use std::path::Path;

use anyhow::{Context, Result};

use concierge_lib::git::RepoStatus;
use concierge_lib::settings::Settings;
use concierge_lib::sync::{SyncError, SyncOutcome, sync_config_repo};

use super::{GlobalArgs, runtime};
use crate::output::{print_info, print_success, print_warning};

pub fn cmd_sync(global: &GlobalArgs) -> Result<()> {
  let settings = Settings::load(global.settings.as_deref(), None).context("Failed to load settings")?;
  let repo = settings.repo.as_ref().ok_or(SyncError::NotConfigured)?;

  let outcome = runtime()?
    .block_on(sync_config_repo(&settings.config_path, repo))
    .context("Failed to sync config repository")?;
  print_outcome(&outcome, &settings.config_path);
  Ok(())
}

pub(crate) fn print_outcome(outcome: &SyncOutcome, path: &Path) {
  match outcome {
    SyncOutcome::Cloned => print_success(&format!("Cloned config into {}", path.display())),
    SyncOutcome::Pulled => print_success("Pulled latest config from remote"),
    SyncOutcome::Dirty => print_warning("Config has uncommitted changes, deploying it as is"),
    SyncOutcome::UpToDate(RepoStatus::Ahead) => print_info("Config is ahead of remote, remember to push"),
    SyncOutcome::UpToDate(_) => print_info("Config is up to date with remote"),
  }
}
