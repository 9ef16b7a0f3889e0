//! Deployment planning.
//!
//! A [`DeployPlan`] is the complete, ordered list of steps a deployment will
//! take. Building one only reads the working configuration; nothing is
//! changed until the plan is handed to [`crate::execute::execute_plan`].
//! `concierge plan` prints it, `concierge deploy` runs it.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::compose::{ComposeError, ComposeProject, discover_projects};
use crate::consts::COMPOSE_FILENAME;
use crate::nix::{self, NixError};
use crate::platform::HostOs;
use crate::process::CommandSpec;
use crate::rsync::Rsync;
use crate::settings::Settings;
use crate::util::fs::{FsError, search_files_with_name};

#[derive(Debug, Error)]
pub enum PlanError {
  #[error("flake.nix not found in expected location: {0}")]
  MissingFlake(PathBuf),

  #[error(transparent)]
  Nix(#[from] NixError),

  #[error("failed to discover compose projects: {0}")]
  Compose(#[from] ComposeError),

  #[error(transparent)]
  Fs(#[from] FsError),
}

/// A single unit of work in a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
  /// Back up a file, then tag it so Nix re-evaluates it.
  BackupAndTag { file: PathBuf },
  /// Tag a file without backing it up.
  Tag { file: PathBuf },
  /// Convert a compose project to Nix.
  Compose(ComposeProject),
  /// Copy files between the working config and the install location.
  Rsync(Rsync),
  /// Run a Nix command.
  Nix { purpose: String, command: CommandSpec },
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Step::BackupAndTag { file } => write!(f, "back up and tag {}", file.display()),
      Step::Tag { file } => write!(f, "tag {}", file.display()),
      Step::Compose(project) => write!(f, "compose2nix for '{}': {}", project.name, project.command),
      Step::Rsync(rsync) => write!(
        f,
        "sync {} -> {}",
        rsync.source.display(),
        rsync.destination.display()
      ),
      Step::Nix { purpose, command } => write!(f, "{}: {}", purpose, command),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployPlan {
  pub hostname: String,
  pub host_os: HostOs,
  pub config_path: PathBuf,
  pub install_path: PathBuf,
  /// Written into tag lines and backup names.
  pub timestamp: DateTime<Local>,
  pub steps: Vec<Step>,
}

impl DeployPlan {
  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }
}

/// Work out every step needed to deploy `settings` on `hostname`.
///
/// Steps run in this order:
/// 1. back up and tag `flake.nix` (`force_evaluation`)
/// 2. convert compose projects for this host
/// 3. tag every `docker-compose.yml` so images are re-pulled (`update`)
/// 4. bump a single flake input (`update_input`)
/// 5. copy the config to the install location
/// 6. `nix flake update` (`update`)
/// 7. rebuild and switch
/// 8. copy changed lock files back to the working config
pub fn build_plan(settings: &Settings, hostname: &str, timestamp: DateTime<Local>) -> Result<DeployPlan, PlanError> {
  let flake = settings.flake_file();
  if !flake.is_file() {
    return Err(PlanError::MissingFlake(flake));
  }

  // Fail before planning anything else on hosts we cannot rebuild.
  let rebuild = nix::rebuild_command(&settings.install_path, &settings.host_os)?;

  let mut steps = Vec::new();

  if settings.force_evaluation {
    steps.push(Step::BackupAndTag { file: flake });
  }

  for project in discover_projects(&settings.config_path, hostname)? {
    steps.push(Step::Compose(project));
  }

  if settings.update {
    for file in search_files_with_name(&settings.config_path, COMPOSE_FILENAME)? {
      steps.push(Step::Tag { file });
    }
  }

  if let Some(input) = &settings.update_input {
    steps.push(Step::Nix {
      purpose: format!("update input '{}'", input),
      command: nix::update_input_command(&settings.config_path, input),
    });
  }

  steps.push(Step::Rsync(Rsync::to_install(
    &settings.config_path,
    &settings.install_path,
    &settings.sync_exclusions,
  )));

  if settings.update {
    steps.push(Step::Nix {
      purpose: "update flake inputs".to_string(),
      command: nix::flake_update_command(&settings.install_path, &settings.host_os, settings.nix_flags())?,
    });
  }

  steps.push(Step::Nix {
    purpose: "rebuild and switch".to_string(),
    command: rebuild,
  });

  steps.push(Step::Rsync(Rsync::locks_back(&settings.install_path, &settings.config_path)));

  debug!(steps = steps.len(), hostname, "deployment planned");

  Ok(DeployPlan {
    hostname: hostname.to_string(),
    host_os: settings.host_os.clone(),
    config_path: settings.config_path.clone(),
    install_path: settings.install_path.clone(),
    timestamp,
    steps,
  })
}
