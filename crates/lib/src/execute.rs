//! Running a deployment plan.
//!
//! Steps run strictly in order and execution stops at the first failure:
//! every later step depends on the earlier ones (the rebuild needs the synced
//! config, the lock pull-back needs the rebuild).

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::plan::{DeployPlan, Step};
use crate::process::{self, ProcessError};
use crate::tag::{self, TagError};
use crate::util::hash::{ContentHash, HashError, hash_file_if_exists};

#[derive(Debug, Error)]
pub enum StepError {
  #[error(transparent)]
  Tag(#[from] TagError),

  #[error(transparent)]
  Process(#[from] ProcessError),
}

#[derive(Debug, Error)]
pub enum ExecuteError {
  #[error("failed to hash flake.lock: {0}")]
  Hash(#[from] HashError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
  /// Log each step instead of performing it.
  pub dry_run: bool,
}

/// Outcome of running a plan.
#[derive(Debug)]
pub struct ExecutionResult {
  /// Number of steps that ran to completion.
  pub completed: usize,
  pub total: usize,
  /// Index and error of the step that stopped execution.
  pub failed: Option<(usize, StepError)>,
  /// `flake.lock` in the working config before and after the run.
  pub lock_before: Option<ContentHash>,
  pub lock_after: Option<ContentHash>,
  pub duration: Duration,
}

impl ExecutionResult {
  pub fn is_success(&self) -> bool {
    self.failed.is_none()
  }

  pub fn lock_changed(&self) -> bool {
    self.lock_before != self.lock_after
  }
}

/// Run every step of `plan` in order.
///
/// Step failures are reported in the result rather than as an error so the
/// caller can still see how far the deployment got.
pub async fn execute_plan(plan: &DeployPlan, options: &ExecuteOptions) -> Result<ExecutionResult, ExecuteError> {
  let start = Instant::now();
  let lock_file = plan.config_path.join(crate::consts::FLAKE_LOCK_FILENAME);
  let lock_before = hash_file_if_exists(&lock_file)?;

  let total = plan.steps.len();
  let mut completed = 0;
  let mut failed = None;

  for (index, step) in plan.steps.iter().enumerate() {
    info!(step = index + 1, total, "{}", step);

    if options.dry_run {
      info!("dry run, skipping");
      completed += 1;
      continue;
    }

    match run_step(plan, step).await {
      Ok(()) => completed += 1,
      Err(e) => {
        error!(step = index + 1, error = %e, "step failed");
        failed = Some((index, e));
        break;
      }
    }
  }

  let lock_after = hash_file_if_exists(&lock_file)?;
  if lock_before != lock_after {
    info!(path = %lock_file.display(), "flake.lock changed");
  }

  Ok(ExecutionResult {
    completed,
    total,
    failed,
    lock_before,
    lock_after,
    duration: start.elapsed(),
  })
}

async fn run_step(plan: &DeployPlan, step: &Step) -> Result<(), StepError> {
  match step {
    Step::BackupAndTag { file } => {
      let backup = tag::backup_file(file, &plan.timestamp)?;
      info!(backup = %backup.display(), "backed up");
      tag::tag_file_content(file, &plan.timestamp)?;
    }
    Step::Tag { file } => tag::tag_file_content(file, &plan.timestamp)?,
    Step::Compose(project) => {
      if project.overridden {
        warn!(project = %project.name, command = %project.command, "using command from .compose2nix");
      }
      process::run_streaming(&project.command).await?;
    }
    Step::Rsync(rsync) => process::run_streaming(&rsync.command()).await?,
    Step::Nix { command, .. } => process::run_streaming(command).await?,
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use std::path::{Path, PathBuf};

  use chrono::Local;
  use tempfile::tempdir;
  use tracing_test::traced_test;

  use crate::consts::{BACKUP_DIR, TAG_PREFIX};
  use crate::platform::HostOs;
  use crate::process::CommandSpec;

  fn plan(config: &Path, steps: Vec<Step>) -> DeployPlan {
    DeployPlan {
      hostname: "acomputer".to_string(),
      host_os: HostOs::NixOs,
      config_path: config.to_path_buf(),
      install_path: PathBuf::from("/etc/nixos"),
      timestamp: Local::now(),
      steps,
    }
  }

  fn shell(script: &str) -> Step {
    Step::Nix {
      purpose: "test".to_string(),
      command: CommandSpec::new("/bin/sh", ["-c", script]),
    }
  }

  #[tokio::test]
  async fn tags_and_backs_up_files() {
    let temp = tempdir().unwrap();
    let flake = temp.path().join("flake.nix");
    let compose = temp.path().join("docker-compose.yml");
    fs::write(&flake, "{ }").unwrap();
    fs::write(&compose, "services: {}").unwrap();

    let plan = plan(
      temp.path(),
      vec![
        Step::BackupAndTag { file: flake.clone() },
        Step::Tag { file: compose.clone() },
      ],
    );
    let result = execute_plan(&plan, &ExecuteOptions::default()).await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.completed, 2);
    assert!(fs::read_to_string(&flake).unwrap().contains(TAG_PREFIX));
    assert!(fs::read_to_string(&compose).unwrap().contains(TAG_PREFIX));
    assert_eq!(fs::read_dir(temp.path().join(BACKUP_DIR)).unwrap().count(), 1);
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn stops_at_first_failure() {
    let temp = tempdir().unwrap();
    let marker = temp.path().join("after-failure");

    let plan = plan(
      temp.path(),
      vec![
        shell("true"),
        shell("exit 4"),
        shell(&format!("touch '{}'", marker.display())),
      ],
    );
    let result = execute_plan(&plan, &ExecuteOptions::default()).await.unwrap();

    assert!(!result.is_success());
    assert_eq!(result.completed, 1);
    assert_eq!(result.total, 3);
    assert!(matches!(
      result.failed,
      Some((1, StepError::Process(ProcessError::Failed { code: 4, .. })))
    ));
    assert!(!marker.exists());
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn detects_lock_file_changes() {
    let temp = tempdir().unwrap();
    let lock = temp.path().join("flake.lock");
    fs::write(&lock, "{\"version\": 7}").unwrap();

    let plan = plan(
      temp.path(),
      vec![shell(&format!("echo updated > '{}'", lock.display()))],
    );
    let result = execute_plan(&plan, &ExecuteOptions::default()).await.unwrap();

    assert!(result.is_success());
    assert!(result.lock_changed());
  }

  #[tokio::test]
  #[traced_test]
  async fn dry_run_touches_nothing() {
    let temp = tempdir().unwrap();
    let flake = temp.path().join("flake.nix");
    fs::write(&flake, "{ }").unwrap();

    let plan = plan(
      temp.path(),
      vec![Step::BackupAndTag { file: flake.clone() }, shell("exit 1")],
    );
    let result = execute_plan(&plan, &ExecuteOptions { dry_run: true }).await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.completed, 2);
    assert!(!result.lock_changed());
    assert_eq!(fs::read_to_string(&flake).unwrap(), "{ }");
    assert!(!temp.path().join(BACKUP_DIR).exists());
    assert!(logs_contain("dry run, skipping"));
  }
}
