//! Keeping the working configuration in step with its git remote.
//!
//! Before a deployment the working config is brought up to date with the
//! remote, and afterwards a changed `flake.lock` can be committed back. Git is
//! never touched while the working tree has uncommitted changes: those belong
//! to the user and are deployed as they are.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::consts::FLAKE_LOCK_FILENAME;
use crate::git::{self, GitError, RepoStatus};
use crate::process::{self, CommandSpec, ProcessError};
use crate::settings::RepoSettings;
use crate::util::fs::{FsError, is_directory_empty};
use crate::util::hash::ContentHash;

#[derive(Debug, Error)]
pub enum SyncError {
  #[error("no config repository configured (set [repo] url in concierge.toml)")]
  NotConfigured,

  #[error("failed to create config dir {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("config dir {0} is not empty and is not a git repository")]
  NotARepo(PathBuf),

  #[error("config dir {path} is a git repository but does not have expected remote {url}")]
  WrongRemote { path: PathBuf, url: String },

  #[error(
    "repository {0} has diverged from its remote: both have commits the other lacks. \
     Reconcile it manually before deploying."
  )]
  Diverged(PathBuf),

  #[error(transparent)]
  Git(#[from] GitError),

  #[error(transparent)]
  Fs(#[from] FsError),

  #[error(transparent)]
  Process(#[from] ProcessError),
}

/// What [`sync_config_repo`] found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
  /// The repo was cloned fresh.
  Cloned,
  /// Uncommitted changes present; git was left alone.
  Dirty,
  /// The local branch was behind and has been fast-forwarded.
  Pulled,
  /// Local is level with or ahead of the remote.
  UpToDate(RepoStatus),
}

impl SyncOutcome {
  /// Whether the tree was clean, i.e. lock changes may be committed afterwards.
  pub fn is_clean(&self) -> bool {
    !matches!(self, SyncOutcome::Dirty)
  }
}

/// Make sure `target` holds an up-to-date checkout of `repo`.
///
/// - missing or empty dir: clone into it
/// - non-empty dir that is not the expected repository: error, left for the user
/// - uncommitted changes: leave git alone
/// - behind the remote: fast-forward
/// - diverged from the remote: error
pub async fn sync_config_repo(target: &Path, repo: &RepoSettings) -> Result<SyncOutcome, SyncError> {
  if !target.exists() {
    info!(path = %target.display(), "config dir does not exist, creating");
    fs::create_dir_all(target).map_err(|source| SyncError::CreateDir {
      path: target.to_path_buf(),
      source,
    })?;
    git::clone_repo(&repo.url, target)?;
    return Ok(SyncOutcome::Cloned);
  }

  if is_directory_empty(target)? {
    git::clone_repo(&repo.url, target)?;
    return Ok(SyncOutcome::Cloned);
  }

  if !git::is_git_repo(target) {
    return Err(SyncError::NotARepo(target.to_path_buf()));
  }

  if !git::repo_has_remote(target, &repo.url)? {
    return Err(SyncError::WrongRemote {
      path: target.to_path_buf(),
      url: repo.url.clone(),
    });
  }

  if !git::is_working_tree_clean(target)? {
    warn!(path = %target.display(), "working tree is not clean, deploying without touching git");
    return Ok(SyncOutcome::Dirty);
  }

  match git::repo_status(target, &repo.branch)? {
    RepoStatus::Behind => {
      info!(branch = %repo.branch, "local repo is behind remote, pulling before deployment");
      process::run_streaming(&pull_command(target, &repo.branch)).await?;
      Ok(SyncOutcome::Pulled)
    }
    RepoStatus::Complex => Err(SyncError::Diverged(target.to_path_buf())),
    status => {
      debug!(?status, "config repo needs no pull");
      Ok(SyncOutcome::UpToDate(status))
    }
  }
}

pub fn pull_command(repo_path: &Path, branch: &str) -> CommandSpec {
  CommandSpec::new("git", ["pull", "--ff-only", "origin", branch]).in_dir(repo_path)
}

/// Commands that commit and push an updated `flake.lock`.
pub fn lock_commit_commands(repo_path: &Path, branch: &str) -> Vec<CommandSpec> {
  vec![
    CommandSpec::new("git", ["add", FLAKE_LOCK_FILENAME]).in_dir(repo_path),
    CommandSpec::new("git", ["commit", "-m", "Update flake.lock"]).in_dir(repo_path),
    CommandSpec::new("git", ["push", "origin", branch]).in_dir(repo_path),
  ]
}

/// Commit and push `flake.lock` if a deployment changed it.
///
/// Only happens when `auto_commit` is on and the tree was clean before the
/// deployment, so nothing but the lock file ends up in the commit. Returns
/// whether a commit was made.
pub async fn commit_lock_changes(
  repo_path: &Path,
  repo: &RepoSettings,
  was_clean: bool,
  before: Option<&ContentHash>,
  after: Option<&ContentHash>,
) -> Result<bool, SyncError> {
  if !repo.auto_commit || !was_clean || before == after {
    debug!(auto_commit = repo.auto_commit, was_clean, changed = before != after, "not committing flake.lock");
    return Ok(false);
  }

  info!(path = %repo_path.display(), "committing updated flake.lock");
  for command in lock_commit_commands(repo_path, &repo.branch) {
    process::run_streaming(&command).await?;
  }
  Ok(true)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::tempdir;

  use crate::util::testutil::{OriginFixture, commit_local, git};

  fn repo_settings(auto_commit: bool) -> RepoSettings {
    RepoSettings {
      url: "https://example.com/me/nix-config.git".to_string(),
      branch: "main".to_string(),
      auto_commit,
    }
  }

  fn hash(s: &str) -> ContentHash {
    ContentHash(s.to_string())
  }

  #[tokio::test]
  async fn non_repo_directory_is_rejected() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("flake.nix"), "{ }").unwrap();

    let result = sync_config_repo(temp.path(), &repo_settings(false)).await;
    assert!(matches!(result, Err(SyncError::NotARepo(_))));
  }

  #[tokio::test]
  async fn repo_with_other_remote_is_rejected() {
    let temp = tempdir().unwrap();
    gix::init(temp.path()).unwrap();
    let config = temp.path().join(".git").join("config");
    let mut contents = fs::read_to_string(&config).unwrap();
    contents.push_str("[remote \"origin\"]\n\turl = https://example.com/someone/else.git\n");
    fs::write(&config, contents).unwrap();

    let result = sync_config_repo(temp.path(), &repo_settings(false)).await;
    assert!(matches!(result, Err(SyncError::WrongRemote { .. })));
  }

  #[tokio::test]
  async fn dirty_repo_is_left_alone() {
    let temp = tempdir().unwrap();
    gix::init(temp.path()).unwrap();
    let config = temp.path().join(".git").join("config");
    let mut contents = fs::read_to_string(&config).unwrap();
    contents.push_str("[remote \"origin\"]\n\turl = git@example.com:me/nix-config.git\n");
    fs::write(&config, contents).unwrap();
    fs::write(temp.path().join("flake.nix"), "{ }").unwrap();

    let outcome = sync_config_repo(temp.path(), &repo_settings(false)).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Dirty);
    assert!(!outcome.is_clean());
  }

  #[test]
  fn commit_commands_stay_in_repo() {
    let cmds = lock_commit_commands(Path::new("/cfg"), "main");
    let rendered: Vec<String> = cmds.iter().map(|c| c.to_string()).collect();
    assert_eq!(
      rendered,
      vec![
        "git add flake.lock",
        "git commit -m \"Update flake.lock\"",
        "git push origin main"
      ]
    );
    assert!(cmds.iter().all(|c| c.cwd == Some(PathBuf::from("/cfg"))));
  }

  #[test]
  fn pull_is_fast_forward_only() {
    assert_eq!(
      pull_command(Path::new("/cfg"), "main").to_string(),
      "git pull --ff-only origin main"
    );
  }

  #[tokio::test]
  async fn lock_commit_skipped_without_auto_commit() {
    let repo = repo_settings(false);
    let committed = commit_lock_changes(Path::new("/cfg"), &repo, true, Some(&hash("a")), Some(&hash("b")))
      .await
      .unwrap();
    assert!(!committed);
  }

  #[tokio::test]
  async fn lock_commit_skipped_when_tree_was_dirty() {
    let repo = repo_settings(true);
    let committed = commit_lock_changes(Path::new("/cfg"), &repo, false, Some(&hash("a")), Some(&hash("b")))
      .await
      .unwrap();
    assert!(!committed);
  }

  #[tokio::test]
  async fn lock_commit_skipped_when_unchanged() {
    let repo = repo_settings(true);
    let committed = commit_lock_changes(Path::new("/cfg"), &repo, true, Some(&hash("a")), Some(&hash("a")))
      .await
      .unwrap();
    assert!(!committed);
  }

  fn local_repo(fixture: &OriginFixture, auto_commit: bool) -> RepoSettings {
    RepoSettings {
      url: fixture.url(),
      branch: "main".to_string(),
      auto_commit,
    }
  }

  #[tokio::test]
  #[serial]
  async fn missing_dir_is_cloned_then_up_to_date() {
    let fixture = OriginFixture::new();
    let work = fixture.work_dir();
    let repo = local_repo(&fixture, false);

    let outcome = sync_config_repo(&work, &repo).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Cloned);
    assert!(work.join("flake.nix").is_file());

    let outcome = sync_config_repo(&work, &repo).await.unwrap();
    assert_eq!(outcome, SyncOutcome::UpToDate(RepoStatus::Same));
    assert!(outcome.is_clean());
  }

  #[tokio::test]
  #[serial]
  async fn empty_dir_is_cloned() {
    let fixture = OriginFixture::new();
    let work = fixture.work_dir();
    fs::create_dir_all(&work).unwrap();

    let outcome = sync_config_repo(&work, &local_repo(&fixture, false)).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Cloned);
    assert!(work.join("flake.nix").is_file());
  }

  #[tokio::test]
  #[serial]
  async fn behind_remote_is_fast_forwarded() {
    let fixture = OriginFixture::new();
    let work = fixture.work_dir();
    let repo = local_repo(&fixture, false);
    sync_config_repo(&work, &repo).await.unwrap();

    fixture.push_upstream("flake.lock", "{\"version\": 7}\n");

    let outcome = sync_config_repo(&work, &repo).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Pulled);
    assert_eq!(fs::read_to_string(work.join("flake.lock")).unwrap(), "{\"version\": 7}\n");
  }

  #[tokio::test]
  #[serial]
  async fn ahead_of_remote_needs_no_pull() {
    let fixture = OriginFixture::new();
    let work = fixture.work_dir();
    let repo = local_repo(&fixture, false);
    sync_config_repo(&work, &repo).await.unwrap();
    commit_local(&work, "host.nix", "{ }\n");

    let outcome = sync_config_repo(&work, &repo).await.unwrap();
    assert_eq!(outcome, SyncOutcome::UpToDate(RepoStatus::Ahead));
  }

  #[tokio::test]
  #[serial]
  async fn diverged_repo_is_an_error() {
    let fixture = OriginFixture::new();
    let work = fixture.work_dir();
    let repo = local_repo(&fixture, false);
    sync_config_repo(&work, &repo).await.unwrap();
    commit_local(&work, "host.nix", "{ }\n");
    fixture.push_upstream("flake.lock", "{}\n");

    let result = sync_config_repo(&work, &repo).await;
    assert!(matches!(result, Err(SyncError::Diverged(_))));
  }

  #[tokio::test]
  #[serial]
  async fn changed_lock_is_committed_and_pushed() {
    let fixture = OriginFixture::new();
    let work = fixture.work_dir();
    let repo = local_repo(&fixture, true);
    sync_config_repo(&work, &repo).await.unwrap();
    git(&work, &["config", "user.name", "Concierge Test"]);
    git(&work, &["config", "user.email", "test@example.com"]);
    git(&work, &["config", "commit.gpgsign", "false"]);
    fs::write(work.join("flake.lock"), "{}\n").unwrap();

    let committed = commit_lock_changes(&work, &repo, true, None, Some(&hash("b"))).await.unwrap();

    assert!(committed);
    assert_eq!(fixture.origin_head_subject(), "Update flake.lock");
  }
}
