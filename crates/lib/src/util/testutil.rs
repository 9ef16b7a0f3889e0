//! Test utilities for concierge-lib.
//!
//! Git fixtures are built with the `git` binary, which is also what `sync`
//! shells out to for pull, commit and push.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Run `git` in `dir` with a throwaway identity, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
  let output = Command::new("git")
    .args([
      "-c",
      "user.name=Concierge Test",
      "-c",
      "user.email=test@example.com",
      "-c",
      "init.defaultBranch=main",
      "-c",
      "commit.gpgsign=false",
    ])
    .args(args)
    .current_dir(dir)
    .output()
    .expect("failed to run git");
  assert!(
    output.status.success(),
    "git {:?} failed: {}",
    args,
    String::from_utf8_lossy(&output.stderr)
  );
  String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare `origin` plus an `upstream` clone used to push new commits to it.
///
/// `origin` starts out with one commit on `main` containing `flake.nix`.
pub struct OriginFixture {
  pub temp: TempDir,
  pub origin: PathBuf,
  pub upstream: PathBuf,
}

impl OriginFixture {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let origin = temp.path().join("origin.git");
    let upstream = temp.path().join("upstream");

    git(temp.path(), &["init", "--bare", "origin.git"]);
    git(temp.path(), &["clone", "origin.git", "upstream"]);
    git(&upstream, &["checkout", "-B", "main"]);
    fs::write(upstream.join("flake.nix"), "{ outputs = _: { }; }\n").unwrap();
    git(&upstream, &["add", "flake.nix"]);
    git(&upstream, &["commit", "-m", "Initial config"]);
    git(&upstream, &["push", "origin", "main"]);

    Self { temp, origin, upstream }
  }

  pub fn url(&self) -> String {
    self.origin.display().to_string()
  }

  /// Where a working copy under test should live.
  pub fn work_dir(&self) -> PathBuf {
    self.temp.path().join("work")
  }

  /// Commit `file` with `contents` upstream and push it to origin.
  pub fn push_upstream(&self, file: &str, contents: &str) {
    fs::write(self.upstream.join(file), contents).unwrap();
    git(&self.upstream, &["add", file]);
    git(&self.upstream, &["commit", "-m", &format!("Update {file}")]);
    git(&self.upstream, &["push", "origin", "main"]);
  }

  /// Subject of the newest commit on origin's `main`.
  pub fn origin_head_subject(&self) -> String {
    git(&self.origin, &["log", "-1", "--format=%s", "main"])
  }
}

/// Commit `file` with `contents` directly in the repository at `repo`.
pub fn commit_local(repo: &Path, file: &str, contents: &str) {
  fs::write(repo.join(file), contents).unwrap();
  git(repo, &["add", file]);
  git(repo, &["commit", "-m", &format!("Local {file}")]);
}

/// Run `f` with no git identity available from the environment or the
/// user's global config.
pub fn without_git_identity<R>(home: &Path, f: impl FnOnce() -> R) -> R {
  let home = home.to_str().unwrap();
  temp_env::with_vars(
    [
      ("HOME", Some(home)),
      ("XDG_CONFIG_HOME", Some(home)),
      ("GIT_CONFIG_NOSYSTEM", Some("1")),
      ("GIT_CONFIG_GLOBAL", None),
      ("GIT_COMMITTER_NAME", None),
      ("GIT_COMMITTER_EMAIL", None),
      ("GIT_AUTHOR_NAME", None),
      ("GIT_AUTHOR_EMAIL", None),
      ("EMAIL", None),
    ],
    f,
  )
}
