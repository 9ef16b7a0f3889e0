//! Git queries on the working configuration repository.
//!
//! Everything here goes through `gix`; no `git` binary is needed except for
//! the write operations in `sync` (pull, commit, push).

use std::path::{Path, PathBuf};

use gix::bstr::{BStr, ByteSlice};
use gix::remote::Direction;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum GitError {
  #[error("failed to open repository at '{path}': {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: Box<gix::open::Error>,
  },

  #[error("failed to clone repository '{url}': {source}")]
  Clone {
    url: String,
    #[source]
    source: BoxError,
  },

  #[error("failed to checkout '{url}': {source}")]
  Checkout {
    url: String,
    #[source]
    source: BoxError,
  },

  #[error("failed to read remote '{name}' of '{path}': {source}")]
  Remote {
    path: PathBuf,
    name: String,
    #[source]
    source: BoxError,
  },

  #[error("repository at '{0}' has no remote 'origin'")]
  NoOrigin(PathBuf),

  #[error("failed to fetch '{path}': {source}")]
  Fetch {
    path: PathBuf,
    #[source]
    source: BoxError,
  },

  #[error("failed to get status of '{path}': {source}")]
  Status {
    path: PathBuf,
    #[source]
    source: BoxError,
  },

  #[error("revision '{rev}' not found: {source}")]
  RevisionNotFound {
    rev: String,
    #[source]
    source: BoxError,
  },

  #[error("failed to walk history: {0}")]
  Walk(#[source] BoxError),
}

/// How a local branch relates to its remote-tracking branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoStatus {
  Ahead,
  Behind,
  Same,
  /// Both sides have commits the other lacks.
  Complex,
}

impl RepoStatus {
  pub fn from_counts(ahead: usize, behind: usize) -> Self {
    match (ahead, behind) {
      (0, 0) => Self::Same,
      (_, 0) => Self::Ahead,
      (0, _) => Self::Behind,
      _ => Self::Complex,
    }
  }
}

/// Reduce a git URL to `host/path`, whatever its transport.
///
/// Both `git@github.com:username/repo.git` and
/// `https://github.com/username/repo` become `github.com/username/repo`.
/// Returns `None` for URLs without a host, such as local paths.
pub fn normalize_git_url(url: &str) -> Option<String> {
  let parsed = gix::url::parse(BStr::new(url.trim())).ok()?;
  let host = parsed.host()?.to_ascii_lowercase();
  let path = parsed.path.to_str_lossy();
  let path = path
    .trim_end_matches('/')
    .trim_end_matches(".git")
    .trim_start_matches('/');
  Some(format!("{host}/{path}"))
}

/// Local path or `file://` URL with the scheme, trailing `/` and `.git` removed.
fn local_repo_path(url: &str) -> &str {
  let url = url.trim();
  url
    .strip_prefix("file://")
    .unwrap_or(url)
    .trim_end_matches('/')
    .trim_end_matches(".git")
    .trim_end_matches('/')
}

pub fn is_same_repo(a: &str, b: &str) -> bool {
  match (normalize_git_url(a), normalize_git_url(b)) {
    (Some(a), Some(b)) => a == b,
    (None, None) => local_repo_path(a) == local_repo_path(b),
    _ => false,
  }
}

fn open(path: &Path) -> Result<gix::Repository, GitError> {
  gix::open(path).map_err(|e| GitError::Open {
    path: path.to_path_buf(),
    source: Box::new(e),
  })
}

/// Whether `path` itself is the root of a git repository.
pub fn is_git_repo(path: &Path) -> bool {
  gix::open(path).is_ok()
}

/// Fetch URLs of every configured remote.
pub fn repo_remote_urls(path: &Path) -> Result<Vec<String>, GitError> {
  let repo = open(path)?;
  let mut urls = Vec::new();

  for name in repo.remote_names() {
    let name: &BStr = name.as_ref();
    let remote = repo.find_remote(name).map_err(|e| GitError::Remote {
      path: path.to_path_buf(),
      name: name.to_string(),
      source: Box::new(e),
    })?;
    if let Some(url) = remote.url(Direction::Fetch) {
      urls.push(url.to_bstring().to_string());
    }
  }

  Ok(urls)
}

/// Whether any remote of the repo at `path` points at the same repository as
/// `remote_url`, regardless of transport.
pub fn repo_has_remote(path: &Path, remote_url: &str) -> Result<bool, GitError> {
  let urls = repo_remote_urls(path)?;
  debug!(path = %path.display(), ?urls, remote_url, "comparing remotes");
  Ok(urls.iter().any(|url| is_same_repo(url, remote_url)))
}

/// True when there is nothing to commit, untracked files included.
pub fn is_working_tree_clean(path: &Path) -> Result<bool, GitError> {
  let repo = open(path)?;
  let status_err = |e: BoxError| GitError::Status {
    path: path.to_path_buf(),
    source: e,
  };

  let mut changes = repo
    .status(gix::progress::Discard)
    .map_err(|e| status_err(Box::new(e)))?
    .untracked_files(gix::status::UntrackedFiles::Files)
    .into_iter(None::<gix::bstr::BString>)
    .map_err(|e| status_err(Box::new(e)))?;

  match changes.next() {
    None => Ok(true),
    Some(Ok(_)) => {
      debug!(path = %path.display(), "working tree has changes");
      Ok(false)
    }
    Some(Err(e)) => Err(status_err(Box::new(e))),
  }
}

/// Fetch `origin` and compare `branch` with `origin/<branch>`.
pub fn repo_status(path: &Path, branch: &str) -> Result<RepoStatus, GitError> {
  let mut repo = open(path)?;
  fetch_origin(&mut repo, path)?;

  let local = resolve(&repo, &format!("refs/heads/{branch}"))?;
  let remote = resolve(&repo, &format!("refs/remotes/origin/{branch}"))?;

  let ahead = count_exclusive(&repo, local, remote)?;
  let behind = count_exclusive(&repo, remote, local)?;
  debug!(branch, ahead, behind, "compared with origin");

  Ok(RepoStatus::from_counts(ahead, behind))
}

fn resolve(repo: &gix::Repository, rev: &str) -> Result<gix::ObjectId, GitError> {
  repo
    .rev_parse_single(rev)
    .map(|id| id.detach())
    .map_err(|e| GitError::RevisionNotFound {
      rev: rev.to_string(),
      source: Box::new(e),
    })
}

/// Number of commits reachable from `tip` but not from `hidden`.
fn count_exclusive(repo: &gix::Repository, tip: gix::ObjectId, hidden: gix::ObjectId) -> Result<usize, GitError> {
  let walk = repo
    .rev_walk([tip])
    .with_hidden([hidden])
    .all()
    .map_err(|e| GitError::Walk(Box::new(e)))?;

  let mut count = 0;
  for info in walk {
    info.map_err(|e| GitError::Walk(Box::new(e)))?;
    count += 1;
  }
  Ok(count)
}

fn fetch_origin(repo: &mut gix::Repository, path: &Path) -> Result<(), GitError> {
  let fetch_err = |e: BoxError| GitError::Fetch {
    path: path.to_path_buf(),
    source: e,
  };

  // Updating remote refs writes reflog entries, which need a committer even
  // on hosts with no user.name/user.email configured.
  repo
    .committer_or_set_generic_fallback()
    .map_err(|e| fetch_err(Box::new(e)))?;

  let remote = repo
    .find_remote("origin")
    .map_err(|_| GitError::NoOrigin(path.to_path_buf()))?;

  debug!(path = %path.display(), "fetching origin");
  remote
    .connect(Direction::Fetch)
    .map_err(|e| fetch_err(Box::new(e)))?
    .prepare_fetch(gix::progress::Discard, Default::default())
    .map_err(|e| fetch_err(Box::new(e)))?
    .receive(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| fetch_err(Box::new(e)))?;

  Ok(())
}

/// Clone `url` into `dest` and check out its default branch.
pub fn clone_repo(url: &str, dest: &Path) -> Result<(), GitError> {
  info!(url, path = %dest.display(), "cloning repository");

  let mut prepared = gix::prepare_clone(url, dest).map_err(|e| GitError::Clone {
    url: url.to_string(),
    source: Box::new(e),
  })?;

  let (mut checkout, _outcome) = prepared
    .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| GitError::Clone {
      url: url.to_string(),
      source: Box::new(e),
    })?;

  checkout
    .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| GitError::Checkout {
      url: url.to_string(),
      source: Box::new(e),
    })?;

  Ok(())
}
