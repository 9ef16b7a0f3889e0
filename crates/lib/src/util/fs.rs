//! Filesystem helpers shared by the compose, tag and sync steps.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum FsError {
  #[error("failed to read directory {path}: {source}")]
  ReadDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to walk directory {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to get metadata of {path}: {source}")]
  Metadata {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

pub fn is_directory_empty(path: &Path) -> Result<bool, FsError> {
  let mut entries = fs::read_dir(path).map_err(|source| FsError::ReadDir {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(entries.next().is_none())
}

/// Recursively find every regular file under `root` named exactly `name`.
///
/// Results are sorted by path. A missing root yields no results.
pub fn search_files_with_name(root: &Path, name: &str) -> Result<Vec<PathBuf>, FsError> {
  if !root.exists() {
    return Ok(Vec::new());
  }

  let mut files = Vec::new();
  for entry in WalkDir::new(root).sort_by_file_name() {
    let entry = entry.map_err(|source| FsError::Walk {
      path: root.to_path_buf(),
      source,
    })?;
    if entry.file_type().is_file() && entry.file_name() == name {
      files.push(entry.into_path());
    }
  }

  files.sort();
  Ok(files)
}

pub fn path_is_file(path: &Path) -> Result<bool, FsError> {
  let metadata = fs::metadata(path).map_err(|source| FsError::Metadata {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(metadata.is_file())
}
