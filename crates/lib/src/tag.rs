//! Forcing Nix to re-evaluate a file.
//!
//! Nix skips evaluation when a flake's inputs are byte-identical to a previous
//! run. Appending a timestamped comment changes the file without changing its
//! meaning. Only one tag line is ever kept; older ones are dropped.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use thiserror::Error;
use tracing::debug;

use crate::consts::{BACKUP_DIR, TAG_PREFIX};
use crate::util::fs::{FsError, path_is_file};

#[derive(Debug, Error)]
pub enum TagError {
  #[error("cannot tag {0}: not a regular file")]
  NotAFile(PathBuf),

  #[error(transparent)]
  Fs(#[from] FsError),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{0} has no parent directory or file name")]
  InvalidPath(PathBuf),

  #[error("failed to create backup dir {path}: {source}")]
  CreateBackupDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to copy {from} to {to}: {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// The comment line written for a given timestamp.
pub fn tag_line<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> String
where
  Tz::Offset: std::fmt::Display,
{
  format!("{} {}", TAG_PREFIX, timestamp.to_rfc3339())
}

/// Replace any existing tag line in `path` with one for `timestamp`.
///
/// Lines are re-joined with `\n` and the file ends on the tag line, without a
/// trailing newline.
pub fn tag_file_content<Tz: TimeZone>(path: &Path, timestamp: &DateTime<Tz>) -> Result<(), TagError>
where
  Tz::Offset: std::fmt::Display,
{
  if !path_is_file(path)? {
    return Err(TagError::NotAFile(path.to_path_buf()));
  }

  let content = fs::read_to_string(path).map_err(|source| TagError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  let mut lines: Vec<&str> = content.lines().filter(|line| !line.starts_with(TAG_PREFIX)).collect();
  let tag = tag_line(timestamp);
  lines.push(&tag);
  let output = lines.join("\n");

  let write_err = |source| TagError::Write {
    path: path.to_path_buf(),
    source,
  };
  let mut file = fs::File::create(path).map_err(write_err)?;
  file.write_all(output.as_bytes()).map_err(write_err)?;
  file.flush().map_err(write_err)?;

  debug!(path = %path.display(), tag = %tag, "tagged file");
  Ok(())
}

/// Where [`backup_file`] puts the copy of `file` taken at `timestamp`.
pub fn backup_path<Tz: TimeZone>(file: &Path, timestamp: &DateTime<Tz>) -> Result<PathBuf, TagError>
where
  Tz::Offset: std::fmt::Display,
{
  let (Some(parent), Some(name)) = (file.parent(), file.file_name()) else {
    return Err(TagError::InvalidPath(file.to_path_buf()));
  };
  let backup_name = format!("{}-{}", name.to_string_lossy(), timestamp.to_rfc3339());
  Ok(parent.join(BACKUP_DIR).join(backup_name))
}

/// Copy `file` into the sibling `.concierge-backup` directory.
pub fn backup_file<Tz: TimeZone>(file: &Path, timestamp: &DateTime<Tz>) -> Result<PathBuf, TagError>
where
  Tz::Offset: std::fmt::Display,
{
  let destination = backup_path(file, timestamp)?;
  if let Some(dir) = destination.parent() {
    fs::create_dir_all(dir).map_err(|source| TagError::CreateBackupDir {
      path: dir.to_path_buf(),
      source,
    })?;
  }

  fs::copy(file, &destination).map_err(|source| TagError::Copy {
    from: file.to_path_buf(),
    to: destination.clone(),
    source,
  })?;

  debug!(from = %file.display(), to = %destination.display(), "backed up file");
  Ok(destination)
}
