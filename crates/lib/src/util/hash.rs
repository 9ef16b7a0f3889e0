//! Content hashing.
//!
//! Hashes are compared before and after a deployment to tell whether
//! `nix flake update` actually changed a lock file.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A full 64-character lowercase hex SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to read file {path}: {source}")]
pub struct HashError {
  pub path: String,
  #[source]
  pub source: std::io::Error,
}

/// Hash a file's contents, streaming it in fixed-size chunks.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
  let read_err = |source| HashError {
    path: path.display().to_string(),
    source,
  };

  let mut file = fs::File::open(path).map_err(read_err)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

/// Hash a file if it exists. A missing file hashes to `None`.
pub fn hash_file_if_exists(path: &Path) -> Result<Option<ContentHash>, HashError> {
  if !path.is_file() {
    return Ok(None);
  }
  hash_file(path).map(Some)
}

pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn hash_file_matches_known_digest() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("test_file.txt");
    fs::write(&path, b"Hello, Rust!").unwrap();

    let hash = hash_file(&path).unwrap();
    assert_eq!(
      hash.0,
      "12a967da1e8654e129d41e3c016f14e81e751e073feb383125bf82080256ca19"
    );
  }

  #[test]
  fn hash_file_equals_hash_bytes() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("flake.lock");
    fs::write(&path, "{\"nodes\":{}}").unwrap();

    assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"{\"nodes\":{}}"));
  }

  #[test]
  fn missing_file_is_an_error() {
    let temp = tempdir().unwrap();
    let result = hash_file(&temp.path().join("nope"));
    assert!(result.is_err());
  }

  #[test]
  fn missing_file_hashes_to_none_when_optional() {
    let temp = tempdir().unwrap();
    assert_eq!(hash_file_if_exists(&temp.path().join("nope")).unwrap(), None);
  }

  #[test]
  fn larger_than_buffer_files_hash_consistently() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("big");
    let data = vec![7u8; 20_000];
    fs::write(&path, &data).unwrap();

    assert_eq!(hash_file(&path).unwrap(), hash_bytes(&data));
  }
}
