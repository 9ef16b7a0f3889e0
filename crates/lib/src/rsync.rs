//! Copying the configuration between the working dir and the install dir.
//!
//! rsync is not assumed to be installed on the host; it is pulled in for the
//! duration of the copy with `nix-shell -p rsync`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::process::CommandSpec;

/// One rsync invocation between two directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rsync {
  pub source: PathBuf,
  pub destination: PathBuf,
  pub params: Vec<String>,
  pub exclusions: Vec<String>,
  pub sudo: bool,
}

impl Rsync {
  /// Copy the working config into the install location.
  pub fn to_install(config: &Path, install: &Path, exclusions: &[String]) -> Self {
    Self {
      source: config.to_path_buf(),
      destination: install.to_path_buf(),
      params: vec!["-ahi".to_string()],
      exclusions: exclusions.to_vec(),
      sudo: true,
    }
  }

  /// Bring lock files written during the build back into the working config.
  /// Everything that is not a `*.lock` file (or a directory leading to one)
  /// is excluded.
  pub fn locks_back(install: &Path, config: &Path) -> Self {
    Self {
      source: install.to_path_buf(),
      destination: config.to_path_buf(),
      params: vec![
        "-aim".to_string(),
        "--include=*.lock".to_string(),
        "--include=*/".to_string(),
      ],
      exclusions: vec!["*".to_string()],
      sudo: true,
    }
  }

  /// The rsync command line, as run by the shell inside `nix-shell`.
  ///
  /// Both directories get a trailing `/` so their contents are synced rather
  /// than the directories themselves.
  pub fn shell_command(&self) -> String {
    let mut words: Vec<String> = Vec::new();
    if self.sudo {
      words.push("sudo".to_string());
    }
    words.push("rsync".to_string());
    words.extend(self.params.iter().map(|p| shell_quote(p)));
    words.extend(self.exclusions.iter().map(|e| shell_quote(&format!("--exclude={}", e))));
    words.push(shell_quote(&dir_arg(&self.source)));
    words.push(shell_quote(&dir_arg(&self.destination)));
    words.join(" ")
  }

  pub fn command(&self) -> CommandSpec {
    CommandSpec::new("nix-shell", ["-p".to_string(), "rsync".to_string(), "--run".to_string(), self.shell_command()])
  }
}

fn dir_arg(path: &Path) -> String {
  let path = path.to_string_lossy();
  let trimmed = path.trim_end_matches('/');
  format!("{}/", trimmed)
}

/// Quote a word for `sh` if it contains anything beyond a safe character set.
pub fn shell_quote(word: &str) -> String {
  let safe = !word.is_empty()
    && word
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '=' | ':' | ',' | '+' | '@' | '%'));
  if safe {
    return word.to_string();
  }
  format!("'{}'", word.replace('\'', r"'\''"))
}
