//! Docker compose projects converted to Nix with `compose2nix`.
//!
//! Each directory under `systems/<hostname>/` holding a `docker-compose.yml`
//! is a project named after its directory. A `.compose2nix` file in the
//! project directory replaces the default invocation with its own command.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::{COMPOSE_FILENAME, COMPOSE2NIX_OVERRIDE, SYSTEMS_DIR};
use crate::process::CommandSpec;
use crate::util::fs::{FsError, search_files_with_name};

#[derive(Debug, Error)]
pub enum ComposeError {
  #[error(transparent)]
  Fs(#[from] FsError),

  #[error("cannot determine project name for {0}")]
  ProjectName(PathBuf),

  #[error("failed to read {path}: {source}")]
  ReadOverride {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// A compose project and the command that converts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeProject {
  pub name: String,
  pub dir: PathBuf,
  pub command: CommandSpec,
  /// Whether `command` came from a `.compose2nix` file.
  pub overridden: bool,
}

/// Directory holding configuration specific to `hostname`.
pub fn host_dir(config_path: &Path, hostname: &str) -> PathBuf {
  config_path.join(SYSTEMS_DIR).join(hostname)
}

/// Find every compose project for `hostname` and work out how to convert it.
pub fn discover_projects(config_path: &Path, hostname: &str) -> Result<Vec<ComposeProject>, ComposeError> {
  let root = host_dir(config_path, hostname);
  let files = search_files_with_name(&root, COMPOSE_FILENAME)?;
  debug!(root = %root.display(), count = files.len(), "found compose files");

  let mut projects = Vec::with_capacity(files.len());
  for file in files {
    let Some(dir) = file.parent() else {
      return Err(ComposeError::ProjectName(file.clone()));
    };
    let name = dir
      .file_name()
      .ok_or_else(|| ComposeError::ProjectName(file.clone()))?
      .to_string_lossy()
      .into_owned();

    let (command, overridden) = match read_override(dir)? {
      Some(command) => (command, true),
      None => (CommandSpec::new("compose2nix", ["-project", name.as_str()]), false),
    };

    projects.push(ComposeProject {
      name,
      dir: dir.to_path_buf(),
      command: command.in_dir(dir),
      overridden,
    });
  }

  Ok(projects)
}

/// Read a `.compose2nix` override. Missing or blank files mean no override.
fn read_override(dir: &Path) -> Result<Option<CommandSpec>, ComposeError> {
  let path = dir.join(COMPOSE2NIX_OVERRIDE);
  if !path.is_file() {
    return Ok(None);
  }

  let contents = fs::read_to_string(&path).map_err(|source| ComposeError::ReadOverride {
    path: path.clone(),
    source,
  })?;

  let command = CommandSpec::from_argv(contents.split_whitespace());
  if command.is_none() {
    warn!(path = %path.display(), "override file is empty, using default compose2nix invocation");
  }
  Ok(command)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  const COMPOSE: &str = "version: '3'\nservices:\n  app:\n    image: nginx\n";

  fn project(config: &Path, host: &str, name: &str) -> PathBuf {
    let dir = host_dir(config, host).join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(COMPOSE_FILENAME), COMPOSE).unwrap();
    dir
  }

  #[test]
  fn default_invocation_uses_project_name() {
    let temp = tempdir().unwrap();
    let app = project(temp.path(), "acomputer", "app");
    let db = project(temp.path(), "acomputer", "db");

    let projects = discover_projects(temp.path(), "acomputer").unwrap();

    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0].name, "app");
    assert_eq!(projects[0].command.to_string(), "compose2nix -project app");
    assert_eq!(projects[0].command.cwd, Some(app));
    assert_eq!(projects[1].name, "db");
    assert_eq!(projects[1].command.cwd, Some(db));
    assert!(!projects[0].overridden);
  }

  #[test]
  fn other_hosts_are_ignored() {
    let temp = tempdir().unwrap();
    project(temp.path(), "othermachine", "app");

    let projects = discover_projects(temp.path(), "acomputer").unwrap();
    assert!(projects.is_empty());
  }

  #[test]
  fn missing_systems_dir_means_no_projects() {
    let temp = tempdir().unwrap();
    assert!(discover_projects(temp.path(), "acomputer").unwrap().is_empty());
  }

  #[test]
  fn override_file_replaces_command() {
    let temp = tempdir().unwrap();
    let dir = project(temp.path(), "acomputer", "media");
    fs::write(
      dir.join(COMPOSE2NIX_OVERRIDE),
      "compose2nix -project media\n  -runtime docker\n",
    )
    .unwrap();

    let projects = discover_projects(temp.path(), "acomputer").unwrap();

    assert!(projects[0].overridden);
    assert_eq!(projects[0].command.program, "compose2nix");
    assert_eq!(projects[0].command.args, vec!["-project", "media", "-runtime", "docker"]);
    assert_eq!(projects[0].command.cwd, Some(dir));
  }

  #[test]
  fn override_does_not_hide_later_projects() {
    let temp = tempdir().unwrap();
    let first = project(temp.path(), "acomputer", "a-first");
    fs::write(first.join(COMPOSE2NIX_OVERRIDE), "echo custom").unwrap();
    project(temp.path(), "acomputer", "b-second");

    let projects = discover_projects(temp.path(), "acomputer").unwrap();

    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0].command.to_string(), "echo custom");
    assert_eq!(projects[1].command.to_string(), "compose2nix -project b-second");
  }

  #[test]
  fn blank_override_falls_back_to_default() {
    let temp = tempdir().unwrap();
    let dir = project(temp.path(), "acomputer", "app");
    fs::write(dir.join(COMPOSE2NIX_OVERRIDE), "   \n").unwrap();

    let projects = discover_projects(temp.path(), "acomputer").unwrap();

    assert!(!projects[0].overridden);
    assert_eq!(projects[0].command.to_string(), "compose2nix -project app");
  }
}
