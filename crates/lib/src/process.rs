//! Running external programs.
//!
//! Deployment is mostly orchestration of other tools (`nix`, `rsync`,
//! `compose2nix`, `git`). Their output is streamed straight to the user's
//! terminal so long builds show progress as they happen.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("failed to spawn `{command}`: {source}")]
  Spawn {
    command: String,
    #[source]
    source: std::io::Error,
  },

  #[error("`{command}` failed with exit code {code}")]
  Failed { command: String, code: i32 },

  #[error("`{command}` was terminated by a signal")]
  Signalled { command: String },
}

/// A program invocation: what to run, with which arguments, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
  pub program: String,
  pub args: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cwd: Option<PathBuf>,
}

impl CommandSpec {
  pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      program: program.into(),
      args: args.into_iter().map(Into::into).collect(),
      cwd: None,
    }
  }

  /// Build a spec from a full argv, e.g. `["sudo", "nixos-rebuild", "switch"]`.
  ///
  /// Returns `None` for an empty argv.
  pub fn from_argv<I, S>(argv: I) -> Option<Self>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut argv = argv.into_iter().map(Into::into);
    let program = argv.next()?;
    Some(Self {
      program,
      args: argv.collect(),
      cwd: None,
    })
  }

  pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  fn command(&self) -> Command {
    let mut command = Command::new(&self.program);
    command.args(&self.args);
    if let Some(dir) = &self.cwd {
      command.current_dir(dir);
    }
    command
  }

  fn check_status(&self, status: std::process::ExitStatus) -> Result<(), ProcessError> {
    match status.code() {
      Some(0) => Ok(()),
      Some(code) => Err(ProcessError::Failed {
        command: self.to_string(),
        code,
      }),
      None => Err(ProcessError::Signalled {
        command: self.to_string(),
      }),
    }
  }
}

impl fmt::Display for CommandSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      if arg.is_empty() || arg.contains(char::is_whitespace) {
        write!(f, " {:?}", arg)?;
      } else {
        write!(f, " {}", arg)?;
      }
    }
    Ok(())
  }
}

/// Run a command with stdout/stderr attached to ours.
pub async fn run_streaming(spec: &CommandSpec) -> Result<(), ProcessError> {
  debug!(command = %spec, cwd = ?spec.cwd, "running command");

  let status = spec
    .command()
    .stdin(Stdio::inherit())
    .stdout(Stdio::inherit())
    .stderr(Stdio::inherit())
    .status()
    .await
    .map_err(|source| ProcessError::Spawn {
      command: spec.to_string(),
      source,
    })?;

  spec.check_status(status)
}

/// Run a command and return its trimmed stdout.
pub async fn run_captured(spec: &CommandSpec) -> Result<String, ProcessError> {
  debug!(command = %spec, cwd = ?spec.cwd, "running command (captured)");

  let output = spec
    .command()
    .stdin(Stdio::null())
    .output()
    .await
    .map_err(|source| ProcessError::Spawn {
      command: spec.to_string(),
      source,
    })?;

  if !output.stderr.is_empty() {
    debug!(stderr = %String::from_utf8_lossy(&output.stderr), "command stderr");
  }
  spec.check_status(output.status)?;

  Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Whether `program` can be found and run at all.
pub async fn is_available(program: &str, version_flag: &str) -> bool {
  let spec = CommandSpec::new(program, [version_flag]);
  run_captured(&spec).await.is_ok()
}
