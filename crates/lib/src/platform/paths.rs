use std::path::{Path, PathBuf};

use crate::consts::APP_NAME;

use super::PlatformError;

/// Returns the user's home directory
pub fn home_dir() -> Result<PathBuf, PlatformError> {
  std::env::var_os("HOME")
    .filter(|home| !home.is_empty())
    .map(PathBuf::from)
    .ok_or(PlatformError::HomeNotSet)
}

/// Returns the directory for concierge's own settings
pub fn config_dir() -> Result<PathBuf, PlatformError> {
  let config_home = match std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
    Some(dir) => PathBuf::from(dir),
    None => home_dir()?.join(".config"),
  };
  Ok(config_home.join(APP_NAME))
}

/// Default location of the working flake configuration (`~/.config/nix`).
pub fn default_config_path() -> Result<PathBuf, PlatformError> {
  Ok(home_dir()?.join(".config").join("nix"))
}

/// Expand a leading `~` to the home directory. Other paths are returned as-is.
pub fn expand_tilde(path: &Path) -> Result<PathBuf, PlatformError> {
  if path == Path::new("~") {
    return home_dir();
  }
  match path.strip_prefix("~") {
    Ok(rest) => Ok(home_dir()?.join(rest)),
    Err(_) => Ok(path.to_path_buf()),
  }
}
