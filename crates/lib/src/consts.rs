/// Application name, used for config directories and the settings file.
pub const APP_NAME: &str = "concierge";

/// Settings file name within the config directory.
pub const SETTINGS_FILENAME: &str = "concierge.toml";

/// Flake entry point expected at the root of the working configuration.
pub const FLAKE_FILENAME: &str = "flake.nix";

/// Lock file written by `nix flake update`.
pub const FLAKE_LOCK_FILENAME: &str = "flake.lock";

/// Directory (next to the tagged file) holding pre-tag backups.
pub const BACKUP_DIR: &str = ".concierge-backup";

/// Prefix of the comment line appended to force flake re-evaluation.
pub const TAG_PREFIX: &str = "# TAGGED:";

/// Compose project file picked up by `compose2nix`.
pub const COMPOSE_FILENAME: &str = "docker-compose.yml";

/// Optional per-project file overriding the `compose2nix` invocation.
pub const COMPOSE2NIX_OVERRIDE: &str = ".compose2nix";

/// Directory under the config root holding per-host configuration.
pub const SYSTEMS_DIR: &str = "systems";

/// Paths never copied from the working config to the install location.
pub const DEFAULT_SYNC_EXCLUSIONS: &[&str] = &[".gitignore", ".stfolder", ".git", BACKUP_DIR];
