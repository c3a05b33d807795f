//! Configuration loading and merging logic.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in the following order (later sources override earlier ones):
//! 1. **Hardcoded defaults** - Built-in fallback values
//! 2. **User config** - `~/.arbor/config.toml` (global user preferences)
//! 3. **Project config** - `./.arbor/config.toml` (project-specific overrides)

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::types::{ArborConfig, GitConfig, SessionConfig, WorktreeConfig};
use crate::config::validation::validate_config;
use crate::errors::ConfigError;

/// Load configuration from the hierarchy of config files.
///
/// # Errors
///
/// Returns an error if a present file fails to parse or the merged
/// configuration is invalid. Missing config files are not errors.
pub fn load_hierarchy() -> Result<ArborConfig, ConfigError> {
    let user = user_config_path();
    let project = std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".arbor").join("config.toml"));
    load_from_paths(user.as_deref(), project.as_deref())
}

/// Load and merge the given user and project config files.
pub fn load_from_paths(
    user: Option<&Path>,
    project: Option<&Path>,
) -> Result<ArborConfig, ConfigError> {
    let mut config = ArborConfig::default();

    for path in [user, project].into_iter().flatten() {
        if let Some(loaded) = load_config_file(path)? {
            config = merge_configs(config, loaded);
        }
    }

    validate_config(&config)?;
    Ok(config)
}

/// Load a configuration file. `Ok(None)` when the file does not exist.
fn load_config_file(path: &Path) -> Result<Option<ArborConfig>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(event = "core.config.file_not_found", path = %path.display());
            return Ok(None);
        }
        Err(e) => return Err(ConfigError::IoError { source: e }),
    };

    let config = toml::from_str(&content).map_err(|e| ConfigError::ConfigParseError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    debug!(event = "core.config.file_loaded", path = %path.display());
    Ok(Some(config))
}

/// Merge two configurations, with override_config taking precedence.
///
/// Optional fields are replaced only when the override sets them; the
/// tools map is merged entry by entry.
pub fn merge_configs(base: ArborConfig, override_config: ArborConfig) -> ArborConfig {
    ArborConfig {
        git: GitConfig {
            program: override_config.git.program.or(base.git.program),
            timeout_secs: override_config.git.timeout_secs.or(base.git.timeout_secs),
            max_output_bytes: override_config
                .git
                .max_output_bytes
                .or(base.git.max_output_bytes),
        },
        worktrees: WorktreeConfig {
            directory: override_config
                .worktrees
                .directory
                .or(base.worktrees.directory),
            metadata_file: override_config
                .worktrees
                .metadata_file
                .or(base.worktrees.metadata_file),
        },
        sessions: SessionConfig {
            shell: override_config.sessions.shell.or(base.sessions.shell),
            exit_timeout_secs: override_config
                .sessions
                .exit_timeout_secs
                .or(base.sessions.exit_timeout_secs),
            settle_grace_ms: override_config
                .sessions
                .settle_grace_ms
                .or(base.sessions.settle_grace_ms),
            default_cols: override_config
                .sessions
                .default_cols
                .or(base.sessions.default_cols),
            default_rows: override_config
                .sessions
                .default_rows
                .or(base.sessions.default_rows),
        },
        tools: {
            let mut merged = base.tools;
            for (key, value) in override_config.tools {
                merged.insert(key, value);
            }
            merged
        },
    }
}

/// Path of the user config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".arbor").join("config.toml"))
}
