//! Configuration validation.

use std::path::{Component, Path};

use crate::agents::SessionKind;
use crate::config::types::ArborConfig;
use crate::errors::ConfigError;

/// Validate a merged configuration.
///
/// Managed paths must stay inside the repository, timeouts must be
/// positive and every `[tools.<name>]` key must name a session kind.
pub fn validate_config(config: &ArborConfig) -> Result<(), ConfigError> {
    validate_relative_path("worktrees.directory", config.worktrees_dir())?;
    validate_relative_path("worktrees.metadata_file", config.metadata_file())?;

    if config.git.timeout_secs == Some(0) {
        return Err(ConfigError::InvalidConfiguration {
            message: "git.timeout_secs must be greater than 0".to_string(),
        });
    }
    if config.git.max_output_bytes == Some(0) {
        return Err(ConfigError::InvalidConfiguration {
            message: "git.max_output_bytes must be greater than 0".to_string(),
        });
    }
    if config.sessions.exit_timeout_secs == Some(0) {
        return Err(ConfigError::InvalidConfiguration {
            message: "sessions.exit_timeout_secs must be greater than 0".to_string(),
        });
    }

    for tool in config.tools.keys() {
        match SessionKind::parse(tool) {
            Some(kind) if !kind.is_shell() => {}
            _ => {
                return Err(ConfigError::UnknownTool { tool: tool.clone() });
            }
        }
    }

    Ok(())
}

fn validate_relative_path(key: &str, value: &str) -> Result<(), ConfigError> {
    let path = Path::new(value);
    if value.trim().is_empty() || path.is_absolute() {
        return Err(ConfigError::InvalidConfiguration {
            message: format!("{key} must be a non-empty path relative to the repository root"),
        });
    }
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(ConfigError::InvalidConfiguration {
            message: format!("{key} must not contain '..' components: '{value}'"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ToolSettings;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ArborConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_absolute_worktree_dir() {
        let mut config = ArborConfig::default();
        config.worktrees.directory = Some("/tmp/worktrees".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_parent_components() {
        let mut config = ArborConfig::default();
        config.worktrees.metadata_file = Some(".arbor/../../meta.json".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = ArborConfig::default();
        config.git.timeout_secs = Some(0);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("git.timeout_secs"));
    }

    #[test]
    fn test_rejects_unknown_tool_section() {
        let mut config = ArborConfig::default();
        config.tools.insert("vim".to_string(), ToolSettings::default());
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTool { .. }));
    }
}
