//! Default values and resolved accessors for configuration types.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::agents::SessionKind;
use crate::config::types::ArborConfig;

pub const DEFAULT_GIT_PROGRAM: &str = "git";
pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 8 * 1024 * 1024;
pub const DEFAULT_WORKTREES_DIR: &str = ".arbor/worktrees";
pub const DEFAULT_METADATA_FILE: &str = ".arbor/worktrees.json";
pub const DEFAULT_EXIT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_SETTLE_GRACE_MS: u64 = 500;
pub const DEFAULT_COLS: u16 = 120;
pub const DEFAULT_ROWS: u16 = 32;

/// Resolve the login shell: explicit override, then `$SHELL`, then `/bin/sh`.
pub fn resolve_shell(configured: Option<&PathBuf>) -> PathBuf {
    if let Some(shell) = configured {
        return shell.clone();
    }
    match std::env::var("SHELL") {
        Ok(shell) if !shell.trim().is_empty() => PathBuf::from(shell),
        _ => {
            warn!(
                event = "core.config.shell_env_missing",
                fallback = "/bin/sh",
                "$SHELL not set, falling back to /bin/sh"
            );
            PathBuf::from("/bin/sh")
        }
    }
}

impl ArborConfig {
    pub fn git_program(&self) -> &str {
        self.git.program.as_deref().unwrap_or(DEFAULT_GIT_PROGRAM)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git.timeout_secs.unwrap_or(DEFAULT_GIT_TIMEOUT_SECS))
    }

    pub fn git_max_output_bytes(&self) -> usize {
        self.git.max_output_bytes.unwrap_or(DEFAULT_MAX_OUTPUT_BYTES)
    }

    pub fn worktrees_dir(&self) -> &str {
        self.worktrees
            .directory
            .as_deref()
            .unwrap_or(DEFAULT_WORKTREES_DIR)
    }

    pub fn metadata_file(&self) -> &str {
        self.worktrees
            .metadata_file
            .as_deref()
            .unwrap_or(DEFAULT_METADATA_FILE)
    }

    pub fn shell(&self) -> PathBuf {
        resolve_shell(self.sessions.shell.as_ref())
    }

    pub fn exit_timeout(&self) -> Duration {
        Duration::from_secs(
            self.sessions
                .exit_timeout_secs
                .unwrap_or(DEFAULT_EXIT_TIMEOUT_SECS),
        )
    }

    pub fn settle_grace(&self) -> Duration {
        Duration::from_millis(
            self.sessions
                .settle_grace_ms
                .unwrap_or(DEFAULT_SETTLE_GRACE_MS),
        )
    }

    pub fn default_cols(&self) -> u16 {
        self.sessions.default_cols.unwrap_or(DEFAULT_COLS)
    }

    pub fn default_rows(&self) -> u16 {
        self.sessions.default_rows.unwrap_or(DEFAULT_ROWS)
    }

    /// The command line for a session kind, honoring `[tools.<kind>]`.
    ///
    /// `None` means "interactive login shell".
    pub fn launch_command(&self, kind: SessionKind) -> Option<String> {
        if kind.is_shell() {
            return None;
        }
        self.tools
            .get(kind.as_str())
            .and_then(|t| t.command.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .or_else(|| kind.default_command().map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ToolSettings;

    #[test]
    fn test_defaults_when_nothing_configured() {
        let config = ArborConfig::default();
        assert_eq!(config.git_program(), "git");
        assert_eq!(config.git_timeout(), Duration::from_secs(10));
        assert_eq!(config.worktrees_dir(), ".arbor/worktrees");
        assert_eq!(config.metadata_file(), ".arbor/worktrees.json");
        assert_eq!(config.exit_timeout(), Duration::from_secs(5));
        assert_eq!(config.settle_grace(), Duration::from_millis(500));
    }

    #[test]
    fn test_launch_command_uses_override() {
        let mut config = ArborConfig::default();
        config.tools.insert(
            "claude".to_string(),
            ToolSettings {
                command: Some("claude --model opus".to_string()),
            },
        );
        assert_eq!(
            config.launch_command(SessionKind::Claude).as_deref(),
            Some("claude --model opus")
        );
        assert_eq!(
            config.launch_command(SessionKind::Gemini).as_deref(),
            Some("gemini --yolo")
        );
    }

    #[test]
    fn test_blank_override_falls_back_to_builtin() {
        let mut config = ArborConfig::default();
        config.tools.insert(
            "codex".to_string(),
            ToolSettings {
                command: Some("   ".to_string()),
            },
        );
        assert_eq!(
            config.launch_command(SessionKind::Codex),
            SessionKind::Codex.default_command().map(str::to_string)
        );
    }

    #[test]
    fn test_shell_kind_never_has_command() {
        let mut config = ArborConfig::default();
        config.tools.insert(
            "shell".to_string(),
            ToolSettings {
                command: Some("fish".to_string()),
            },
        );
        assert_eq!(config.launch_command(SessionKind::Shell), None);
    }

    #[test]
    fn test_resolve_shell_prefers_explicit_value() {
        let explicit = PathBuf::from("/usr/bin/fish");
        assert_eq!(resolve_shell(Some(&explicit)), explicit);
    }
}
