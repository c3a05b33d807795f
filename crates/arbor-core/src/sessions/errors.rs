use crate::agents::SessionKind;
use crate::errors::ArborError;
use crate::pty::PtyError;
use crate::worktrees::WorktreeError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("'{kind}' is not installed or not on PATH")]
    ToolNotInstalled { kind: String },

    #[error("Unsupported session kind '{kind}'. Supported: {}", supported_kinds())]
    UnsupportedSessionKind { kind: String },

    #[error("Session '{id}' not found")]
    NotFound { id: String },

    #[error("Working directory does not exist: {path}")]
    InvalidWorkingDirectory { path: String },

    #[error("Invalid title: cannot be empty")]
    InvalidTitle,

    #[error(transparent)]
    Pty(#[from] PtyError),

    #[error(transparent)]
    Worktree(#[from] WorktreeError),
}

impl ArborError for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            SessionError::ToolNotInstalled { .. } => "TOOL_NOT_INSTALLED",
            SessionError::UnsupportedSessionKind { .. } => "UNSUPPORTED_SESSION_KIND",
            SessionError::NotFound { .. } => "SESSION_NOT_FOUND",
            SessionError::InvalidWorkingDirectory { .. } => "INVALID_WORKING_DIRECTORY",
            SessionError::InvalidTitle => "INVALID_TITLE",
            SessionError::Pty(e) => e.error_code(),
            SessionError::Worktree(e) => e.error_code(),
        }
    }

    fn is_user_error(&self) -> bool {
        match self {
            SessionError::Pty(e) => e.is_user_error(),
            SessionError::Worktree(e) => e.is_user_error(),
            _ => true,
        }
    }
}

fn supported_kinds() -> String {
    SessionKind::all()
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::GitError;

    #[test]
    fn test_codes() {
        let error = SessionError::ToolNotInstalled {
            kind: "claude".to_string(),
        };
        assert_eq!(error.error_code(), "TOOL_NOT_INSTALLED");
        assert_eq!(error.to_string(), "'claude' is not installed or not on PATH");

        let error = SessionError::NotFound {
            id: "session-1".to_string(),
        };
        assert_eq!(error.error_code(), "SESSION_NOT_FOUND");
    }

    #[test]
    fn test_unsupported_kind_lists_supported_kinds() {
        let error = SessionError::UnsupportedSessionKind {
            kind: "vim".to_string(),
        };
        let message = error.to_string();
        assert!(message.starts_with("Unsupported session kind 'vim'"));
        assert!(message.contains("claude, codex, gemini, opencode, shell"));
    }

    #[test]
    fn test_nested_errors_surface_inner_code() {
        let error: SessionError = WorktreeError::from(GitError::NotManagedByUs {
            path: "/x".to_string(),
        })
        .into();
        assert_eq!(error.error_code(), "NOT_MANAGED_BY_US");
        assert_eq!(
            error.to_string(),
            "Refusing to touch '/x': not inside the managed worktrees directory"
        );
    }
}
