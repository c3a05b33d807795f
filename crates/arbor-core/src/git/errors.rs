use crate::errors::ArborError;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("Invalid branch name '{name}': {reason}")]
    InvalidBranchName { name: String, reason: String },

    #[error("Git command failed: {message}")]
    CommandFailed { message: String },

    #[error("Not a git repository: {path}")]
    NotAGitRepo { path: String },

    #[error("Refusing to touch '{path}': not inside the managed worktrees directory")]
    NotManagedByUs { path: String },

    #[error("Worktree already exists at path: {path}")]
    WorktreeAlreadyExists { path: String },

    #[error("IO error during git operation: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl GitError {
    pub(crate) fn invalid_branch(name: &str, reason: impl Into<String>) -> Self {
        GitError::InvalidBranchName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether a failed command reported that its directory is not in a repository.
    pub fn is_not_a_repo(&self) -> bool {
        match self {
            GitError::NotAGitRepo { .. } => true,
            GitError::CommandFailed { message } => {
                message.to_lowercase().contains("not a git repository")
            }
            _ => false,
        }
    }
}

impl ArborError for GitError {
    fn error_code(&self) -> &'static str {
        match self {
            GitError::InvalidBranchName { .. } => "INVALID_BRANCH_NAME",
            GitError::CommandFailed { .. } => "COMMAND_FAILED",
            GitError::NotAGitRepo { .. } => "NOT_A_GIT_REPO",
            GitError::NotManagedByUs { .. } => "NOT_MANAGED_BY_US",
            GitError::WorktreeAlreadyExists { .. } => "WORKTREE_ALREADY_EXISTS",
            GitError::IoError { .. } => "GIT_IO_ERROR",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self,
            GitError::InvalidBranchName { .. }
                | GitError::NotAGitRepo { .. }
                | GitError::NotManagedByUs { .. }
                | GitError::WorktreeAlreadyExists { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_error_display() {
        let error = GitError::NotAGitRepo {
            path: "/tmp/plain".to_string(),
        };
        assert_eq!(error.to_string(), "Not a git repository: /tmp/plain");
        assert_eq!(error.error_code(), "NOT_A_GIT_REPO");
        assert!(error.is_user_error());
    }

    #[test]
    fn test_invalid_branch_error() {
        let error = GitError::invalid_branch("-x", "must not start with '-'");
        assert_eq!(
            error.to_string(),
            "Invalid branch name '-x': must not start with '-'"
        );
        assert_eq!(error.error_code(), "INVALID_BRANCH_NAME");
    }

    #[test]
    fn test_command_failed_detects_not_a_repo() {
        let error = GitError::CommandFailed {
            message: "fatal: not a git repository (or any of the parent directories): .git"
                .to_string(),
        };
        assert!(error.is_not_a_repo());
        assert!(!error.is_user_error());

        let other = GitError::CommandFailed {
            message: "fatal: bad revision".to_string(),
        };
        assert!(!other.is_not_a_repo());
    }
}
