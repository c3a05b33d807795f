use crate::errors::ArborError;
use crate::git::GitError;

#[derive(Debug, thiserror::Error)]
pub enum WorktreeError {
    #[error("Failed to create worktree for branch '{branch}': {message}")]
    WorktreeCreationFailed { branch: String, message: String },

    #[error(
        "Branch '{branch}' maps to '{path}', which is already used by branch '{existing_branch}'"
    )]
    WorktreePathCollision {
        branch: String,
        existing_branch: String,
        path: String,
    },

    #[error("Worktree '{path}' is still used by {sessions} session(s); pass force to remove it")]
    WorktreeInUse { path: String, sessions: usize },

    #[error("Metadata error at '{path}': {message}")]
    MetadataWriteFailed { path: String, message: String },

    #[error(transparent)]
    Git(#[from] GitError),
}

impl ArborError for WorktreeError {
    fn error_code(&self) -> &'static str {
        match self {
            WorktreeError::WorktreeCreationFailed { .. } => "WORKTREE_CREATION_FAILED",
            WorktreeError::WorktreePathCollision { .. } => "WORKTREE_PATH_COLLISION",
            WorktreeError::WorktreeInUse { .. } => "WORKTREE_IN_USE",
            WorktreeError::MetadataWriteFailed { .. } => "METADATA_WRITE_FAILED",
            WorktreeError::Git(e) => e.error_code(),
        }
    }

    fn is_user_error(&self) -> bool {
        match self {
            WorktreeError::WorktreePathCollision { .. } | WorktreeError::WorktreeInUse { .. } => {
                true
            }
            WorktreeError::Git(e) => e.is_user_error(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_errors_keep_their_code() {
        let error: WorktreeError = GitError::invalid_branch("-x", "must not start with '-'").into();
        assert_eq!(error.error_code(), "INVALID_BRANCH_NAME");
        assert!(error.is_user_error());
    }

    #[test]
    fn test_collision_display() {
        let error = WorktreeError::WorktreePathCollision {
            branch: "Feature/X".to_string(),
            existing_branch: "feature/x".to_string(),
            path: "/repo/.arbor/worktrees/feature-x".to_string(),
        };
        assert!(error.to_string().contains("already used by branch 'feature/x'"));
        assert_eq!(error.error_code(), "WORKTREE_PATH_COLLISION");
    }

    #[test]
    fn test_in_use_is_user_error() {
        let error = WorktreeError::WorktreeInUse {
            path: "/repo/.arbor/worktrees/x".to_string(),
            sessions: 2,
        };
        assert_eq!(error.error_code(), "WORKTREE_IN_USE");
        assert!(error.is_user_error());
        assert!(error.to_string().contains("2 session(s)"));
    }

    #[test]
    fn test_creation_failure_is_not_user_error() {
        let error = WorktreeError::WorktreeCreationFailed {
            branch: "x".to_string(),
            message: "fatal: boom".to_string(),
        };
        assert_eq!(error.error_code(), "WORKTREE_CREATION_FAILED");
        assert!(!error.is_user_error());
    }
}
