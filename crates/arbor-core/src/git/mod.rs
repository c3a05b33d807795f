//! Git integration.
//!
//! Everything here shells out to an external `git` binary through
//! [`GitRunner`], which never builds a shell string. Branch names are
//! validated by [`validate_branch_name`] before they reach an argument
//! vector or a filesystem path.

pub mod errors;
pub mod handler;
pub mod operations;
pub mod runner;
pub mod types;
pub mod validation;

pub use errors::GitError;
pub use handler::Git;
pub use operations::{find_containing_worktree, is_primary_branch, sanitize_for_path};
pub use runner::GitRunner;
pub use types::{ManagedLayout, WorktreeEntry};
pub use validation::validate_branch_name;
