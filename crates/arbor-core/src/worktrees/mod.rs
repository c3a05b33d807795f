//! Worktree coordination: metadata, allocation and reclamation.

pub mod allocator;
pub mod errors;
pub mod metadata;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use allocator::{Allocation, AllocationRequest, ReleaseOutcome, WorktreeAllocator};
pub use errors::WorktreeError;
pub use metadata::{WorktreeMetadata, WorktreeMetadataStore, WorktreeRecord};

/// How a session's directory relates to git worktrees.
///
/// Attached to a session at creation time and never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeDescriptor {
    pub enabled: bool,
    pub path: PathBuf,
    /// The main checkout. Never removed.
    pub is_main: bool,
    pub repo_root: PathBuf,
}

impl WorktreeDescriptor {
    /// A linked worktree that releasing a session may delete.
    pub fn is_reclaimable(&self) -> bool {
        self.enabled && !self.is_main
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(enabled: bool, is_main: bool) -> WorktreeDescriptor {
        WorktreeDescriptor {
            enabled,
            path: PathBuf::from("/repo/.arbor/worktrees/x"),
            is_main,
            repo_root: PathBuf::from("/repo"),
        }
    }

    #[test]
    fn test_only_linked_worktrees_are_reclaimable() {
        assert!(descriptor(true, false).is_reclaimable());
        assert!(!descriptor(true, true).is_reclaimable());
        assert!(!descriptor(false, false).is_reclaimable());
    }
}
