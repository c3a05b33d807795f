use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ArborConfig;

/// One block of `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeEntry {
    pub path: PathBuf,
    /// Short branch name (`refs/heads/` stripped); `None` when detached or bare.
    pub branch: Option<String>,
    pub head: Option<String>,
    pub is_bare: bool,
    pub is_detached: bool,
    pub is_locked: bool,
    pub is_prunable: bool,
}

impl WorktreeEntry {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            branch: None,
            head: None,
            is_bare: false,
            is_detached: false,
            is_locked: false,
            is_prunable: false,
        }
    }
}

/// Where managed state lives, relative to a repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedLayout {
    worktrees_dir: PathBuf,
    metadata_file: PathBuf,
}

impl ManagedLayout {
    pub fn new(worktrees_dir: impl Into<PathBuf>, metadata_file: impl Into<PathBuf>) -> Self {
        Self {
            worktrees_dir: worktrees_dir.into(),
            metadata_file: metadata_file.into(),
        }
    }

    pub fn from_config(config: &ArborConfig) -> Self {
        Self::new(config.worktrees_dir(), config.metadata_file())
    }

    /// Directory holding one subdirectory per managed worktree.
    pub fn worktrees_root(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.worktrees_dir)
    }

    /// The metadata document for this repository.
    pub fn metadata_path(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.metadata_file)
    }

    /// Repository-relative patterns for `info/exclude`.
    pub fn exclude_patterns(&self) -> Vec<String> {
        [&self.worktrees_dir, &self.metadata_file]
            .iter()
            .map(|p| format!("/{}", p.to_string_lossy().trim_start_matches("./")))
            .collect()
    }
}

impl Default for ManagedLayout {
    fn default() -> Self {
        Self::from_config(&ArborConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths_are_under_repo_root() {
        let layout = ManagedLayout::default();
        let root = Path::new("/repo");
        assert_eq!(
            layout.worktrees_root(root),
            PathBuf::from("/repo/.arbor/worktrees")
        );
        assert_eq!(
            layout.metadata_path(root),
            PathBuf::from("/repo/.arbor/worktrees.json")
        );
    }

    #[test]
    fn test_exclude_patterns_are_anchored() {
        let layout = ManagedLayout::new("./wt", ".arbor/meta.json");
        assert_eq!(
            layout.exclude_patterns(),
            vec!["/wt".to_string(), "/.arbor/meta.json".to_string()]
        );
    }
}
