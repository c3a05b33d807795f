//! Typed git operations built on [`GitRunner`].
//!
//! Read-only queries degrade softly outside a repository (`false`, `None`,
//! empty lists). Mutating operations validate branch names before any
//! argument vector is built and only ever touch paths inside the managed
//! worktrees directory.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use super::errors::GitError;
use super::operations::{
    is_strict_descendant, parse_branch_list, parse_worktree_porcelain, resolve_path,
    sanitize_for_path,
};
use super::runner::GitRunner;
use super::types::{ManagedLayout, WorktreeEntry};
use super::validation::validate_branch_name;
use crate::config::ArborConfig;

/// Git facade: one runner plus the managed directory layout.
#[derive(Debug, Clone)]
pub struct Git {
    runner: GitRunner,
    layout: ManagedLayout,
}

impl Git {
    pub fn new(runner: GitRunner, layout: ManagedLayout) -> Self {
        Self { runner, layout }
    }

    pub fn from_config(config: &ArborConfig) -> Self {
        Self::new(
            GitRunner::from_config(config),
            ManagedLayout::from_config(config),
        )
    }

    pub fn layout(&self) -> &ManagedLayout {
        &self.layout
    }

    /// Whether `cwd` is inside a git working tree.
    pub async fn is_repo(&self, cwd: &Path) -> bool {
        matches!(
            self.runner
                .run(cwd, &["rev-parse", "--is-inside-work-tree"])
                .await
                .as_deref(),
            Ok("true")
        )
    }

    /// The checked-out branch, or `None` when detached or outside a repository.
    pub async fn current_branch(&self, cwd: &Path) -> Option<String> {
        match self
            .runner
            .run(cwd, &["symbolic-ref", "--quiet", "--short", "HEAD"])
            .await
        {
            Ok(branch) if !branch.is_empty() => Some(branch),
            Ok(_) => None,
            Err(e) => {
                debug!(
                    event = "core.git.current_branch_unavailable",
                    cwd = %cwd.display(),
                    error = %e
                );
                None
            }
        }
    }

    /// All local branch names. Empty outside a repository.
    pub async fn all_branches(&self, cwd: &Path) -> Result<Vec<String>, GitError> {
        match self
            .runner
            .run(
                cwd,
                &["for-each-ref", "--format=%(refname:short)", "refs/heads/"],
            )
            .await
        {
            Ok(output) => Ok(parse_branch_list(&output)),
            Err(e) if e.is_not_a_repo() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Top level of the working tree containing `cwd`.
    ///
    /// # Errors
    ///
    /// `GitError::NotAGitRepo` for any failure to resolve.
    pub async fn repo_root(&self, cwd: &Path) -> Result<PathBuf, GitError> {
        match self
            .runner
            .run(cwd, &["rev-parse", "--show-toplevel"])
            .await
        {
            Ok(root) if !root.is_empty() => Ok(PathBuf::from(root)),
            Ok(_) => Err(GitError::NotAGitRepo {
                path: cwd.display().to_string(),
            }),
            Err(e) => {
                debug!(
                    event = "core.git.repo_root_failed",
                    cwd = %cwd.display(),
                    error = %e
                );
                Err(GitError::NotAGitRepo {
                    path: cwd.display().to_string(),
                })
            }
        }
    }

    /// Root of the main checkout, even when `cwd` is inside a linked worktree.
    pub async fn main_checkout_root(&self, cwd: &Path) -> Result<PathBuf, GitError> {
        let entries = self.list_worktrees(cwd).await?;
        entries
            .into_iter()
            .find(|entry| !entry.is_bare)
            .map(|entry| entry.path)
            .ok_or_else(|| GitError::NotAGitRepo {
                path: cwd.display().to_string(),
            })
    }

    /// Create a branch at HEAD without checking it out.
    pub async fn create_branch(&self, cwd: &Path, name: &str) -> Result<(), GitError> {
        let branch = validate_branch_name(name)?;
        info!(event = "core.git.branch.create_started", branch = %branch, cwd = %cwd.display());
        self.runner.run(cwd, &["branch", &branch]).await?;
        info!(event = "core.git.branch.create_completed", branch = %branch);
        Ok(())
    }

    /// Switch the working tree at `cwd` to an existing branch.
    pub async fn checkout_branch(&self, cwd: &Path, name: &str) -> Result<(), GitError> {
        let branch = validate_branch_name(name)?;
        info!(event = "core.git.branch.checkout_started", branch = %branch, cwd = %cwd.display());
        self.runner.run(cwd, &["checkout", &branch, "--"]).await?;
        info!(event = "core.git.branch.checkout_completed", branch = %branch);
        Ok(())
    }

    /// Worktrees registered with the repository containing `cwd`.
    ///
    /// The main checkout is always first. Empty outside a repository.
    pub async fn list_worktrees(&self, cwd: &Path) -> Result<Vec<WorktreeEntry>, GitError> {
        match self
            .runner
            .run(cwd, &["worktree", "list", "--porcelain"])
            .await
        {
            Ok(output) => Ok(parse_worktree_porcelain(&output)),
            Err(e) if e.is_not_a_repo() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Directory a managed worktree for `branch` would live in.
    ///
    /// # Errors
    ///
    /// `GitError::InvalidBranchName` when the name fails validation or the
    /// derived path would not be strictly inside the worktrees directory.
    pub fn worktree_path_for(&self, repo_root: &Path, branch: &str) -> Result<PathBuf, GitError> {
        let branch = validate_branch_name(branch)?;
        let root = self.layout.worktrees_root(repo_root);
        let candidate = root.join(sanitize_for_path(&branch));

        if !is_strict_descendant(&root, &candidate) {
            error!(
                event = "core.git.worktree.path_escape_rejected",
                branch = %branch,
                candidate = %candidate.display()
            );
            return Err(GitError::invalid_branch(
                &branch,
                "resolves outside the managed worktrees directory",
            ));
        }
        Ok(candidate)
    }

    /// Whether `path` is strictly inside this repository's managed worktrees directory.
    pub fn is_managed_path(&self, repo_root: &Path, path: &Path) -> bool {
        is_strict_descendant(&self.layout.worktrees_root(repo_root), path)
    }

    /// Add a managed worktree for `branch`.
    ///
    /// With `new_branch` the branch is created at HEAD (`-b`); otherwise an
    /// existing branch is checked out into the new directory.
    ///
    /// # Errors
    ///
    /// Validation failures before any side effect, `WorktreeAlreadyExists`
    /// when the target directory is present, `CommandFailed` from git.
    pub async fn create_worktree(
        &self,
        repo_root: &Path,
        branch: &str,
        new_branch: bool,
    ) -> Result<PathBuf, GitError> {
        let branch = validate_branch_name(branch)?;
        let path = self.worktree_path_for(repo_root, &branch)?;

        info!(
            event = "core.git.worktree.create_started",
            branch = %branch,
            new_branch = new_branch,
            worktree_path = %path.display(),
            repo_root = %repo_root.display()
        );

        if path.exists() {
            error!(
                event = "core.git.worktree.create_failed",
                branch = %branch,
                worktree_path = %path.display(),
                error = "worktree already exists"
            );
            return Err(GitError::WorktreeAlreadyExists {
                path: path.display().to_string(),
            });
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.exclude_managed_paths(repo_root).await;

        let path_arg = path.to_string_lossy().to_string();
        let args: Vec<&str> = if new_branch {
            vec!["worktree", "add", "-b", &branch, &path_arg]
        } else {
            vec!["worktree", "add", &path_arg, &branch]
        };
        self.runner.run(repo_root, &args).await.inspect_err(|e| {
            error!(
                event = "core.git.worktree.create_failed",
                branch = %branch,
                worktree_path = %path.display(),
                error = %e
            );
        })?;

        info!(
            event = "core.git.worktree.create_completed",
            branch = %branch,
            worktree_path = %path.display()
        );
        Ok(path)
    }

    /// Remove a managed worktree directory.
    ///
    /// # Errors
    ///
    /// `GitError::NotManagedByUs` unless `path` is strictly inside the
    /// managed worktrees directory; `CommandFailed` from git (for example
    /// when the worktree is dirty and `force` is false).
    pub async fn remove_worktree(
        &self,
        repo_root: &Path,
        path: &Path,
        force: bool,
    ) -> Result<(), GitError> {
        if !self.is_managed_path(repo_root, path) {
            warn!(
                event = "core.git.worktree.remove_refused",
                worktree_path = %path.display(),
                repo_root = %repo_root.display()
            );
            return Err(GitError::NotManagedByUs {
                path: path.display().to_string(),
            });
        }

        info!(
            event = "core.git.worktree.remove_started",
            worktree_path = %path.display(),
            force = force
        );

        let path_arg = resolve_path(path).to_string_lossy().to_string();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_arg);
        self.runner.run(repo_root, &args).await?;

        info!(
            event = "core.git.worktree.remove_completed",
            worktree_path = %path.display()
        );
        Ok(())
    }

    /// Drop administrative entries for worktrees whose directories are gone.
    pub async fn prune_worktrees(&self, repo_root: &Path) -> Result<(), GitError> {
        self.runner.run(repo_root, &["worktree", "prune"]).await?;
        info!(event = "core.git.worktree.prune_completed", repo_root = %repo_root.display());
        Ok(())
    }

    /// Whether `git status --porcelain` reports anything in `path`.
    pub async fn has_uncommitted_changes(&self, path: &Path) -> Result<bool, GitError> {
        let status = self.runner.run(path, &["status", "--porcelain"]).await?;
        Ok(!status.is_empty())
    }

    /// Keep managed paths out of the main checkout's `git status` (best effort).
    async fn exclude_managed_paths(&self, repo_root: &Path) {
        let common_dir = match self
            .runner
            .run(repo_root, &["rev-parse", "--git-common-dir"])
            .await
        {
            Ok(dir) => repo_root.join(dir),
            Err(e) => {
                debug!(event = "core.git.exclude_skipped", error = %e);
                return;
            }
        };

        let exclude_file = common_dir.join("info").join("exclude");
        let existing = std::fs::read_to_string(&exclude_file).unwrap_or_default();
        let missing: Vec<String> = self
            .layout
            .exclude_patterns()
            .into_iter()
            .filter(|pattern| !existing.lines().any(|line| line.trim() == pattern))
            .collect();
        if missing.is_empty() {
            return;
        }

        let mut content = existing;
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        for pattern in &missing {
            content.push_str(pattern);
            content.push('\n');
        }

        let result = exclude_file
            .parent()
            .map(std::fs::create_dir_all)
            .transpose()
            .and_then(|_| std::fs::write(&exclude_file, content));
        match result {
            Ok(()) => debug!(
                event = "core.git.exclude_updated",
                file = %exclude_file.display(),
                patterns = ?missing
            ),
            Err(e) => warn!(
                event = "core.git.exclude_update_failed",
                file = %exclude_file.display(),
                error = %e
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::process::Command;

    /// Run git synchronously in tests, panicking on failure.
    pub fn git(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .expect("failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Initialise a repository on `main` with one commit.
    pub fn init_repo(dir: &Path) {
        git(dir, &["init", "-q", "-b", "main"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        git(dir, &["config", "user.name", "Test"]);
        git(dir, &["config", "commit.gpgsign", "false"]);
        std::fs::write(dir.join("README.md"), "hello\n").unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "-q", "-m", "initial"]);
    }
}
