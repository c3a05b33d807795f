//! Decides which directory a session runs in, and when a worktree may go.
//!
//! Allocation order for a request:
//!
//! 1. No branch chosen: detect the worktree containing `cwd` and adopt it
//!    when it lives in the managed directory. Failures mean "no worktree".
//! 2. Worktree mode with a branch: the current branch and `main`/`master`
//!    run in the main checkout; any other branch gets a managed worktree,
//!    reused when one already exists.
//! 3. A branch without worktree mode: check it out in place, logging (not
//!    failing) when the checkout does not work.
//!
//! Release untracks the session and removes the worktree only once no
//! session references it and `git status` reports a clean tree.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::WorktreeDescriptor;
use super::errors::WorktreeError;
use super::metadata::WorktreeMetadataStore;
use crate::git::operations::{find_containing_worktree, is_primary_branch, resolve_path};
use crate::git::{Git, GitError, WorktreeEntry, validate_branch_name};

/// What a session asked for.
#[derive(Debug, Clone, Default)]
pub struct AllocationRequest {
    pub cwd: PathBuf,
    pub worktree_mode: bool,
    pub branch_name: Option<String>,
    /// Force (`true`) or forbid (`false`) creating the branch. When unset the
    /// branch is created only if it does not exist yet.
    pub new_branch: Option<bool>,
}

/// Where a session ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub session_cwd: PathBuf,
    pub branch: Option<String>,
    pub worktree: Option<WorktreeDescriptor>,
}

impl Allocation {
    fn unmanaged(cwd: &Path, branch: Option<String>) -> Self {
        Self {
            session_cwd: cwd.to_path_buf(),
            branch,
            worktree: None,
        }
    }

    /// Whether releasing this allocation can ever delete a directory.
    pub fn holds_worktree(&self) -> bool {
        self.worktree
            .as_ref()
            .is_some_and(WorktreeDescriptor::is_reclaimable)
    }
}

/// Result of releasing a session's hold on a worktree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// No managed worktree was involved.
    NotManaged,
    StillInUse { remaining: usize },
    Removed { path: PathBuf },
    /// Left on disk on purpose, typically because of uncommitted changes.
    Retained { path: PathBuf, reason: String },
    Failed { path: PathBuf, message: String },
}

impl ReleaseOutcome {
    /// A user-facing warning for outcomes that leave something behind.
    pub fn warning(&self) -> Option<String> {
        match self {
            ReleaseOutcome::Retained { path, reason } => Some(format!(
                "Worktree at {} was kept: {}",
                path.display(),
                reason
            )),
            ReleaseOutcome::Failed { path, message } => Some(format!(
                "Failed to clean up worktree at {}: {}",
                path.display(),
                message
            )),
            _ => None,
        }
    }
}

/// Serializes all metadata read-modify-write cycles in this process.
#[derive(Debug)]
pub struct WorktreeAllocator {
    git: Git,
    lock: Mutex<()>,
}

impl WorktreeAllocator {
    pub fn new(git: Git) -> Self {
        Self {
            git,
            lock: Mutex::new(()),
        }
    }

    pub fn git(&self) -> &Git {
        &self.git
    }

    /// The metadata store for the repository whose main checkout is `repo_root`.
    pub fn metadata_store(&self, repo_root: &Path) -> WorktreeMetadataStore {
        WorktreeMetadataStore::new(self.git.layout().metadata_path(repo_root))
    }

    /// Resolve the working directory for `session_id`.
    ///
    /// # Errors
    ///
    /// `InvalidBranchName` before any side effect, `WorktreeCreationFailed`
    /// and `WorktreePathCollision` when a new worktree cannot be made.
    pub async fn allocate(
        &self,
        request: &AllocationRequest,
        session_id: &str,
    ) -> Result<Allocation, WorktreeError> {
        let branch = match request
            .branch_name
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
        {
            Some(name) => Some(validate_branch_name(name)?),
            None => None,
        };

        match branch {
            None => Ok(self.detect(&request.cwd, session_id).await),
            Some(branch) if request.worktree_mode => {
                self.allocate_worktree(&request.cwd, &branch, request.new_branch, session_id)
                    .await
            }
            Some(branch) => Ok(self.switch_in_place(&request.cwd, &branch).await),
        }
    }

    /// Adopt the managed worktree containing `cwd`, if any.
    async fn detect(&self, cwd: &Path, session_id: &str) -> Allocation {
        let entries = match self.git.list_worktrees(cwd).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(event = "core.worktree.detect_failed", cwd = %cwd.display(), error = %e);
                return Allocation::unmanaged(cwd, None);
            }
        };
        let Some(main_root) = entries.first().map(|e| e.path.clone()) else {
            return Allocation::unmanaged(cwd, None);
        };
        let Some(found) = find_containing_worktree(&entries, cwd) else {
            return Allocation::unmanaged(cwd, None);
        };
        let Some(branch) = found.branch.clone() else {
            return Allocation::unmanaged(cwd, None);
        };

        if !self.git.is_managed_path(&main_root, &found.path) {
            return Allocation::unmanaged(cwd, Some(branch));
        }

        if !is_primary_branch(&branch) {
            let _guard = self.lock.lock().await;
            let store = self.metadata_store(&main_root);
            let tracked = match store.track_session(&branch, session_id) {
                Ok(true) => Ok(()),
                Ok(false) => store
                    .record_allocation(&branch, &found.path, session_id)
                    .map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = tracked {
                warn!(
                    event = "core.worktree.detect_track_failed",
                    branch = %branch,
                    session_id = session_id,
                    error = %e
                );
            }
        }

        info!(
            event = "core.worktree.detect_completed",
            branch = %branch,
            worktree_path = %found.path.display(),
            session_id = session_id
        );
        Allocation {
            session_cwd: cwd.to_path_buf(),
            branch: Some(branch),
            worktree: Some(WorktreeDescriptor {
                enabled: true,
                path: found.path.clone(),
                is_main: false,
                repo_root: main_root,
            }),
        }
    }

    async fn allocate_worktree(
        &self,
        cwd: &Path,
        branch: &str,
        new_branch: Option<bool>,
        session_id: &str,
    ) -> Result<Allocation, WorktreeError> {
        let repo_root = match self.git.repo_root(cwd).await {
            Ok(root) => root,
            Err(e) => {
                info!(
                    event = "core.worktree.allocate_skipped",
                    cwd = %cwd.display(),
                    reason = %e
                );
                return Ok(Allocation::unmanaged(cwd, None));
            }
        };
        let main_root = self
            .git
            .main_checkout_root(&repo_root)
            .await
            .unwrap_or(repo_root);

        let current = self.git.current_branch(&main_root).await;
        if current.as_deref() == Some(branch) || is_primary_branch(branch) {
            let managed_root = self.git.layout().worktrees_root(&main_root);
            let in_linked_worktree = resolve_path(cwd).starts_with(resolve_path(&managed_root));
            let session_cwd = if in_linked_worktree {
                main_root.clone()
            } else {
                cwd.to_path_buf()
            };
            info!(
                event = "core.worktree.allocate_main",
                branch = branch,
                repo_root = %main_root.display(),
                session_id = session_id
            );
            return Ok(Allocation {
                session_cwd,
                branch: Some(branch.to_string()),
                worktree: Some(WorktreeDescriptor {
                    enabled: true,
                    path: main_root.clone(),
                    is_main: true,
                    repo_root: main_root,
                }),
            });
        }

        let _guard = self.lock.lock().await;
        let store = self.metadata_store(&main_root);

        info!(
            event = "core.worktree.allocate_started",
            branch = branch,
            repo_root = %main_root.display(),
            session_id = session_id
        );

        let entries = self.git.list_worktrees(&main_root).await?;
        if let Some(existing) = self.reusable_worktree(&main_root, &entries, &store, branch).await {
            if self.git.is_managed_path(&main_root, &existing)
                && !store.track_session(branch, session_id)?
            {
                store.record_allocation(branch, &existing, session_id)?;
            }
            info!(
                event = "core.worktree.allocate_reused",
                branch = branch,
                worktree_path = %existing.display(),
                session_id = session_id
            );
            return Ok(self.worktree_allocation(&main_root, branch, existing));
        }

        self.unclaimed_target(&main_root, &entries, &store, branch)?;
        let (path, create_branch) = self
            .create_branch_worktree(&main_root, branch, new_branch)
            .await?;

        if let Err(e) = store.record_allocation(branch, &path, session_id) {
            warn!(
                event = "core.worktree.allocate_rollback",
                branch = branch,
                worktree_path = %path.display(),
                error = %e
            );
            if let Err(remove_err) = self.git.remove_worktree(&main_root, &path, false).await {
                warn!(
                    event = "core.worktree.allocate_rollback_failed",
                    worktree_path = %path.display(),
                    error = %remove_err
                );
            }
            return Err(e);
        }

        info!(
            event = "core.worktree.allocate_completed",
            branch = branch,
            new_branch = create_branch,
            worktree_path = %path.display(),
            session_id = session_id
        );
        Ok(self.worktree_allocation(&main_root, branch, path))
    }

    /// Create a managed worktree outside any session.
    ///
    /// The same collision guard as session allocation applies. No metadata
    /// record is written; the first session that allocates the branch adopts
    /// the worktree.
    pub async fn create_worktree(
        &self,
        cwd: &Path,
        branch: &str,
        new_branch: Option<bool>,
    ) -> Result<PathBuf, WorktreeError> {
        let branch = validate_branch_name(branch.trim())?;
        let main_root = self.git.main_checkout_root(cwd).await?;

        let _guard = self.lock.lock().await;
        let store = self.metadata_store(&main_root);
        let entries = self.git.list_worktrees(&main_root).await?;

        if let Some(existing) = self
            .reusable_worktree(&main_root, &entries, &store, &branch)
            .await
        {
            return Err(GitError::WorktreeAlreadyExists {
                path: existing.display().to_string(),
            }
            .into());
        }
        self.unclaimed_target(&main_root, &entries, &store, &branch)?;

        let (path, create_branch) = self
            .create_branch_worktree(&main_root, &branch, new_branch)
            .await?;
        info!(
            event = "core.worktree.create_completed",
            branch = %branch,
            new_branch = create_branch,
            worktree_path = %path.display()
        );
        Ok(path)
    }

    /// Remove a managed worktree and its metadata record.
    ///
    /// # Errors
    ///
    /// `WorktreeInUse` when sessions still reference the worktree and
    /// `force` is not set; `NotManagedByUs` for paths outside the managed
    /// directory.
    pub async fn remove_worktree(
        &self,
        cwd: &Path,
        path: &Path,
        force: bool,
    ) -> Result<(), WorktreeError> {
        let main_root = self.git.main_checkout_root(cwd).await?;

        let _guard = self.lock.lock().await;
        let store = self.metadata_store(&main_root);
        let record = store.load().find_by_path(path).cloned();

        if let Some(in_use) = record
            .as_ref()
            .filter(|r| !r.sessions.is_empty() && !force)
        {
            warn!(
                event = "core.worktree.remove_refused",
                branch = %in_use.branch,
                worktree_path = %path.display(),
                sessions = in_use.sessions.len()
            );
            return Err(WorktreeError::WorktreeInUse {
                path: path.display().to_string(),
                sessions: in_use.sessions.len(),
            });
        }

        self.git.remove_worktree(&main_root, path, force).await?;
        if let Some(record) = &record {
            store.remove(&record.branch)?;
        }

        info!(
            event = "core.worktree.remove_completed",
            worktree_path = %path.display(),
            branch = ?record.as_ref().map(|r| r.branch.as_str())
        );
        Ok(())
    }

    /// The managed directory for `branch`, unless another branch already claims it.
    fn unclaimed_target(
        &self,
        main_root: &Path,
        entries: &[WorktreeEntry],
        store: &WorktreeMetadataStore,
        branch: &str,
    ) -> Result<PathBuf, WorktreeError> {
        let target = self.git.worktree_path_for(main_root, branch)?;
        let metadata = store.load();
        let colliding = metadata
            .find_by_path(&target)
            .map(|record| record.branch.clone())
            .or_else(|| {
                entries
                    .iter()
                    .find(|e| resolve_path(&e.path) == resolve_path(&target))
                    .and_then(|e| e.branch.clone())
            });
        if let Some(existing_branch) = colliding.filter(|b| b != branch) {
            warn!(
                event = "core.worktree.allocate_collision",
                branch = branch,
                existing_branch = %existing_branch,
                worktree_path = %target.display()
            );
            return Err(WorktreeError::WorktreePathCollision {
                branch: branch.to_string(),
                existing_branch,
                path: target.display().to_string(),
            });
        }
        Ok(target)
    }

    /// Run `git worktree add`, creating the branch when asked to or when it
    /// does not exist yet. Returns the path and whether the branch was new.
    async fn create_branch_worktree(
        &self,
        main_root: &Path,
        branch: &str,
        new_branch: Option<bool>,
    ) -> Result<(PathBuf, bool), WorktreeError> {
        let create_branch = match new_branch {
            Some(explicit) => explicit,
            None => !self
                .git
                .all_branches(main_root)
                .await?
                .iter()
                .any(|b| b == branch),
        };

        let path = self
            .git
            .create_worktree(main_root, branch, create_branch)
            .await
            .map_err(|e| match e {
                GitError::CommandFailed { message } => WorktreeError::WorktreeCreationFailed {
                    branch: branch.to_string(),
                    message,
                },
                GitError::IoError { source } => WorktreeError::WorktreeCreationFailed {
                    branch: branch.to_string(),
                    message: source.to_string(),
                },
                other => WorktreeError::Git(other),
            })?;
        Ok((path, create_branch))
    }

    /// An existing on-disk worktree for `branch`, healing stale state on the way.
    async fn reusable_worktree(
        &self,
        main_root: &Path,
        entries: &[WorktreeEntry],
        store: &WorktreeMetadataStore,
        branch: &str,
    ) -> Option<PathBuf> {
        let main = resolve_path(main_root);
        let entry = entries
            .iter()
            .filter(|e| resolve_path(&e.path) != main)
            .find(|e| e.branch.as_deref() == Some(branch));

        if let Some(entry) = entry {
            if entry.path.is_dir() {
                return Some(entry.path.clone());
            }
            warn!(
                event = "core.worktree.stale_entry",
                branch = branch,
                worktree_path = %entry.path.display(),
                message = "Worktree registered with git but missing on disk"
            );
            self.heal(main_root, store, branch).await;
            return None;
        }

        if let Some(record) = store.get(branch) {
            warn!(
                event = "core.worktree.stale_record",
                branch = branch,
                worktree_path = %record.path.display(),
                message = "Metadata record without a git worktree"
            );
            self.heal(main_root, store, branch).await;
        }
        None
    }

    async fn heal(&self, main_root: &Path, store: &WorktreeMetadataStore, branch: &str) {
        if let Err(e) = self.git.prune_worktrees(main_root).await {
            warn!(event = "core.worktree.heal_prune_failed", error = %e);
        }
        if let Err(e) = store.remove(branch) {
            warn!(event = "core.worktree.heal_record_failed", branch = branch, error = %e);
        }
    }

    fn worktree_allocation(&self, main_root: &Path, branch: &str, path: PathBuf) -> Allocation {
        Allocation {
            session_cwd: path.clone(),
            branch: Some(branch.to_string()),
            worktree: Some(WorktreeDescriptor {
                enabled: true,
                path,
                is_main: false,
                repo_root: main_root.to_path_buf(),
            }),
        }
    }

    /// Check out `branch` in place. Failure leaves the directory as it was.
    async fn switch_in_place(&self, cwd: &Path, branch: &str) -> Allocation {
        if !self.git.is_repo(cwd).await {
            return Allocation::unmanaged(cwd, None);
        }
        let current = self.git.current_branch(cwd).await;
        if current.as_deref() == Some(branch) {
            return Allocation::unmanaged(cwd, current);
        }

        match self.git.checkout_branch(cwd, branch).await {
            Ok(()) => Allocation::unmanaged(cwd, Some(branch.to_string())),
            Err(e) => {
                warn!(
                    event = "core.worktree.checkout_failed",
                    branch = branch,
                    cwd = %cwd.display(),
                    error = %e,
                    message = "Session continues on the current branch"
                );
                Allocation::unmanaged(cwd, current)
            }
        }
    }

    /// Drop `session_id`'s hold on its worktree, removing it when safe.
    pub async fn release(
        &self,
        session_id: &str,
        branch: Option<&str>,
        descriptor: Option<&WorktreeDescriptor>,
    ) -> ReleaseOutcome {
        let (Some(branch), Some(descriptor)) = (branch, descriptor) else {
            return ReleaseOutcome::NotManaged;
        };
        if !descriptor.is_reclaimable() {
            return ReleaseOutcome::NotManaged;
        }

        let _guard = self.lock.lock().await;
        let repo_root = &descriptor.repo_root;
        let path = descriptor.path.clone();
        let store = self.metadata_store(repo_root);

        let remaining = match store.untrack_session(branch, session_id) {
            Ok(Some(remaining)) => remaining,
            Ok(None) => {
                info!(
                    event = "core.worktree.release_untracked",
                    branch = branch,
                    session_id = session_id,
                    message = "No metadata record, leaving worktree alone"
                );
                return ReleaseOutcome::NotManaged;
            }
            Err(e) => {
                return ReleaseOutcome::Failed {
                    path,
                    message: e.to_string(),
                };
            }
        };

        if remaining > 0 {
            debug!(
                event = "core.worktree.release_still_in_use",
                branch = branch,
                remaining = remaining
            );
            return ReleaseOutcome::StillInUse { remaining };
        }

        if !path.is_dir() {
            warn!(
                event = "core.worktree.stale_record",
                branch = branch,
                worktree_path = %path.display(),
                message = "Worktree directory already gone"
            );
            self.heal(repo_root, &store, branch).await;
            return ReleaseOutcome::Removed { path };
        }

        if !self.git.is_managed_path(repo_root, &path) {
            return ReleaseOutcome::Retained {
                path,
                reason: "not inside the managed worktrees directory".to_string(),
            };
        }

        match self.git.has_uncommitted_changes(&path).await {
            Ok(false) => {}
            Ok(true) => {
                warn!(
                    event = "core.worktree.release_retained",
                    branch = branch,
                    worktree_path = %path.display(),
                    reason = "uncommitted changes"
                );
                return ReleaseOutcome::Retained {
                    path,
                    reason: "uncommitted changes".to_string(),
                };
            }
            Err(e) => {
                warn!(
                    event = "core.worktree.release_retained",
                    branch = branch,
                    worktree_path = %path.display(),
                    error = %e
                );
                return ReleaseOutcome::Retained {
                    path,
                    reason: format!("could not check status: {e}"),
                };
            }
        }

        if let Err(e) = self.git.remove_worktree(repo_root, &path, false).await {
            warn!(
                event = "core.worktree.release_failed",
                branch = branch,
                worktree_path = %path.display(),
                error = %e
            );
            return ReleaseOutcome::Failed {
                path,
                message: e.to_string(),
            };
        }
        if let Err(e) = store.remove(branch) {
            warn!(event = "core.worktree.release_record_failed", branch = branch, error = %e);
        }

        info!(
            event = "core.worktree.release_completed",
            branch = branch,
            worktree_path = %path.display(),
            session_id = session_id
        );
        ReleaseOutcome::Removed { path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArborConfig;
    use crate::errors::ArborError;
    use crate::git::handler::test_support::{git, init_repo};

    fn allocator() -> WorktreeAllocator {
        WorktreeAllocator::new(Git::from_config(&ArborConfig::default()))
    }

    fn repo() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let root = dir.path().canonicalize().unwrap();
        (dir, root)
    }

    fn worktree_request(cwd: &Path, branch: &str) -> AllocationRequest {
        AllocationRequest {
            cwd: cwd.to_path_buf(),
            worktree_mode: true,
            branch_name: Some(branch.to_string()),
            new_branch: None,
        }
    }

    fn release_args(allocation: &Allocation) -> (Option<&str>, Option<&WorktreeDescriptor>) {
        (allocation.branch.as_deref(), allocation.worktree.as_ref())
    }

    #[tokio::test]
    async fn test_current_branch_uses_main_checkout() {
        let (_dir, root) = repo();
        let allocator = allocator();

        let allocation = allocator
            .allocate(&worktree_request(&root, "main"), "s1")
            .await
            .unwrap();

        assert_eq!(allocation.session_cwd, root);
        let worktree = allocation.worktree.unwrap();
        assert!(worktree.enabled);
        assert!(worktree.is_main);
        assert!(!root.join(".arbor/worktrees").exists());
    }

    #[tokio::test]
    async fn test_new_branch_gets_managed_worktree() {
        let (_dir, root) = repo();
        let allocator = allocator();

        let allocation = allocator
            .allocate(&worktree_request(&root, "feature-x"), "s1")
            .await
            .unwrap();

        let expected = root.join(".arbor/worktrees/feature-x");
        assert_eq!(allocation.session_cwd, expected);
        assert_eq!(allocation.branch.as_deref(), Some("feature-x"));
        assert!(allocation.holds_worktree());
        assert!(expected.join("README.md").exists());

        let record = allocator.metadata_store(&root).get("feature-x").unwrap();
        assert_eq!(record.path, expected);
        assert!(record.sessions.contains("s1"));
    }

    #[tokio::test]
    async fn test_existing_worktree_is_shared() {
        let (_dir, root) = repo();
        let allocator = allocator();
        let first = allocator
            .allocate(&worktree_request(&root, "shared"), "s1")
            .await
            .unwrap();
        let second = allocator
            .allocate(&worktree_request(&root, "shared"), "s2")
            .await
            .unwrap();

        assert_eq!(first.session_cwd, second.session_cwd);
        let record = allocator.metadata_store(&root).get("shared").unwrap();
        assert_eq!(record.sessions.len(), 2);

        let (branch, descriptor) = release_args(&first);
        assert_eq!(
            allocator.release("s1", branch, descriptor).await,
            ReleaseOutcome::StillInUse { remaining: 1 }
        );
        assert!(second.session_cwd.exists());
    }

    #[tokio::test]
    async fn test_existing_branch_is_checked_out_not_created() {
        let (_dir, root) = repo();
        git(&root, &["branch", "existing"]);
        let allocator = allocator();

        let allocation = allocator
            .allocate(&worktree_request(&root, "existing"), "s1")
            .await
            .unwrap();
        assert_eq!(
            git(&allocation.session_cwd, &["symbolic-ref", "--short", "HEAD"]),
            "existing"
        );
    }

    #[tokio::test]
    async fn test_detects_worktree_containing_cwd() {
        let (_dir, root) = repo();
        let allocator = allocator();
        let created = allocator
            .allocate(&worktree_request(&root, "feature-x"), "s1")
            .await
            .unwrap();

        let request = AllocationRequest {
            cwd: created.session_cwd.clone(),
            ..Default::default()
        };
        let detected = allocator.allocate(&request, "s2").await.unwrap();

        assert_eq!(detected.branch.as_deref(), Some("feature-x"));
        let worktree = detected.worktree.unwrap();
        assert!(worktree.enabled);
        assert!(!worktree.is_main);
        assert_eq!(worktree.path, created.session_cwd);

        let record = allocator.metadata_store(&root).get("feature-x").unwrap();
        assert!(record.sessions.contains("s2"));
    }

    #[tokio::test]
    async fn test_detection_in_main_checkout_is_unmanaged() {
        let (_dir, root) = repo();
        let request = AllocationRequest {
            cwd: root.clone(),
            ..Default::default()
        };
        let allocation = allocator().allocate(&request, "s1").await.unwrap();
        assert_eq!(allocation.branch.as_deref(), Some("main"));
        assert!(allocation.worktree.is_none());
    }

    #[tokio::test]
    async fn test_outside_repository_is_unmanaged() {
        let dir = tempfile::tempdir().unwrap();
        let allocation = allocator()
            .allocate(&worktree_request(dir.path(), "feature-x"), "s1")
            .await
            .unwrap();
        assert_eq!(allocation, Allocation::unmanaged(dir.path(), None));
    }

    #[tokio::test]
    async fn test_invalid_branch_fails_before_side_effects() {
        let (_dir, root) = repo();
        for bad in ["--force", "../escape", "a b"] {
            let err = allocator()
                .allocate(&worktree_request(&root, bad), "s1")
                .await
                .unwrap_err();
            assert!(
                matches!(err, WorktreeError::Git(GitError::InvalidBranchName { .. })),
                "{bad}: {err:?}"
            );
        }
        assert!(!root.join(".arbor").exists());
    }

    #[tokio::test]
    async fn test_sanitization_collision_is_rejected() {
        let (_dir, root) = repo();
        let allocator = allocator();
        allocator
            .allocate(&worktree_request(&root, "feature/x"), "s1")
            .await
            .unwrap();

        let err = allocator
            .allocate(&worktree_request(&root, "Feature/X"), "s2")
            .await
            .unwrap_err();
        assert!(matches!(err, WorktreeError::WorktreePathCollision { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_creation_failure_is_reported() {
        let (_dir, root) = repo();
        let mut request = worktree_request(&root, "missing-branch");
        request.new_branch = Some(false);
        let err = allocator().allocate(&request, "s1").await.unwrap_err();
        assert!(matches!(err, WorktreeError::WorktreeCreationFailed { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_plain_checkout_switches_branch_in_place() {
        let (_dir, root) = repo();
        git(&root, &["branch", "other"]);
        let request = AllocationRequest {
            cwd: root.clone(),
            worktree_mode: false,
            branch_name: Some("other".to_string()),
            new_branch: None,
        };
        let allocation = allocator().allocate(&request, "s1").await.unwrap();
        assert_eq!(allocation.session_cwd, root);
        assert_eq!(allocation.branch.as_deref(), Some("other"));
        assert!(allocation.worktree.is_none());
        assert_eq!(git(&root, &["symbolic-ref", "--short", "HEAD"]), "other");
    }

    #[tokio::test]
    async fn test_failed_plain_checkout_does_not_abort() {
        let (_dir, root) = repo();
        let request = AllocationRequest {
            cwd: root.clone(),
            worktree_mode: false,
            branch_name: Some("does-not-exist".to_string()),
            new_branch: None,
        };
        let allocation = allocator().allocate(&request, "s1").await.unwrap();
        assert_eq!(allocation.session_cwd, root);
        assert_eq!(allocation.branch.as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn test_release_removes_clean_worktree() {
        let (_dir, root) = repo();
        let allocator = allocator();
        let allocation = allocator
            .allocate(&worktree_request(&root, "clean"), "s1")
            .await
            .unwrap();

        let (branch, descriptor) = release_args(&allocation);
        let outcome = allocator.release("s1", branch, descriptor).await;

        assert_eq!(
            outcome,
            ReleaseOutcome::Removed {
                path: allocation.session_cwd.clone()
            }
        );
        assert!(!allocation.session_cwd.exists());
        assert!(allocator.metadata_store(&root).get("clean").is_none());
        let listed = git(&root, &["worktree", "list", "--porcelain"]);
        assert!(!listed.contains("worktrees/clean"));
    }

    #[tokio::test]
    async fn test_release_keeps_dirty_worktree() {
        let (_dir, root) = repo();
        let allocator = allocator();
        let allocation = allocator
            .allocate(&worktree_request(&root, "dirty"), "s1")
            .await
            .unwrap();
        std::fs::write(allocation.session_cwd.join("work.txt"), "unsaved").unwrap();

        let (branch, descriptor) = release_args(&allocation);
        let outcome = allocator.release("s1", branch, descriptor).await;

        assert!(matches!(outcome, ReleaseOutcome::Retained { .. }), "{outcome:?}");
        assert!(outcome.warning().unwrap().contains("uncommitted changes"));
        assert!(allocation.session_cwd.join("work.txt").exists());
        assert!(allocator.metadata_store(&root).get("dirty").is_some());
    }

    #[tokio::test]
    async fn test_release_of_main_checkout_is_noop() {
        let (_dir, root) = repo();
        let allocator = allocator();
        let allocation = allocator
            .allocate(&worktree_request(&root, "main"), "s1")
            .await
            .unwrap();
        let (branch, descriptor) = release_args(&allocation);
        assert_eq!(
            allocator.release("s1", branch, descriptor).await,
            ReleaseOutcome::NotManaged
        );
        assert!(root.join("README.md").exists());
    }

    #[tokio::test]
    async fn test_stale_worktree_is_recreated() {
        let (_dir, root) = repo();
        let allocator = allocator();
        let first = allocator
            .allocate(&worktree_request(&root, "stale"), "s1")
            .await
            .unwrap();
        std::fs::remove_dir_all(&first.session_cwd).unwrap();

        let second = allocator
            .allocate(&worktree_request(&root, "stale"), "s2")
            .await
            .unwrap();
        assert!(second.session_cwd.join("README.md").exists());
        let record = allocator.metadata_store(&root).get("stale").unwrap();
        assert_eq!(record.created_by, "s2");
        assert!(!record.sessions.contains("s1"));
    }

    #[tokio::test]
    async fn test_standalone_worktree_is_adopted_by_first_session() {
        let (_dir, root) = repo();
        let allocator = allocator();

        let path = allocator.create_worktree(&root, "tooling", None).await.unwrap();
        assert_eq!(path, root.join(".arbor/worktrees/tooling"));
        assert!(allocator.metadata_store(&root).get("tooling").is_none());

        let allocation = allocator
            .allocate(&worktree_request(&root, "tooling"), "s1")
            .await
            .unwrap();
        assert_eq!(allocation.session_cwd, path);
        let record = allocator.metadata_store(&root).get("tooling").unwrap();
        assert!(record.sessions.contains("s1"));
    }

    #[tokio::test]
    async fn test_standalone_create_of_existing_worktree_fails() {
        let (_dir, root) = repo();
        let allocator = allocator();
        allocator.create_worktree(&root, "twice", None).await.unwrap();

        let err = allocator
            .create_worktree(&root, "twice", None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "WORKTREE_ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_standalone_create_honors_recorded_collision() {
        let (_dir, root) = repo();
        let allocator = allocator();
        let first = allocator
            .allocate(&worktree_request(&root, "feature/x"), "s1")
            .await
            .unwrap();
        // Directory gone, record for the other branch still present
        std::fs::remove_dir_all(&first.session_cwd).unwrap();

        let err = allocator
            .create_worktree(&root, "Feature/X", None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorktreeError::WorktreePathCollision { .. }), "{err:?}");
        assert!(!first.session_cwd.exists());
        assert_eq!(
            allocator.metadata_store(&root).get("feature/x").unwrap().branch,
            "feature/x"
        );
    }

    #[tokio::test]
    async fn test_remove_in_use_worktree_requires_force() {
        let (_dir, root) = repo();
        let allocator = allocator();
        let allocation = allocator
            .allocate(&worktree_request(&root, "feat"), "s1")
            .await
            .unwrap();
        let path = allocation.session_cwd.clone();

        let err = allocator.remove_worktree(&root, &path, false).await.unwrap_err();
        assert!(matches!(err, WorktreeError::WorktreeInUse { sessions: 1, .. }), "{err:?}");
        assert!(path.is_dir());
        assert!(allocator.metadata_store(&root).get("feat").is_some());

        allocator.remove_worktree(&root, &path, true).await.unwrap();
        assert!(!path.exists());
        assert!(allocator.metadata_store(&root).get("feat").is_none());

        // The session's later release finds nothing to reclaim
        let (branch, descriptor) = release_args(&allocation);
        assert_eq!(
            allocator.release("s1", branch, descriptor).await,
            ReleaseOutcome::NotManaged
        );
    }

    #[tokio::test]
    async fn test_remove_unrecorded_worktree() {
        let (_dir, root) = repo();
        let allocator = allocator();
        let path = allocator.create_worktree(&root, "loose", None).await.unwrap();

        allocator.remove_worktree(&root, &path, false).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_remove_outside_managed_directory_is_refused() {
        let (_dir, root) = repo();
        let err = allocator()
            .remove_worktree(&root, &root, true)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "NOT_MANAGED_BY_US");
        assert!(root.join("README.md").exists());
    }
}
