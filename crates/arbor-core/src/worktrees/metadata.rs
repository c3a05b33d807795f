//! Per-repository worktree metadata document.
//!
//! Shape on disk:
//!
//! ```json
//! { "worktrees": { "<branch>": { "branch", "path", "createdAt", "createdBy", "sessions": [] } } }
//! ```
//!
//! Every mutation is a read-modify-write of the whole file. There is no
//! cross-process locking; callers in one process serialize through
//! [`crate::worktrees::WorktreeAllocator`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::errors::WorktreeError;
use crate::git::operations::resolve_path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeRecord {
    pub branch: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub sessions: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeMetadata {
    #[serde(default)]
    pub worktrees: BTreeMap<String, WorktreeRecord>,
}

impl WorktreeMetadata {
    /// The record whose directory is `path`, if any.
    pub fn find_by_path(&self, path: &Path) -> Option<&WorktreeRecord> {
        let wanted = resolve_path(path);
        self.worktrees
            .values()
            .find(|record| resolve_path(&record.path) == wanted)
    }
}

/// File-backed metadata for one repository.
#[derive(Debug, Clone)]
pub struct WorktreeMetadataStore {
    path: PathBuf,
}

impl WorktreeMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document. Absent or unparseable files read as empty.
    pub fn load(&self) -> WorktreeMetadata {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return WorktreeMetadata::default();
            }
            Err(e) => {
                warn!(
                    event = "core.worktree.metadata_read_failed",
                    path = %self.path.display(),
                    error = %e
                );
                return WorktreeMetadata::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(
                    event = "core.worktree.metadata_corrupt",
                    path = %self.path.display(),
                    error = %e,
                    message = "Treating corrupt metadata as empty"
                );
                WorktreeMetadata::default()
            }
        }
    }

    /// Write the whole document via a temp file and rename.
    pub fn save(&self, metadata: &WorktreeMetadata) -> Result<(), WorktreeError> {
        let write_failed = |message: String| WorktreeError::MetadataWriteFailed {
            path: self.path.display().to_string(),
            message,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_failed(e.to_string()))?;
        }
        let json =
            serde_json::to_string_pretty(metadata).map_err(|e| write_failed(e.to_string()))?;

        let temp_file = self.path.with_extension("json.tmp");
        if let Err(e) = fs::write(&temp_file, json) {
            cleanup_temp_file(&temp_file);
            return Err(write_failed(e.to_string()));
        }
        if let Err(e) = fs::rename(&temp_file, &self.path) {
            cleanup_temp_file(&temp_file);
            return Err(write_failed(e.to_string()));
        }

        debug!(
            event = "core.worktree.metadata_saved",
            path = %self.path.display(),
            records = metadata.worktrees.len()
        );
        Ok(())
    }

    /// Create the record for `branch` if absent and add `creator` to its sessions.
    pub fn record_allocation(
        &self,
        branch: &str,
        path: &Path,
        creator: &str,
    ) -> Result<WorktreeRecord, WorktreeError> {
        let mut metadata = self.load();
        let record = metadata
            .worktrees
            .entry(branch.to_string())
            .or_insert_with(|| WorktreeRecord {
                branch: branch.to_string(),
                path: path.to_path_buf(),
                created_at: Utc::now(),
                created_by: creator.to_string(),
                sessions: BTreeSet::new(),
            });
        record.sessions.insert(creator.to_string());
        let record = record.clone();
        self.save(&metadata)?;

        info!(
            event = "core.worktree.metadata_recorded",
            branch = branch,
            worktree_path = %record.path.display(),
            session_id = creator
        );
        Ok(record)
    }

    /// Add `session_id` to the record for `branch`.
    ///
    /// Returns `false` when there is no record. Idempotent.
    pub fn track_session(&self, branch: &str, session_id: &str) -> Result<bool, WorktreeError> {
        let mut metadata = self.load();
        let Some(record) = metadata.worktrees.get_mut(branch) else {
            return Ok(false);
        };
        if record.sessions.insert(session_id.to_string()) {
            self.save(&metadata)?;
            debug!(
                event = "core.worktree.session_tracked",
                branch = branch,
                session_id = session_id
            );
        }
        Ok(true)
    }

    /// Remove `session_id` from the record for `branch`.
    ///
    /// Returns the number of sessions still referencing the worktree, or
    /// `None` when there is no record. Idempotent.
    pub fn untrack_session(
        &self,
        branch: &str,
        session_id: &str,
    ) -> Result<Option<usize>, WorktreeError> {
        let mut metadata = self.load();
        let Some(record) = metadata.worktrees.get_mut(branch) else {
            return Ok(None);
        };
        let remaining = if record.sessions.remove(session_id) {
            let remaining = record.sessions.len();
            self.save(&metadata)?;
            debug!(
                event = "core.worktree.session_untracked",
                branch = branch,
                session_id = session_id,
                remaining = remaining
            );
            remaining
        } else {
            record.sessions.len()
        };
        Ok(Some(remaining))
    }

    /// Delete the record for `branch`. Returns whether one existed.
    pub fn remove(&self, branch: &str) -> Result<bool, WorktreeError> {
        let mut metadata = self.load();
        if metadata.worktrees.remove(branch).is_none() {
            return Ok(false);
        }
        self.save(&metadata)?;
        info!(event = "core.worktree.metadata_removed", branch = branch);
        Ok(true)
    }

    pub fn get(&self, branch: &str) -> Option<WorktreeRecord> {
        self.load().worktrees.remove(branch)
    }
}

fn cleanup_temp_file(temp_file: &Path) {
    if let Err(e) = fs::remove_file(temp_file) {
        warn!(
            event = "core.worktree.temp_file_cleanup_failed",
            temp_file = %temp_file.display(),
            error = %e
        );
    }
}
