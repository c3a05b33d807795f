use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::SessionKind;
use crate::pty::{PtySession, SessionStatus};
use crate::worktrees::WorktreeDescriptor;

/// Parameters for creating a session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Session kind name, e.g. `claude` or `shell`.
    pub kind: String,
    /// Defaults to the user's home directory.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub worktree_mode: bool,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub new_branch: Option<bool>,
    #[serde(default)]
    pub cols: Option<u16>,
    #[serde(default)]
    pub rows: Option<u16>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Public view of a session. Never carries the process handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub kind: SessionKind,
    pub title: String,
    pub status: SessionStatus,
    pub exit_code: Option<i32>,
    pub command: String,
    pub created_at: DateTime<Utc>,
    pub cwd: PathBuf,
    pub branch: Option<String>,
    pub worktree: Option<WorktreeDescriptor>,
}

/// What `dispose` did. Disposal itself never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisposeOutcome {
    pub session_id: String,
    /// `false` when the id was unknown or another dispose was in progress.
    pub disposed: bool,
    pub worktree_removed: bool,
    pub warnings: Vec<String>,
}

/// A live session as held by the registry.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub kind: SessionKind,
    pub title: Mutex<String>,
    pub command: String,
    pub created_at: DateTime<Utc>,
    pub cwd: PathBuf,
    pub branch: Option<String>,
    pub worktree: Option<WorktreeDescriptor>,
    pub pty: PtySession,
    pub(crate) disposing: AtomicBool,
}

impl Session {
    pub fn title(&self) -> String {
        self.title
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_title(&self, title: String) {
        *self
            .title
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = title;
    }

    /// Whether disposing this session may remove a worktree.
    pub fn holds_worktree(&self) -> bool {
        self.worktree
            .as_ref()
            .is_some_and(WorktreeDescriptor::is_reclaimable)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            kind: self.kind,
            title: self.title(),
            status: self.pty.status(),
            exit_code: self.pty.exit_code(),
            command: self.command.clone(),
            created_at: self.created_at,
            cwd: self.cwd.clone(),
            branch: self.branch.clone(),
            worktree: self.worktree.clone(),
        }
    }
}
