//! Session lifecycle orchestration.
//!
//! Creation: validate the request, confirm the CLI tool is installed,
//! allocate a working directory, spawn the PTY, register the session.
//!
//! Disposal: terminate, wait (bounded) for the exit, let the dying process
//! settle, then release the worktree and drop the session from the
//! registry. The settle step must come before the worktree check; checking
//! `git status` while the process is still writing gives wrong answers.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::errors::SessionError;
use super::registry::SessionRegistry;
use super::types::{CreateSessionRequest, DisposeOutcome, Session, SessionSummary};
use crate::agents::{SessionKind, ToolChecker};
use crate::config::ArborConfig;
use crate::git::Git;
use crate::pty::{PtyEvent, PtySession, PtySize, SessionStatus, SpawnOptions, TerminateSignal};
use crate::worktrees::{AllocationRequest, ReleaseOutcome, WorktreeAllocator};

pub struct SessionController {
    config: ArborConfig,
    registry: SessionRegistry,
    allocator: WorktreeAllocator,
    tools: Arc<dyn ToolChecker>,
    events: mpsc::UnboundedSender<PtyEvent>,
}

impl SessionController {
    /// Session output and exits are delivered on `events`.
    pub fn new(
        config: ArborConfig,
        tools: Arc<dyn ToolChecker>,
        events: mpsc::UnboundedSender<PtyEvent>,
    ) -> Self {
        let allocator = WorktreeAllocator::new(Git::from_config(&config));
        Self {
            config,
            registry: SessionRegistry::new(),
            allocator,
            tools,
            events,
        }
    }

    pub fn git(&self) -> &Git {
        self.allocator.git()
    }

    pub fn allocator(&self) -> &WorktreeAllocator {
        &self.allocator
    }

    pub async fn create(
        &self,
        request: CreateSessionRequest,
    ) -> Result<SessionSummary, SessionError> {
        let kind = SessionKind::parse(&request.kind).ok_or_else(|| {
            SessionError::UnsupportedSessionKind {
                kind: request.kind.clone(),
            }
        })?;

        let cwd = match &request.cwd {
            Some(cwd) => cwd.clone(),
            None => dirs::home_dir().ok_or_else(|| SessionError::InvalidWorkingDirectory {
                path: "~".to_string(),
            })?,
        };
        if !cwd.is_dir() {
            return Err(SessionError::InvalidWorkingDirectory {
                path: cwd.display().to_string(),
            });
        }

        info!(
            event = "core.session.create_started",
            kind = kind.as_str(),
            cwd = %cwd.display(),
            worktree_mode = request.worktree_mode,
            branch = ?request.branch_name
        );

        if !kind.is_shell() && !self.tools.is_installed(kind).await {
            warn!(event = "core.session.tool_not_installed", kind = kind.as_str());
            return Err(SessionError::ToolNotInstalled {
                kind: kind.as_str().to_string(),
            });
        }

        let id = self.registry.next_id();
        let allocation_request = AllocationRequest {
            cwd: cwd.clone(),
            worktree_mode: request.worktree_mode,
            branch_name: request.branch_name.clone(),
            new_branch: request.new_branch,
        };
        let allocation = self
            .allocator
            .allocate(&allocation_request, &id)
            .await
            .inspect_err(|e| {
                error!(event = "core.session.create_failed", session_id = %id, error = %e);
            })?;

        let shell = self.config.shell();
        let launch = self.config.launch_command(kind);
        let command = launch
            .clone()
            .unwrap_or_else(|| format!("{} -l", shell.display()));
        let size = PtySize::clamped(
            request.cols.unwrap_or_else(|| self.config.default_cols()),
            request.rows.unwrap_or_else(|| self.config.default_rows()),
        );

        let spawned = PtySession::spawn(
            SpawnOptions {
                session_id: id.clone(),
                shell,
                command: launch,
                cwd: allocation.session_cwd.clone(),
                size,
                env: vec![("ARBOR_SESSION_ID".to_string(), id.clone())],
            },
            self.events.clone(),
        );
        let pty = match spawned {
            Ok(pty) => pty,
            Err(e) => {
                error!(event = "core.session.spawn_failed", session_id = %id, error = %e);
                if allocation.holds_worktree() {
                    let outcome = self
                        .allocator
                        .release(&id, allocation.branch.as_deref(), allocation.worktree.as_ref())
                        .await;
                    info!(
                        event = "core.session.spawn_rollback",
                        session_id = %id,
                        outcome = ?outcome
                    );
                }
                return Err(e.into());
            }
        };

        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.registry.default_title(kind));

        let session = Arc::new(Session {
            id: id.clone(),
            kind,
            title: std::sync::Mutex::new(title),
            command,
            created_at: Utc::now(),
            cwd: allocation.session_cwd,
            branch: allocation.branch,
            worktree: allocation.worktree,
            pty,
            disposing: Default::default(),
        });
        self.registry.insert(Arc::clone(&session));

        info!(
            event = "core.session.create_completed",
            session_id = %id,
            kind = kind.as_str(),
            cwd = %session.cwd.display(),
            branch = ?session.branch,
            pid = ?session.pty.pid()
        );
        Ok(session.summary())
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        self.registry.all().iter().map(|s| s.summary()).collect()
    }

    pub fn get(&self, id: &str) -> Result<SessionSummary, SessionError> {
        Ok(self.session(id)?.summary())
    }

    /// Forward input. Silently ignored once the session is no longer running.
    pub fn write(&self, id: &str, data: &[u8]) -> Result<(), SessionError> {
        self.session(id)?.pty.write(data)?;
        Ok(())
    }

    pub fn resize(&self, id: &str, cols: u16, rows: u16) -> Result<(), SessionError> {
        self.session(id)?.pty.resize(cols, rows);
        Ok(())
    }

    pub fn terminate(&self, id: &str, signal: Option<TerminateSignal>) -> Result<(), SessionError> {
        self.session(id)?.pty.terminate(signal);
        Ok(())
    }

    pub fn rename(&self, id: &str, title: &str) -> Result<SessionSummary, SessionError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SessionError::InvalidTitle);
        }
        let session = self.session(id)?;
        session.set_title(title.to_string());
        info!(event = "core.session.renamed", session_id = id, title = title);
        Ok(session.summary())
    }

    /// Stop the session and reclaim its worktree when that is safe.
    ///
    /// Never fails: problems end up as warnings, and the session leaves
    /// the registry regardless. Unknown ids are a no-op.
    pub async fn dispose(&self, id: &str) -> DisposeOutcome {
        let mut outcome = DisposeOutcome {
            session_id: id.to_string(),
            ..Default::default()
        };
        let Some(session) = self.registry.get(id) else {
            return outcome;
        };
        if session.disposing.swap(true, Ordering::SeqCst) {
            outcome.warnings.push("dispose already in progress".to_string());
            return outcome;
        }

        info!(event = "core.session.dispose_started", session_id = id);

        if session.pty.status() != SessionStatus::Exited {
            session.pty.terminate(None);
            let timeout = self.config.exit_timeout();
            if !session.pty.wait_exited(timeout).await {
                warn!(
                    event = "core.session.exit_wait_timeout",
                    session_id = id,
                    timeout_ms = timeout.as_millis() as u64
                );
                outcome.warnings.push(format!(
                    "Process did not exit within {}ms",
                    timeout.as_millis()
                ));
            }
        }

        if session.holds_worktree() {
            tokio::time::sleep(self.config.settle_grace()).await;
            let release = self
                .allocator
                .release(id, session.branch.as_deref(), session.worktree.as_ref())
                .await;
            outcome.worktree_removed = matches!(release, ReleaseOutcome::Removed { .. });
            if let Some(warning) = release.warning() {
                outcome.warnings.push(warning);
            }
        }

        self.registry.remove(id);
        outcome.disposed = true;

        info!(
            event = "core.session.dispose_completed",
            session_id = id,
            worktree_removed = outcome.worktree_removed,
            warnings = outcome.warnings.len()
        );
        outcome
    }

    /// Dispose every live session.
    pub async fn shutdown(&self) -> Vec<DisposeOutcome> {
        let ids = self.registry.ids();
        info!(event = "core.session.shutdown_started", sessions = ids.len());
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in &ids {
            outcomes.push(self.dispose(id).await);
        }
        info!(event = "core.session.shutdown_completed");
        outcomes
    }

    fn session(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        self.registry
            .get(id)
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })
    }
}
