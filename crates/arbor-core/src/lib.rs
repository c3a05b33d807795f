//! arbor-core: PTY-backed agent sessions coordinated with git worktrees
//!
//! This library owns the session lifecycle (spawn, I/O, resize, terminate,
//! dispose) and the worktree state machine that decides which directory a
//! session runs in and when a worktree may be deleted. It is used by the
//! `arbor` binary, which exposes it over a JSON-lines transport.
//!
//! # Main Entry Points
//!
//! - [`sessions`] - Create, list, write to, resize, terminate and dispose sessions
//! - [`worktrees`] - Worktree allocation, metadata and reclamation
//! - [`git`] - Typed git operations built on the external `git` binary
//! - [`config`] - Configuration management
//! - [`agents`] - Session kinds and CLI tool detection

pub mod agents;
pub mod config;
pub mod errors;
pub mod events;
pub mod git;
pub mod logging;
pub mod pty;
pub mod sessions;
pub mod worktrees;

// Re-export commonly used types at crate root for convenience
pub use agents::{PathToolChecker, SessionKind, ToolChecker};
pub use config::ArborConfig;
pub use errors::ArborError;
pub use git::{Git, GitError, WorktreeEntry};
pub use pty::{PtyError, PtyEvent, PtySize, SessionStatus};
pub use sessions::{
    CreateSessionRequest, DisposeOutcome, SessionController, SessionError, SessionSummary,
};
pub use worktrees::{WorktreeAllocator, WorktreeDescriptor, WorktreeError, WorktreeMetadataStore};

// Re-export logging initialization
pub use logging::init_logging;
