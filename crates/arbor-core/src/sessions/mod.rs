//! Session lifecycle.
//!
//! [`SessionController`] is the entry point; it owns the
//! [`SessionRegistry`](registry::SessionRegistry) and the worktree allocator.

pub mod controller;
pub mod errors;
pub mod registry;
pub mod types;

pub use controller::SessionController;
pub use errors::SessionError;
pub use registry::SessionRegistry;
pub use types::{CreateSessionRequest, DisposeOutcome, Session, SessionSummary};
