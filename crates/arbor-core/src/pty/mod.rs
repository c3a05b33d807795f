//! Pseudo-terminal sessions.
//!
//! A [`PtySession`] owns one child process for its whole running lifetime.
//! Output and exit are pushed through an unbounded channel of [`PtyEvent`]s;
//! the receiving side decides how to fan them out.

pub mod errors;
pub mod session;
pub mod types;

pub use errors::PtyError;
pub use session::{PtySession, SpawnOptions};
pub use types::{MIN_COLS, MIN_ROWS, PtyEvent, PtySize, SessionStatus, TerminateSignal};
