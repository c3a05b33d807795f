use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::PtyError;

/// Smallest terminal we will ever configure.
pub const MIN_COLS: u16 = 10;
pub const MIN_ROWS: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtySize {
    pub cols: u16,
    pub rows: u16,
}

impl PtySize {
    /// A size with both dimensions raised to the minimums.
    pub fn clamped(cols: u16, rows: u16) -> Self {
        Self {
            cols: cols.max(MIN_COLS),
            rows: rows.max(MIN_ROWS),
        }
    }

    pub(crate) fn to_native(self) -> portable_pty::PtySize {
        portable_pty::PtySize {
            rows: self.rows,
            cols: self.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Exiting,
    Exited,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Running => "running",
            SessionStatus::Exiting => "exiting",
            SessionStatus::Exited => "exited",
        };
        write!(f, "{s}")
    }
}

/// Output and exit notifications, in the order the process produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyEvent {
    Data { session_id: String, chunk: Vec<u8> },
    Exit {
        session_id: String,
        exit_code: Option<i32>,
    },
}

impl PtyEvent {
    pub fn session_id(&self) -> &str {
        match self {
            PtyEvent::Data { session_id, .. } | PtyEvent::Exit { session_id, .. } => session_id,
        }
    }
}

/// Signals a session can be terminated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminateSignal {
    /// Default: ends interactive shells, which ignore `SIGTERM`.
    #[default]
    Hangup,
    Interrupt,
    Terminate,
    Kill,
}

impl FromStr for TerminateSignal {
    type Err = PtyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.strip_prefix("SIG").unwrap_or(&upper) {
            "HUP" => Ok(TerminateSignal::Hangup),
            "INT" => Ok(TerminateSignal::Interrupt),
            "TERM" => Ok(TerminateSignal::Terminate),
            "KILL" => Ok(TerminateSignal::Kill),
            _ => Err(PtyError::UnknownSignal {
                name: s.to_string(),
            }),
        }
    }
}
