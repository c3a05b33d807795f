//! Session kind definitions.

use serde::{Deserialize, Serialize};

/// What runs inside a session's pseudo-terminal.
///
/// Every variant except [`SessionKind::Shell`] is an AI coding assistant CLI
/// launched with its unattended flag so it never blocks on confirmation
/// prompts inside the PTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Claude,
    Codex,
    Gemini,
    Opencode,
    Shell,
}

impl SessionKind {
    /// Get the canonical string name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Claude => "claude",
            SessionKind::Codex => "codex",
            SessionKind::Gemini => "gemini",
            SessionKind::Opencode => "opencode",
            SessionKind::Shell => "shell",
        }
    }

    /// Parse a session kind from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "claude" => Some(SessionKind::Claude),
            "codex" => Some(SessionKind::Codex),
            "gemini" => Some(SessionKind::Gemini),
            "opencode" => Some(SessionKind::Opencode),
            "shell" => Some(SessionKind::Shell),
            _ => None,
        }
    }

    /// Get all supported session kinds.
    pub fn all() -> &'static [SessionKind] {
        &[
            SessionKind::Claude,
            SessionKind::Codex,
            SessionKind::Gemini,
            SessionKind::Opencode,
            SessionKind::Shell,
        ]
    }

    /// Human-readable name, used for default session titles.
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionKind::Claude => "Claude",
            SessionKind::Codex => "Codex",
            SessionKind::Gemini => "Gemini",
            SessionKind::Opencode => "OpenCode",
            SessionKind::Shell => "Terminal",
        }
    }

    /// The executable that must be installed for this kind, if any.
    pub fn binary(&self) -> Option<&'static str> {
        match self {
            SessionKind::Shell => None,
            other => Some(other.as_str()),
        }
    }

    /// The fixed command line launched inside the login shell.
    ///
    /// Returns `None` for [`SessionKind::Shell`], which runs the login
    /// shell interactively instead.
    pub fn default_command(&self) -> Option<&'static str> {
        match self {
            SessionKind::Claude => Some("claude --dangerously-skip-permissions"),
            SessionKind::Codex => Some("codex --dangerously-bypass-approvals-and-sandbox"),
            SessionKind::Gemini => Some("gemini --yolo"),
            SessionKind::Opencode => Some("opencode"),
            SessionKind::Shell => None,
        }
    }

    pub fn is_shell(&self) -> bool {
        matches!(self, SessionKind::Shell)
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
