//! Configuration type definitions.
//!
//! These types are deserialized from TOML config files. Every field is
//! optional so a project config can override a single key of the user
//! config; resolved values come from the accessor methods on
//! [`ArborConfig`].
//!
//! # Example Configuration
//!
//! ```toml
//! [git]
//! timeout_secs = 10
//!
//! [worktrees]
//! directory = ".arbor/worktrees"
//!
//! [sessions]
//! shell = "/bin/zsh"
//! exit_timeout_secs = 5
//!
//! [tools.claude]
//! command = "claude --dangerously-skip-permissions --verbose"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main configuration loaded from TOML config files.
///
/// Loaded from, in increasing priority:
/// 1. User config: `~/.arbor/config.toml`
/// 2. Project config: `./.arbor/config.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ArborConfig {
    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub worktrees: WorktreeConfig,

    #[serde(default)]
    pub sessions: SessionConfig,

    /// Per-tool launch overrides, keyed by session kind name.
    #[serde(default)]
    pub tools: HashMap<String, ToolSettings>,
}

/// How the external `git` binary is invoked.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GitConfig {
    /// Executable name or path. Default: `git`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,

    /// Hard timeout per git invocation. Default: 10 seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Upper bound on captured stdout/stderr per invocation. Default: 8 MiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_bytes: Option<usize>,
}

/// Where managed worktrees and their metadata live, relative to the repo root.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WorktreeConfig {
    /// Default: `.arbor/worktrees`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,

    /// Default: `.arbor/worktrees.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_file: Option<String>,
}

/// Session spawn and disposal settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SessionConfig {
    /// Login shell used to launch every session. Default: `$SHELL`, then `/bin/sh`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<PathBuf>,

    /// How long dispose waits for the process to exit. Default: 5 seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_timeout_secs: Option<u64>,

    /// Pause after exit before the worktree safety check. Default: 500 ms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_grace_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_cols: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_rows: Option<u16>,
}

/// Per-tool settings from `[tools.<kind>]`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ToolSettings {
    /// Full command line run through the login shell instead of the built-in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}
