//! CLI tool availability checks.
//!
//! The lifecycle controller asks a [`ToolChecker`] whether an assistant's
//! CLI is installed before it spawns anything. The default implementation
//! looks on `PATH` first and then asks the user's login shell, because GUI
//! launches often inherit a PATH without the entries added by rc files.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::types::SessionKind;

/// Answers "is the CLI behind this session kind installed?".
#[async_trait]
pub trait ToolChecker: Send + Sync {
    async fn is_installed(&self, kind: SessionKind) -> bool;
}

/// Default checker: `which` lookup, then `command -v` through the login shell.
///
/// Results are cached per kind for the lifetime of the checker; call
/// [`PathToolChecker::invalidate`] after installing a tool.
pub struct PathToolChecker {
    shell: PathBuf,
    probe_timeout: Duration,
    cache: Mutex<HashMap<SessionKind, bool>>,
}

impl PathToolChecker {
    pub fn new(shell: PathBuf, probe_timeout: Duration) -> Self {
        Self {
            shell,
            probe_timeout,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Forget every cached result.
    pub fn invalidate(&self) {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        debug!(event = "core.agents.tool_cache_invalidated");
    }

    fn cached(&self, kind: SessionKind) -> Option<bool> {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .copied()
    }

    fn remember(&self, kind: SessionKind, installed: bool) {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind, installed);
    }

    async fn probe_login_shell(&self, binary: &str) -> bool {
        let mut cmd = tokio::process::Command::new(&self.shell);
        cmd.arg("-l")
            .arg("-c")
            .arg("command -v \"$0\"")
            .arg(binary)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(self.probe_timeout, cmd.status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                warn!(
                    event = "core.agents.shell_probe_failed",
                    binary = binary,
                    shell = %self.shell.display(),
                    error = %e
                );
                false
            }
            Err(_) => {
                warn!(
                    event = "core.agents.shell_probe_timed_out",
                    binary = binary,
                    timeout_ms = self.probe_timeout.as_millis() as u64
                );
                false
            }
        }
    }
}

#[async_trait]
impl ToolChecker for PathToolChecker {
    async fn is_installed(&self, kind: SessionKind) -> bool {
        let Some(binary) = kind.binary() else {
            return true;
        };

        if let Some(installed) = self.cached(kind) {
            return installed;
        }

        let installed = if which::which(binary).is_ok() {
            true
        } else {
            self.probe_login_shell(binary).await
        };

        info!(
            event = "core.agents.tool_check_completed",
            kind = %kind,
            binary = binary,
            installed = installed
        );

        self.remember(kind, installed);
        installed
    }
}
