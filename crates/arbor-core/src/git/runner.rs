//! Bounded execution of the external `git` binary.
//!
//! Arguments are always passed as a vector straight to the executable;
//! nothing is ever joined into a shell string. Each invocation carries a
//! hard timeout and a cap on captured output.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use super::errors::GitError;
use crate::config::ArborConfig;

/// Runs one fixed executable with explicit argument lists.
#[derive(Debug, Clone)]
pub struct GitRunner {
    program: String,
    timeout: Duration,
    max_output_bytes: usize,
}

impl GitRunner {
    pub fn new(program: impl Into<String>, timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            program: program.into(),
            timeout,
            max_output_bytes,
        }
    }

    pub fn from_config(config: &ArborConfig) -> Self {
        Self::new(
            config.git_program(),
            config.git_timeout(),
            config.git_max_output_bytes(),
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the program in `cwd` and return its trimmed stdout.
    ///
    /// # Errors
    ///
    /// `GitError::CommandFailed` on spawn failure, timeout, oversized
    /// output or non-zero exit. The message carries trimmed stderr when
    /// the process produced any.
    pub async fn run(&self, cwd: &Path, args: &[&str]) -> Result<String, GitError> {
        let rendered = args.join(" ");
        debug!(
            event = "core.git.command_started",
            program = %self.program,
            args = %rendered,
            cwd = %cwd.display()
        );

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| GitError::CommandFailed {
            message: format!(
                "failed to spawn '{}' in {}: {}",
                self.program,
                cwd.display(),
                e
            ),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.max_output_bytes;

        let collect = async {
            let (out, err) = tokio::try_join!(read_bounded(stdout, limit), read_bounded(stderr, limit))?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out, err))
        };

        // On timeout the child is dropped here and killed via kill_on_drop.
        let (status, out, err) = match tokio::time::timeout(self.timeout, collect).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(
                    event = "core.git.command_io_failed",
                    args = %rendered,
                    error = %e
                );
                return Err(GitError::CommandFailed {
                    message: format!("{} {}: {}", self.program, rendered, e),
                });
            }
            Err(_) => {
                warn!(
                    event = "core.git.command_timed_out",
                    args = %rendered,
                    timeout_ms = self.timeout.as_millis() as u64
                );
                return Err(GitError::CommandFailed {
                    message: format!(
                        "{} {} timed out after {}ms",
                        self.program,
                        rendered,
                        self.timeout.as_millis()
                    ),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&out).trim().to_string();
        let stderr = String::from_utf8_lossy(&err).trim().to_string();

        if status.success() {
            debug!(event = "core.git.command_completed", args = %rendered);
            return Ok(stdout);
        }

        debug!(
            event = "core.git.command_failed",
            args = %rendered,
            code = ?status.code(),
            stderr = %stderr
        );

        let message = if stderr.is_empty() {
            format!(
                "{} {} exited with status {}",
                self.program,
                rendered,
                status.code().map_or("signal".to_string(), |c| c.to_string())
            )
        } else {
            stderr
        };
        Err(GitError::CommandFailed { message })
    }
}

/// Read a pipe to the end, failing once more than `limit` bytes arrive.
async fn read_bounded<R: AsyncRead + Unpin>(
    reader: Option<R>,
    limit: usize,
) -> std::io::Result<Vec<u8>> {
    let Some(reader) = reader else {
        return Ok(Vec::new());
    };
    let mut buf = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut buf)
        .await?;
    if buf.len() > limit {
        return Err(std::io::Error::other(format!(
            "output exceeded {limit} bytes"
        )));
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(program: &str) -> GitRunner {
        GitRunner::new(program, Duration::from_secs(5), 1024)
    }

    #[tokio::test]
    async fn test_run_returns_trimmed_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let out = runner("git").run(dir.path(), &["--version"]).await.unwrap();
        assert!(out.starts_with("git version"));
        assert!(!out.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner("git")
            .run(dir.path(), &["rev-parse", "--show-toplevel"])
            .await
            .unwrap_err();
        assert!(err.is_not_a_repo(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_command_failed() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner("/nonexistent/git-binary")
            .run(dir.path(), &["status"])
            .await
            .unwrap_err();
        match err {
            GitError::CommandFailed { message } => assert!(message.contains("failed to spawn")),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_command_failed() {
        let dir = tempfile::tempdir().unwrap();
        let slow = GitRunner::new("sleep", Duration::from_millis(100), 1024);
        let err = slow.run(dir.path(), &["5"]).await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "got: {err}");
    }

    #[tokio::test]
    async fn test_oversized_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tiny = GitRunner::new("git", Duration::from_secs(5), 4);
        let err = tiny.run(dir.path(), &["--version"]).await.unwrap_err();
        assert!(err.to_string().contains("exceeded"), "got: {err}");
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_interpreted() {
        let dir = tempfile::tempdir().unwrap();
        let echo = GitRunner::new("echo", Duration::from_secs(5), 1024);
        let out = echo
            .run(dir.path(), &["$(touch pwned)", "; touch pwned2"])
            .await
            .unwrap();
        assert_eq!(out, "$(touch pwned) ; touch pwned2");
        assert!(!dir.path().join("pwned").exists());
        assert!(!dir.path().join("pwned2").exists());
    }
}
