use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, native_pty_system};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::errors::PtyError;
use super::types::{PtyEvent, PtySize, SessionStatus, TerminateSignal};

/// How long the exit notification waits for buffered output after the child is gone.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// What to run inside a new pseudo-terminal.
#[derive(Debug, Clone)]
pub struct SpawnOptions {
    pub session_id: String,
    pub shell: PathBuf,
    /// Run `shell -l -c <command>`; `None` starts an interactive login shell.
    pub command: Option<String>,
    pub cwd: PathBuf,
    pub size: PtySize,
    pub env: Vec<(String, String)>,
}

struct Lifecycle {
    status: SessionStatus,
    exit_code: Option<i32>,
}

/// State shared with the I/O threads.
struct Shared {
    session_id: String,
    lifecycle: Mutex<Lifecycle>,
    exited_tx: watch::Sender<bool>,
    events: mpsc::UnboundedSender<PtyEvent>,
}

impl Shared {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move to `exited` and emit the exit event. Returns `false` if already exited.
    fn mark_exited(&self, exit_code: Option<i32>) -> bool {
        {
            let mut lifecycle = self.lifecycle();
            if lifecycle.status == SessionStatus::Exited {
                return false;
            }
            lifecycle.status = SessionStatus::Exited;
            lifecycle.exit_code = exit_code;
        }

        info!(
            event = "core.pty.exited",
            session_id = %self.session_id,
            exit_code = ?exit_code
        );
        if self
            .events
            .send(PtyEvent::Exit {
                session_id: self.session_id.clone(),
                exit_code,
            })
            .is_err()
        {
            debug!(event = "core.pty.exit_event_dropped", session_id = %self.session_id);
        }
        self.exited_tx.send_replace(true);
        true
    }
}

/// One child process attached to a pseudo-terminal.
///
/// Output is forwarded as [`PtyEvent::Data`] chunks and the process end as
/// exactly one [`PtyEvent::Exit`], always after the last data chunk.
pub struct PtySession {
    shared: Arc<Shared>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    pid: Option<u32>,
    size: Mutex<PtySize>,
}

impl std::fmt::Debug for PtySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtySession")
            .field("session_id", &self.shared.session_id)
            .field("pid", &self.pid)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl PtySession {
    /// Open a pseudo-terminal and start the login shell in it.
    pub fn spawn(
        options: SpawnOptions,
        events: mpsc::UnboundedSender<PtyEvent>,
    ) -> Result<Self, PtyError> {
        let size = PtySize::clamped(options.size.cols, options.size.rows);
        let pair = native_pty_system()
            .openpty(size.to_native())
            .map_err(|e| PtyError::OpenFailed {
                message: e.to_string(),
            })?;

        let mut cmd = CommandBuilder::new(&options.shell);
        cmd.arg("-l");
        if let Some(command) = &options.command {
            cmd.arg("-c");
            cmd.arg(command);
        }
        cmd.cwd(&options.cwd);
        cmd.env("TERM", "xterm-256color");
        cmd.env("COLORTERM", "truecolor");
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        info!(
            event = "core.pty.spawn_started",
            session_id = %options.session_id,
            shell = %options.shell.display(),
            command = ?options.command,
            cwd = %options.cwd.display(),
            cols = size.cols,
            rows = size.rows
        );

        let spawn_failed = |message: String| PtyError::SpawnFailed {
            program: options.shell.display().to_string(),
            message,
        };

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| spawn_failed(e.to_string()))?;
        // The reader only sees EOF once no slave handle is left open here.
        drop(pair.slave);

        let pid = child.process_id();
        let killer = child.clone_killer();

        let handles = pair
            .master
            .try_clone_reader()
            .and_then(|reader| pair.master.take_writer().map(|writer| (reader, writer)));
        let (reader, writer) = match handles {
            Ok(handles) => handles,
            Err(e) => {
                if let Err(kill_err) = child.kill() {
                    error!(
                        event = "core.pty.spawn_cleanup_failed",
                        session_id = %options.session_id,
                        error = %kill_err
                    );
                }
                return Err(spawn_failed(format!("pty handles: {e}")));
            }
        };

        let (exited_tx, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            session_id: options.session_id.clone(),
            lifecycle: Mutex::new(Lifecycle {
                status: SessionStatus::Running,
                exit_code: None,
            }),
            exited_tx,
            events,
        });

        let (drained_tx, drained_rx) = std_mpsc::channel();
        spawn_reader(Arc::clone(&shared), reader, drained_tx)
            .and_then(|_| spawn_waiter(Arc::clone(&shared), child, drained_rx))
            .map_err(|e| spawn_failed(format!("io thread: {e}")))?;

        info!(
            event = "core.pty.spawn_completed",
            session_id = %options.session_id,
            pid = ?pid
        );

        Ok(Self {
            shared,
            master: Mutex::new(pair.master),
            writer: Mutex::new(writer),
            killer: Mutex::new(killer),
            pid,
            size: Mutex::new(size),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.lifecycle().status
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.shared.lifecycle().exit_code
    }

    pub fn size(&self) -> PtySize {
        *lock(&self.size)
    }

    /// Forward input to the child. A no-op unless the session is running.
    pub fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        if self.status() != SessionStatus::Running {
            debug!(
                event = "core.pty.write_ignored",
                session_id = %self.shared.session_id,
                bytes = data.len()
            );
            return Ok(());
        }

        let mut writer = lock(&self.writer);
        let result = writer.write_all(data).and_then(|_| writer.flush());
        match result {
            Ok(()) => Ok(()),
            // Lost the race with process exit.
            Err(_) if self.status() != SessionStatus::Running => Ok(()),
            Err(e) => Err(PtyError::WriteFailed {
                message: e.to_string(),
            }),
        }
    }

    /// Resize, clamped to the minimum size. Failures are logged and ignored.
    pub fn resize(&self, cols: u16, rows: u16) {
        if self.status() != SessionStatus::Running {
            return;
        }
        let size = PtySize::clamped(cols, rows);
        match lock(&self.master).resize(size.to_native()) {
            Ok(()) => {
                *lock(&self.size) = size;
                debug!(
                    event = "core.pty.resize_completed",
                    session_id = %self.shared.session_id,
                    cols = size.cols,
                    rows = size.rows
                );
            }
            Err(e) => debug!(
                event = "core.pty.resize_failed",
                session_id = %self.shared.session_id,
                error = %e
            ),
        }
    }

    /// Ask the process to stop. Only the first call while running does anything.
    ///
    /// If the signal cannot be delivered the session is marked exited with
    /// code -1 straight away, even though the process may still be alive.
    pub fn terminate(&self, signal: Option<TerminateSignal>) {
        self.terminate_with(signal, |signal| self.send_signal(signal));
    }

    /// `terminate` with the signal delivery supplied by the caller.
    fn terminate_with(
        &self,
        signal: Option<TerminateSignal>,
        deliver: impl FnOnce(TerminateSignal) -> std::io::Result<()>,
    ) {
        {
            let mut lifecycle = self.shared.lifecycle();
            if lifecycle.status != SessionStatus::Running {
                return;
            }
            lifecycle.status = SessionStatus::Exiting;
        }

        let signal = signal.unwrap_or_default();
        info!(
            event = "core.pty.terminate_started",
            session_id = %self.shared.session_id,
            pid = ?self.pid,
            signal = ?signal
        );

        if let Err(e) = deliver(signal) {
            warn!(
                event = "core.pty.terminate_failed",
                session_id = %self.shared.session_id,
                error = %e,
                message = "Marking session exited without confirmation"
            );
            self.shared.mark_exited(Some(-1));
        }
    }

    #[cfg(unix)]
    fn send_signal(&self, signal: TerminateSignal) -> std::io::Result<()> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return lock(&self.killer).kill();
        };
        let signal = match signal {
            TerminateSignal::Hangup => Signal::SIGHUP,
            TerminateSignal::Interrupt => Signal::SIGINT,
            TerminateSignal::Terminate => Signal::SIGTERM,
            TerminateSignal::Kill => Signal::SIGKILL,
        };
        kill(Pid::from_raw(pid as i32), signal).map_err(std::io::Error::from)
    }

    #[cfg(not(unix))]
    fn send_signal(&self, _signal: TerminateSignal) -> std::io::Result<()> {
        lock(&self.killer).kill()
    }

    /// Wait until the session has exited. Returns `false` on timeout.
    pub async fn wait_exited(&self, timeout: Duration) -> bool {
        let mut rx = self.shared.exited_tx.subscribe();
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|exited| *exited)).await,
            Ok(Ok(_))
        )
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn spawn_reader(
    shared: Arc<Shared>,
    mut reader: Box<dyn Read + Send>,
    drained_tx: std_mpsc::Sender<()>,
) -> std::io::Result<()> {
    thread::Builder::new()
        .name(format!("arbor-pty-read-{}", shared.session_id))
        .spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        // Keep draining even with no listener so the child never blocks.
                        let _ = shared.events.send(PtyEvent::Data {
                            session_id: shared.session_id.clone(),
                            chunk: buf[..n].to_vec(),
                        });
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        // EIO is the normal end-of-stream on Linux.
                        debug!(
                            event = "core.pty.reader_closed",
                            session_id = %shared.session_id,
                            error = %e
                        );
                        break;
                    }
                }
            }
            let _ = drained_tx.send(());
        })
        .map(|_| ())
}

fn spawn_waiter(
    shared: Arc<Shared>,
    mut child: Box<dyn Child + Send + Sync>,
    drained_rx: std_mpsc::Receiver<()>,
) -> std::io::Result<()> {
    thread::Builder::new()
        .name(format!("arbor-pty-wait-{}", shared.session_id))
        .spawn(move || {
            let exit_code = match child.wait() {
                Ok(status) => i32::try_from(status.exit_code()).ok(),
                Err(e) => {
                    warn!(
                        event = "core.pty.wait_failed",
                        session_id = %shared.session_id,
                        error = %e
                    );
                    None
                }
            };
            if drained_rx.recv_timeout(READER_DRAIN_TIMEOUT).is_err() {
                debug!(
                    event = "core.pty.reader_drain_timeout",
                    session_id = %shared.session_id
                );
            }
            shared.mark_exited(exit_code);
        })
        .map(|_| ())
}
