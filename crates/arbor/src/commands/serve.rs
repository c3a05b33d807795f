use std::sync::Arc;
use std::time::Duration;

use clap::ArgMatches;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use arbor_core::events;
use arbor_core::{ArborConfig, PathToolChecker, PtyEvent, SessionController};

use super::{load_config_with_warning, runtime};
use crate::protocol::{self, Outbound};

const TOOL_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// How long in-flight requests may run after input ends.
const REQUEST_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
/// How long trailing session output may take to reach stdout.
const EVENT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) fn handle_serve_command(_matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_with_warning();
    info!(event = "cli.serve.started");

    let rt = runtime()?;
    let result = rt.block_on(serve(config));
    // The stdin reader runs on a blocking thread that may still be parked
    // in read(); do not wait for it.
    rt.shutdown_timeout(Duration::from_millis(100));

    match result {
        Ok(()) => {
            events::log_app_shutdown();
            info!(event = "cli.serve.completed");
            Ok(())
        }
        Err(e) => {
            error!(event = "cli.serve.failed", error = %e);
            events::log_app_error(&e);
            Err(Box::new(e))
        }
    }
}

async fn serve(config: ArborConfig) -> std::io::Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<PtyEvent>();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Outbound>();

    let tools = Arc::new(PathToolChecker::new(config.shell(), TOOL_PROBE_TIMEOUT));
    let controller = Arc::new(SessionController::new(config, tools, event_tx));
    let token = CancellationToken::new();

    let writer = tokio::spawn(write_outbound(out_rx));
    let mut forwarder = tokio::spawn(forward_events(event_rx, out_tx.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut requests = JoinSet::new();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match protocol::parse_request(&line) {
                        Ok(request) => {
                            let controller = controller.clone();
                            let out = out_tx.clone();
                            let token = token.clone();
                            requests.spawn(async move {
                                debug!(
                                    event = "cli.serve.request_received",
                                    method = %request.method
                                );
                                let reply = match protocol::dispatch(
                                    &controller,
                                    &request.method,
                                    request.params,
                                    &token,
                                )
                                .await
                                {
                                    Ok(result) => Outbound::Result {
                                        id: request.id,
                                        result,
                                    },
                                    Err(e) => {
                                        warn!(
                                            event = "cli.serve.request_failed",
                                            method = %request.method,
                                            code = %e.code,
                                            message = %e.message
                                        );
                                        Outbound::failure(Some(request.id), e)
                                    }
                                };
                                // Receiver gone means stdout is closed; nothing to report to.
                                let _ = out.send(reply);
                            });
                        }
                        Err((id, e)) => {
                            warn!(event = "cli.serve.request_rejected", code = %e.code, message = %e.message);
                            let _ = out_tx.send(Outbound::failure(id, e));
                        }
                    }
                }
                Ok(None) => {
                    info!(event = "cli.serve.input_closed");
                    break;
                }
                Err(e) => {
                    warn!(event = "cli.serve.read_failed", error = %e);
                    break;
                }
            },
            Some(joined) = requests.join_next(), if !requests.is_empty() => {
                if let Err(e) = joined {
                    error!(event = "cli.serve.request_panicked", error = %e);
                }
            }
            _ = token.cancelled() => {
                info!(event = "cli.serve.shutdown_started");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!(event = "cli.serve.interrupted");
                break;
            }
        }
    }

    token.cancel();

    let drained = tokio::time::timeout(REQUEST_DRAIN_TIMEOUT, async {
        while requests.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(event = "cli.serve.requests_abandoned", remaining = requests.len());
        requests.abort_all();
    }

    let outcomes = controller.shutdown().await;
    debug!(event = "cli.serve.sessions_disposed", count = outcomes.len());

    // The forwarder ends once every session's reader has let go of its
    // sender; the controller holds the last one.
    drop(controller);
    if tokio::time::timeout(EVENT_DRAIN_TIMEOUT, &mut forwarder)
        .await
        .is_err()
    {
        warn!(event = "cli.serve.event_drain_timeout");
        forwarder.abort();
    }

    drop(out_tx);
    match writer.await {
        Ok(result) => result,
        Err(e) => {
            error!(event = "cli.serve.writer_panicked", error = %e);
            Ok(())
        }
    }
}

async fn forward_events(
    mut events: mpsc::UnboundedReceiver<PtyEvent>,
    out: mpsc::UnboundedSender<Outbound>,
) {
    while let Some(event) = events.recv().await {
        if out.send(Outbound::from(event)).is_err() {
            break;
        }
    }
    debug!(event = "cli.serve.forwarder_stopped");
}

/// The only task that touches stdout.
async fn write_outbound(mut outbound: mpsc::UnboundedReceiver<Outbound>) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(message) = outbound.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        if let Err(e) = async {
            stdout.write_all(&line).await?;
            stdout.flush().await
        }
        .await
        {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                warn!(event = "cli.serve.stdout_closed");
                return Ok(());
            }
            return Err(e);
        }
    }
    Ok(())
}
