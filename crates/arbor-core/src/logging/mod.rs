use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging with optional verbose mode.
///
/// Logs are JSON lines on stderr; stdout stays reserved for command output
/// and protocol frames. When `verbose` is false only error-level events are
/// emitted. `RUST_LOG` directives are honored on top of the default.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "error" };

    let mut filter = EnvFilter::from_default_env();
    for directive in [format!("arbor={level}"), format!("arbor_core={level}")] {
        match directive.parse() {
            Ok(parsed) => filter = filter.add_directive(parsed),
            Err(e) => eprintln!("Ignoring invalid log directive '{directive}': {e}"),
        }
    }

    // try_init: a second call (tests, embedding) must not panic
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .with_span_list(false),
        )
        .with(filter)
        .try_init();
}
