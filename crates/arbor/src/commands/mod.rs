use std::path::PathBuf;

use clap::ArgMatches;
use tracing::{error, warn};

use arbor_core::ArborConfig;
use arbor_core::events;

mod branches;
mod serve;
mod worktrees;

pub fn run_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    events::log_app_startup();

    match matches.subcommand() {
        Some(("serve", sub_matches)) => serve::handle_serve_command(sub_matches),
        Some(("branches", sub_matches)) => branches::handle_branches_command(sub_matches),
        Some(("worktrees", sub_matches)) => worktrees::handle_worktrees_command(sub_matches),
        _ => {
            error!(event = "cli.command_unknown");
            Err("Unknown command".into())
        }
    }
}

/// Load configuration, falling back to defaults with a warning on errors.
pub(crate) fn load_config_with_warning() -> ArborConfig {
    match ArborConfig::load_hierarchy() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Could not load config: {}. Using defaults.\n\
                 Tip: Check ~/.arbor/config.toml and ./.arbor/config.toml for syntax errors.",
                e
            );
            warn!(
                event = "cli.config.load_failed",
                error = %e,
                "Config load failed, using defaults"
            );
            ArborConfig::default()
        }
    }
}

/// `--cwd` if given, otherwise the process working directory.
pub(crate) fn resolve_cwd(matches: &ArgMatches) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match matches.get_one::<PathBuf>("cwd") {
        Some(cwd) => Ok(cwd.clone()),
        None => Ok(std::env::current_dir()?),
    }
}

pub(crate) fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}
