use clap::ArgMatches;
use serde::Serialize;
use tracing::{error, info};

use arbor_core::Git;
use arbor_core::events;

use super::{load_config_with_warning, resolve_cwd, runtime};

#[derive(Serialize)]
struct BranchListing {
    current: Option<String>,
    branches: Vec<String>,
}

pub(crate) fn handle_branches_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let cwd = resolve_cwd(matches)?;
    let git = Git::from_config(&load_config_with_warning());

    info!(event = "cli.branches_started", cwd = %cwd.display());

    let listing = runtime()?.block_on(async {
        // Outside a repository the listing would just be empty; say so instead
        let root = git.repo_root(&cwd).await?;
        let current = git.current_branch(&root).await;
        git.all_branches(&root)
            .await
            .map(|branches| BranchListing { current, branches })
    });

    match listing {
        Ok(listing) => {
            if matches.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else if listing.branches.is_empty() {
                println!("No branches found.");
            } else {
                for branch in &listing.branches {
                    let marker = if listing.current.as_deref() == Some(branch.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    println!("{} {}", marker, branch);
                }
            }
            info!(
                event = "cli.branches_completed",
                count = listing.branches.len()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to list branches: {}", e);
            error!(event = "cli.branches_failed", error = %e);
            events::log_app_error(&e);
            Err(Box::new(e))
        }
    }
}
