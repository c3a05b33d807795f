use std::path::PathBuf;

use clap::ArgMatches;
use serde::Serialize;
use tracing::{error, info};

use arbor_core::events;
use arbor_core::{Git, WorktreeAllocator, WorktreeEntry};

use super::{load_config_with_warning, resolve_cwd, runtime};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WorktreeListing {
    #[serde(flatten)]
    entry: WorktreeEntry,
    managed: bool,
}

pub(crate) fn handle_worktrees_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let git = Git::from_config(&load_config_with_warning());

    match matches.subcommand() {
        Some(("list", sub)) => handle_list(&git, sub),
        Some(("create", sub)) => handle_create(&git, sub),
        Some(("remove", sub)) => handle_remove(&git, sub),
        Some(("prune", sub)) => handle_prune(&git, sub),
        Some(("path", sub)) => handle_path(&git, sub),
        _ => Err("Unknown worktrees command".into()),
    }
}

fn report_failure<E: std::error::Error + 'static>(action: &str, e: E) -> Box<dyn std::error::Error> {
    eprintln!("Failed to {}: {}", action, e);
    error!(event = "cli.worktrees.command_failed", action = action, error = %e);
    events::log_app_error(&e);
    Box::new(e)
}

fn handle_list(git: &Git, matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let cwd = resolve_cwd(matches)?;
    let entries = runtime()?
        .block_on(git.list_worktrees(&cwd))
        .map_err(|e| report_failure("list worktrees", e))?;

    let main_root = entries.first().map(|e| e.path.clone());
    let listing: Vec<WorktreeListing> = entries
        .into_iter()
        .map(|entry| {
            let managed = main_root
                .as_ref()
                .is_some_and(|root| git.is_managed_path(root, &entry.path));
            WorktreeListing { entry, managed }
        })
        .collect();

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }
    if listing.is_empty() {
        println!("No worktrees found.");
        return Ok(());
    }
    for item in &listing {
        let branch = item
            .entry
            .branch
            .as_deref()
            .unwrap_or(if item.entry.is_bare { "(bare)" } else { "(detached)" });
        let marker = if item.managed { " [managed]" } else { "" };
        println!("{}  {}{}", item.entry.path.display(), branch, marker);
    }
    Ok(())
}

fn handle_create(git: &Git, matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let cwd = resolve_cwd(matches)?;
    let branch = matches
        .get_one::<String>("branch")
        .ok_or("Branch argument is required")?;
    // Without --existing the branch is created only when it is missing
    let new_branch = matches.get_flag("existing").then_some(false);

    info!(event = "cli.worktrees.create_started", branch = %branch, new_branch = ?new_branch);

    let allocator = WorktreeAllocator::new(git.clone());
    let path = runtime()?
        .block_on(allocator.create_worktree(&cwd, branch, new_branch))
        .map_err(|e| report_failure("create worktree", e))?;

    println!("{}", path.display());
    info!(event = "cli.worktrees.create_completed", path = %path.display());
    Ok(())
}

fn handle_remove(git: &Git, matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let cwd = resolve_cwd(matches)?;
    let path = matches
        .get_one::<PathBuf>("path")
        .ok_or("Path argument is required")?;
    let path = if path.is_absolute() {
        path.clone()
    } else {
        cwd.join(path)
    };
    let force = matches.get_flag("force");

    let allocator = WorktreeAllocator::new(git.clone());
    runtime()?
        .block_on(allocator.remove_worktree(&cwd, &path, force))
        .map_err(|e| report_failure("remove worktree", e))?;

    println!("Removed {}", path.display());
    Ok(())
}

fn handle_prune(git: &Git, matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let cwd = resolve_cwd(matches)?;
    runtime()?
        .block_on(async {
            let root = git.main_checkout_root(&cwd).await?;
            git.prune_worktrees(&root).await
        })
        .map_err(|e| report_failure("prune worktrees", e))?;
    println!("Pruned stale worktree entries.");
    Ok(())
}

fn handle_path(git: &Git, matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let cwd = resolve_cwd(matches)?;
    let branch = matches
        .get_one::<String>("branch")
        .ok_or("Branch argument is required")?;
    let path = runtime()?
        .block_on(async {
            let root = git.main_checkout_root(&cwd).await?;
            git.worktree_path_for(&root, branch)
        })
        .map_err(|e| report_failure("resolve worktree path", e))?;
    println!("{}", path.display());
    Ok(())
}
