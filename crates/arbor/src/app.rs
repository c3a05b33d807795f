use clap::{Arg, ArgAction, Command};

fn cwd_arg() -> Arg {
    Arg::new("cwd")
        .long("cwd")
        .short('C')
        .help("Directory to operate in (default: current directory)")
        .value_parser(clap::value_parser!(std::path::PathBuf))
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .help("Output in JSON format")
        .action(ArgAction::SetTrue)
}

pub fn build_cli() -> Command {
    Command::new("arbor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run AI coding agents in PTY sessions backed by git worktrees")
        .long_about("arbor runs AI coding assistant CLIs (or a plain shell) in pseudo-terminals and gives each session its own git worktree, so several sessions can work on different branches of one repository without clobbering each other's files.")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("serve")
                .about("Serve the session API as JSON lines over stdin/stdout")
        )
        .subcommand(
            Command::new("branches")
                .about("List local branches, marking the current one")
                .arg(cwd_arg())
                .arg(json_arg())
        )
        .subcommand(
            Command::new("worktrees")
                .about("Inspect and manage arbor-managed worktrees")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("list")
                        .about("List the repository's worktrees")
                        .arg(cwd_arg())
                        .arg(json_arg())
                )
                .subcommand(
                    Command::new("create")
                        .about("Create a managed worktree for a branch")
                        .arg(
                            Arg::new("branch")
                                .help("Branch to check out in the new worktree")
                                .required(true)
                                .index(1)
                        )
                        .arg(
                            Arg::new("existing")
                                .long("existing")
                                .help("Check out an existing branch instead of creating it")
                                .action(ArgAction::SetTrue)
                        )
                        .arg(cwd_arg())
                )
                .subcommand(
                    Command::new("remove")
                        .about("Remove a managed worktree")
                        .arg(
                            Arg::new("path")
                                .help("Worktree directory to remove")
                                .required(true)
                                .index(1)
                                .value_parser(clap::value_parser!(std::path::PathBuf))
                        )
                        .arg(
                            Arg::new("force")
                                .long("force")
                                .short('f')
                                .help("Remove even with uncommitted changes")
                                .action(ArgAction::SetTrue)
                        )
                        .arg(cwd_arg())
                )
                .subcommand(
                    Command::new("prune")
                        .about("Drop git records of worktrees whose directories are gone")
                        .arg(cwd_arg())
                )
                .subcommand(
                    Command::new("path")
                        .about("Print the directory a managed worktree for a branch would use")
                        .arg(
                            Arg::new("branch")
                                .help("Branch name")
                                .required(true)
                                .index(1)
                        )
                        .arg(cwd_arg())
                )
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_builds() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_serve_parses() {
        let matches = build_cli().try_get_matches_from(vec!["arbor", "serve"]).unwrap();
        assert_eq!(matches.subcommand_name(), Some("serve"));
        assert!(!matches.get_flag("verbose"));
    }

    #[test]
    fn test_verbose_is_global() {
        let matches = build_cli()
            .try_get_matches_from(vec!["arbor", "branches", "-v"])
            .unwrap();
        assert!(matches.get_flag("verbose"));
    }

    #[test]
    fn test_worktrees_create_args() {
        let matches = build_cli()
            .try_get_matches_from(vec![
                "arbor",
                "worktrees",
                "create",
                "feature/x",
                "--existing",
                "--cwd",
                "/tmp",
            ])
            .unwrap();
        let (_, worktrees) = matches.subcommand().unwrap();
        let (name, create) = worktrees.subcommand().unwrap();
        assert_eq!(name, "create");
        assert_eq!(create.get_one::<String>("branch").unwrap(), "feature/x");
        assert!(create.get_flag("existing"));
    }

    #[test]
    fn test_worktrees_requires_subcommand() {
        assert!(
            build_cli()
                .try_get_matches_from(vec!["arbor", "worktrees"])
                .is_err()
        );
    }

    #[test]
    fn test_remove_requires_path() {
        assert!(
            build_cli()
                .try_get_matches_from(vec!["arbor", "worktrees", "remove"])
                .is_err()
        );
    }
}
