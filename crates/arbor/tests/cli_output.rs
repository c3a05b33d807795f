//! Integration tests for CLI output behavior
//!
//! The default behavior is quiet (no logs). Use -v/--verbose to enable logs.

use std::path::Path;
use std::process::{Command, Output};

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to execute git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn init_repo(dir: &Path) {
    git(dir, &["init", "-b", "main"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "Test"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    std::fs::write(dir.join("README.md"), "hello\n").unwrap();
    git(dir, &["add", "README.md"]);
    git(dir, &["commit", "-m", "init"]);
}

fn run_arbor(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_arbor"))
        .args(args)
        .output()
        .expect("Failed to execute arbor")
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{} failed with exit code {:?}. stderr: {}",
        what,
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Verify that stdout contains only user-facing output (no JSON logs)
/// and that stderr carries no INFO logs by default
#[test]
fn test_branches_stdout_is_clean() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());

    let cwd = repo.path().to_string_lossy().to_string();
    let output = run_arbor(&["branches", "--cwd", &cwd]);
    assert_success(&output, "arbor branches");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(
        !stdout.contains(r#""event":"#),
        "stdout should not contain JSON logs, got: {}",
        stdout
    );
    assert!(stdout.contains("* main"), "expected current branch marker, got: {}", stdout);
    assert!(
        !stderr.contains(r#""level":"INFO""#),
        "Default mode should not emit INFO logs, got: {}",
        stderr
    );
}

/// Verify that -v enables logs on stderr while stdout stays clean
#[test]
fn test_verbose_logs_go_to_stderr() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());

    let cwd = repo.path().to_string_lossy().to_string();
    let output = run_arbor(&["-v", "branches", "--cwd", &cwd]);
    assert_success(&output, "arbor -v branches");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(
        stderr.contains(r#""level":"INFO""#),
        "Verbose mode should emit INFO logs, got: {}",
        stderr
    );
    for line in stdout.lines() {
        assert!(
            !line.trim_start().starts_with('{'),
            "stdout should not contain JSON lines, got: {}",
            line
        );
    }
}

#[test]
fn test_branches_json_output() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());
    git(repo.path(), &["branch", "feature-a"]);

    let cwd = repo.path().to_string_lossy().to_string();
    let output = run_arbor(&["branches", "--cwd", &cwd, "--json"]);
    assert_success(&output, "arbor branches --json");

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    assert_eq!(value["current"], "main");
    let branches = value["branches"].as_array().unwrap();
    assert!(branches.contains(&serde_json::json!("feature-a")));
    assert!(branches.contains(&serde_json::json!("main")));
}

#[test]
fn test_branches_outside_repo_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cwd = dir.path().to_string_lossy().to_string();
    let output = run_arbor(&["branches", "--cwd", &cwd]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Failed to list branches: Not a git repository"),
        "expected a user-facing error, got: {}",
        stderr
    );
}

#[test]
fn test_worktree_create_checks_out_existing_branch() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());
    git(repo.path(), &["branch", "already-there"]);
    let cwd = repo.path().to_string_lossy().to_string();

    let output = run_arbor(&["worktrees", "create", "already-there", "--cwd", &cwd]);
    assert_success(&output, "arbor worktrees create (existing branch)");
    let created = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert!(Path::new(&created).join("README.md").exists());
}

#[test]
fn test_worktree_path_is_sanitized() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());

    let cwd = repo.path().to_string_lossy().to_string();
    let output = run_arbor(&["worktrees", "path", "Feature/Login", "--cwd", &cwd]);
    assert_success(&output, "arbor worktrees path");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let path = stdout.trim();
    assert!(
        path.ends_with(".arbor/worktrees/feature-login"),
        "unexpected path: {}",
        path
    );
}

#[test]
fn test_worktree_create_list_remove() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());
    let cwd = repo.path().to_string_lossy().to_string();

    let output = run_arbor(&["worktrees", "create", "feature-b", "--cwd", &cwd]);
    assert_success(&output, "arbor worktrees create");
    let created = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert!(Path::new(&created).is_dir());

    let output = run_arbor(&["worktrees", "list", "--cwd", &cwd, "--json"]);
    assert_success(&output, "arbor worktrees list");
    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = listed.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    let managed: Vec<_> = entries
        .iter()
        .filter(|e| e["managed"] == serde_json::json!(true))
        .collect();
    assert_eq!(managed.len(), 1);
    assert_eq!(managed[0]["branch"], "feature-b");

    let output = run_arbor(&["worktrees", "remove", &created, "--cwd", &cwd]);
    assert_success(&output, "arbor worktrees remove");
    assert!(!Path::new(&created).exists());
}

#[test]
fn test_remove_unmanaged_path_is_refused() {
    let repo = tempfile::tempdir().unwrap();
    init_repo(repo.path());
    let cwd = repo.path().to_string_lossy().to_string();

    let output = run_arbor(&["worktrees", "remove", &cwd, "--cwd", &cwd]);
    assert!(!output.status.success());
    assert!(repo.path().join("README.md").exists());
}
