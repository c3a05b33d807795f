//! Pure helpers for git output parsing and managed-path arithmetic.

use std::path::{Component, Path, PathBuf};

use super::types::WorktreeEntry;

/// Map a branch name to a single directory name.
///
/// `/` becomes `-`, anything outside `[A-Za-z0-9-_]` becomes `_`, and the
/// result is lowercased. Deterministic but not collision-free:
/// `Feature/x` and `feature-x` share a directory.
pub fn sanitize_for_path(branch: &str) -> String {
    branch
        .chars()
        .map(|c| match c {
            '/' => '-',
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_lowercase()
}

/// Branches that always run in the main checkout.
pub fn is_primary_branch(branch: &str) -> bool {
    matches!(branch, "main" | "master")
}

/// Resolve `.` and `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize as much of `path` as exists, then append the rest lexically.
///
/// Symlinked temp dirs (macOS `/var` → `/private/var`) would otherwise make
/// git-reported paths and caller paths disagree.
pub fn resolve_path(path: &Path) -> PathBuf {
    let normalized = normalize_lexically(path);
    if let Ok(canonical) = normalized.canonicalize() {
        return canonical;
    }
    let mut existing = normalized.clone();
    let mut tail = Vec::new();
    while let Some(name) = existing.file_name().map(|n| n.to_os_string()) {
        existing.pop();
        tail.push(name);
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            for part in tail.iter().rev() {
                resolved.push(part);
            }
            return resolved;
        }
    }
    normalized
}

/// True when `candidate` lies strictly below `root` (never `root` itself).
pub fn is_strict_descendant(root: &Path, candidate: &Path) -> bool {
    let root = resolve_path(root);
    let candidate = resolve_path(candidate);
    candidate != root && candidate.starts_with(&root)
}

/// Parse `git for-each-ref --format=%(refname:short)` output.
pub fn parse_branch_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `git worktree list --porcelain`.
///
/// Blocks are separated by blank lines and start with `worktree <path>`;
/// `HEAD <sha>`, `branch refs/heads/<name>`, `bare`, `detached`, `locked`
/// and `prunable` lines annotate the current block. Unknown lines are
/// ignored so newer git versions do not break parsing.
pub fn parse_worktree_porcelain(output: &str) -> Vec<WorktreeEntry> {
    let mut entries = Vec::new();
    let mut current: Option<WorktreeEntry> = None;

    for line in output.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            continue;
        }

        let (key, value) = match line.split_once(' ') {
            Some((key, value)) => (key, Some(value)),
            None => (line, None),
        };

        if key == "worktree" {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            if let Some(path) = value {
                current = Some(WorktreeEntry::new(PathBuf::from(path)));
            }
            continue;
        }

        let Some(entry) = current.as_mut() else {
            continue;
        };
        match key {
            "HEAD" => entry.head = value.map(str::to_string),
            "branch" => {
                entry.branch = value.map(|r| r.strip_prefix("refs/heads/").unwrap_or(r).to_string())
            }
            "bare" => entry.is_bare = true,
            "detached" => entry.is_detached = true,
            "locked" => entry.is_locked = true,
            "prunable" => entry.is_prunable = true,
            _ => {}
        }
    }

    if let Some(entry) = current {
        entries.push(entry);
    }
    entries
}

/// The most specific (longest path) worktree containing `dir`.
pub fn find_containing_worktree<'a>(
    entries: &'a [WorktreeEntry],
    dir: &Path,
) -> Option<&'a WorktreeEntry> {
    let dir = resolve_path(dir);
    entries
        .iter()
        .filter(|entry| dir.starts_with(resolve_path(&entry.path)))
        .max_by_key(|entry| entry.path.components().count())
}
