//! Branch name validation.
//!
//! Every branch name that reaches a git argument vector or a filesystem
//! path goes through [`validate_branch_name`] first. The rules follow git's
//! own ref-name restrictions, tightened so that an accepted name is also a
//! safe path component.

use super::errors::GitError;

const FORBIDDEN_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\', ' '];

/// Validate a branch name, returning it trimmed.
///
/// Rejects empty names, a leading `-` (option injection), `..` and
/// backslashes (path traversal), control characters, spaces, any of
/// `~^:?*[`, a trailing `.lock`, the sequence `@{`, and the bare name `@`.
pub fn validate_branch_name(branch: &str) -> Result<String, GitError> {
    let trimmed = branch.trim();

    if trimmed.is_empty() {
        return Err(GitError::invalid_branch(branch, "cannot be empty"));
    }
    if trimmed.starts_with('-') {
        return Err(GitError::invalid_branch(trimmed, "must not start with '-'"));
    }
    if trimmed.contains("..") {
        return Err(GitError::invalid_branch(trimmed, "must not contain '..'"));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(GitError::invalid_branch(
            trimmed,
            "must not contain control characters",
        ));
    }
    if let Some(c) = trimmed.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(GitError::invalid_branch(
            trimmed,
            format!("must not contain '{c}'"),
        ));
    }
    if trimmed.ends_with(".lock") {
        return Err(GitError::invalid_branch(trimmed, "must not end with '.lock'"));
    }
    if trimmed.contains("@{") {
        return Err(GitError::invalid_branch(trimmed, "must not contain '@{'"));
    }
    if trimmed == "@" {
        return Err(GitError::invalid_branch(trimmed, "'@' is reserved"));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_branch_names() {
        for name in [
            "main",
            "feature-x",
            "feature/auth",
            "fix_123",
            "release/v1.2",
            "user@host",
            "UPPER/case",
        ] {
            assert_eq!(validate_branch_name(name).unwrap(), name, "{name}");
        }
    }

    #[test]
    fn test_returns_trimmed_name() {
        assert_eq!(validate_branch_name("  feature-x \t").unwrap(), "feature-x");
    }

    #[test]
    fn test_rejects_empty_and_blank() {
        assert!(validate_branch_name("").is_err());
        assert!(validate_branch_name("   ").is_err());
    }

    #[test]
    fn test_rejects_leading_hyphen() {
        for name in ["-b", "--force", "-", "--upload-pack=evil"] {
            let err = validate_branch_name(name).unwrap_err();
            assert!(err.to_string().contains("must not start with '-'"), "{name}");
        }
    }

    #[test]
    fn test_rejects_traversal() {
        for name in ["..", "../etc", "a/../b", "feature..x", "a\\b", "..\\x"] {
            assert!(validate_branch_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn test_rejects_each_forbidden_character() {
        for c in ['~', '^', ':', '?', '*', '[', '\\', ' '] {
            let name = format!("feat{c}x");
            assert!(validate_branch_name(&name).is_err(), "{name}");
        }
    }

    #[test]
    fn test_rejects_control_characters() {
        for name in ["feat\u{0}x", "feat\nx", "feat\u{7f}x", "a\tb"] {
            assert!(validate_branch_name(name).is_err(), "{name:?}");
        }
    }

    #[test]
    fn test_rejects_lock_suffix_reflog_syntax_and_at() {
        assert!(validate_branch_name("feature.lock").is_err());
        assert!(validate_branch_name("main@{1}").is_err());
        assert!(validate_branch_name("@").is_err());
        assert!(validate_branch_name("feature.locked").is_ok());
        assert!(validate_branch_name("@home").is_ok());
    }

    #[test]
    fn test_every_name_with_a_forbidden_fragment_is_rejected() {
        let fragments = ["-", "..", "\\", "~", "^", ":", "?", "*", "["];
        let stems = ["", "a", "feature/", "x-y"];
        for fragment in fragments {
            for stem in stems {
                let name = if fragment == "-" {
                    format!("-{stem}")
                } else {
                    format!("{stem}{fragment}z")
                };
                assert!(validate_branch_name(&name).is_err(), "{name}");
            }
        }
    }
}
