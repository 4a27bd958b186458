//! Branch name validation.
//!
//! A branch name is one or more `/`-separated segments. Each segment uses
//! ASCII letters, digits, `_`, `-` and `.`, and must not start with `.`.

use crate::error::{RefError, Result};

/// Upper bound on the length of a branch name, in bytes.
pub const MAX_BRANCH_NAME_LEN: usize = 255;

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidBranchName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Validate a branch name.
///
/// ```
/// use strata_refs::names::validate_branch_name;
///
/// assert!(validate_branch_name("master").is_ok());
/// assert!(validate_branch_name("review/alice").is_ok());
/// assert!(validate_branch_name("").is_err());
/// assert!(validate_branch_name("a/.b").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "empty"));
    }
    if name.len() > MAX_BRANCH_NAME_LEN {
        return Err(invalid(name, format!("longer than {MAX_BRANCH_NAME_LEN} bytes")));
    }
    for segment in name.split('/') {
        if segment.is_empty() {
            return Err(invalid(name, "empty segment"));
        }
        if segment.starts_with('.') {
            return Err(invalid(name, format!("segment {segment:?} starts with '.'")));
        }
        if let Some(c) = segment.chars().find(|c| !segment_char(*c)) {
            return Err(invalid(name, format!("character {c:?} is not allowed")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_usual_names() {
        for name in ["master", "dev_2", "v1.0", "team/alice/fix-123"] {
            assert!(validate_branch_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_bad_segments() {
        for name in ["", "/lead", "trail/", "a//b", ".hidden", "a/..", "x/.y"] {
            assert!(validate_branch_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn rejects_characters_outside_the_allowlist() {
        for name in ["has space", "a~b", "a:b", "a*b", "a\\b", "ünï"] {
            let err = validate_branch_name(name).unwrap_err();
            assert!(matches!(err, RefError::InvalidBranchName { .. }), "{name}");
        }
    }

    #[test]
    fn rejects_overlong_names() {
        let name = "b".repeat(MAX_BRANCH_NAME_LEN + 1);
        assert!(validate_branch_name(&name).is_err());
        assert!(validate_branch_name(&name[1..]).is_ok());
    }
}
