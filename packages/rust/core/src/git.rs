//! Source-control provenance for run records.
//!
//! Captured once at run start and passed into the run explicitly; the
//! pipeline itself never shells out.

use std::process::Command;

use tracing::debug;

use newsreel_shared::GitMetadata;

/// Read the current commit, branch, and origin URL from `git`.
///
/// Every field is best-effort: outside a repository (or without git
/// installed) the result is empty and ingestion proceeds without
/// provenance.
pub fn capture_git_metadata() -> GitMetadata {
    let meta = GitMetadata {
        commit: git_output(&["rev-parse", "HEAD"]),
        branch: git_output(&["rev-parse", "--abbrev-ref", "HEAD"]),
        repo: git_output(&["config", "--get", "remote.origin.url"]),
    };

    if meta.commit.is_none() {
        debug!("no git metadata available, run will be unstamped");
    }
    meta
}

fn git_output(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_never_panics_and_trims() {
        // Works both inside and outside a checkout: fields are either
        // absent or non-empty with no surrounding whitespace.
        let meta = capture_git_metadata();
        for field in [&meta.commit, &meta.branch, &meta.repo] {
            if let Some(value) = field {
                assert!(!value.is_empty());
                assert_eq!(value, value.trim());
            }
        }
    }
}
