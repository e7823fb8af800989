//! Dependency-manifest normalization and change detection.
//!
//! Users paste all sorts of things into a requirements file. The most
//! common mistake is a full install command (`pip install requests flask`)
//! instead of one requirement per line. Normalization strips the directive
//! words and splits the remainder, leaving a clean one-spec-per-line
//! manifest the installer can consume.
//!
//! A SHA-256 digest over the normalized entries is used as an install
//! marker: when the digest matches the one recorded after the last
//! successful install, the install step is skipped entirely.

use sha2::{Digest, Sha256};

/// Normalize raw manifest content into one requirement spec per line.
///
/// A line whose leading tokens are an install directive (`pip install`,
/// `pip3 install`, or a bare `install`) is split into the individual
/// package specs that follow the directive. Every other non-blank line is
/// kept verbatim, trimmed.
///
/// # Examples
///
/// ```
/// use hostbot_core::manifest::normalize_manifest;
///
/// let entries = normalize_manifest("install requests flask\nnumpy==1.2\n");
/// assert_eq!(entries, vec!["requests", "flask", "numpy==1.2"]);
/// ```
pub fn normalize_manifest(content: &str) -> Vec<String> {
    let mut entries = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match strip_install_directive(line) {
            Some(rest) => entries.extend(rest.split_whitespace().map(str::to_string)),
            None => entries.push(line.to_string()),
        }
    }
    entries
}

/// If `line` starts with an install directive, return everything after it.
fn strip_install_directive(line: &str) -> Option<&str> {
    let mut rest = line;
    let first = first_token(rest)?;
    if first.eq_ignore_ascii_case("pip") || first.eq_ignore_ascii_case("pip3") {
        rest = rest[first.len()..].trim_start();
    }
    let keyword = first_token(rest)?;
    if keyword.eq_ignore_ascii_case("install") {
        Some(rest[keyword.len()..].trim_start())
    } else {
        None
    }
}

fn first_token(s: &str) -> Option<&str> {
    s.split_whitespace().next()
}

/// Hex SHA-256 digest of a normalized manifest.
///
/// Entries are joined with newlines before hashing, so the digest is
/// stable across whitespace differences in the raw upload.
pub fn manifest_digest(entries: &[String]) -> String {
    let mut hasher = Sha256::new();
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(entry.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
