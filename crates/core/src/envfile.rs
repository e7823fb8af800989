//! Environment-overlay file parsing.
//!
//! Overlay files are plain `KEY=VALUE` lines. They are applied on top of a
//! base environment when a child process is launched: every key present in
//! the overlay wins over the base value.
//!
//! Parsing rules:
//!
//! - blank lines and lines starting with `#` are ignored
//! - lines without `=` are ignored
//! - the line splits on the *first* `=`, so values may contain `=`
//! - whitespace is trimmed from both key and value
//! - keys that are empty after trimming are ignored

use std::collections::HashMap;

/// Parse overlay file content into ordered `(key, value)` pairs.
///
/// Order is preserved so that a later duplicate key wins when applied.
pub fn parse_overlay(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        pairs.push((key.to_string(), value.trim().to_string()));
    }
    pairs
}

/// Apply overlay file content on top of a base environment in place.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use hostbot_core::envfile::apply_overlay;
///
/// let mut env: HashMap<String, String> =
///     [("A".to_string(), "1".to_string())].into_iter().collect();
/// apply_overlay(&mut env, "A=2\nB=3");
/// assert_eq!(env["A"], "2");
/// assert_eq!(env["B"], "3");
/// ```
pub fn apply_overlay(env: &mut HashMap<String, String>, content: &str) {
    for (key, value) in parse_overlay(content) {
        env.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> HashMap<String, String> {
        [("A".to_string(), "1".to_string())].into_iter().collect()
    }

    #[test]
    fn overlay_wins_over_base() {
        let mut env = base();
        apply_overlay(&mut env, "A=2\nB=3");
        assert_eq!(env.len(), 2);
        assert_eq!(env["A"], "2");
        assert_eq!(env["B"], "3");
    }

    #[test]
    fn blank_and_comment_lines_ignored() {
        let mut env = base();
        apply_overlay(&mut env, "\n# comment\n   \n# A=9\nB=2\n");
        assert_eq!(env["A"], "1");
        assert_eq!(env["B"], "2");
    }

    #[test]
    fn splits_on_first_equals_only() {
        let pairs = parse_overlay("URL=https://x.test/?a=1&b=2");
        assert_eq!(
            pairs,
            vec![("URL".to_string(), "https://x.test/?a=1&b=2".to_string())]
        );
    }

    #[test]
    fn trims_key_and_value() {
        let pairs = parse_overlay("  KEY  =  padded value  ");
        assert_eq!(
            pairs,
            vec![("KEY".to_string(), "padded value".to_string())]
        );
    }

    #[test]
    fn line_without_equals_ignored() {
        assert!(parse_overlay("JUSTAWORD\n").is_empty());
    }

    #[test]
    fn empty_key_ignored() {
        assert!(parse_overlay("=value\n  =x\n").is_empty());
    }

    #[test]
    fn later_duplicate_wins() {
        let mut env = HashMap::new();
        apply_overlay(&mut env, "K=first\nK=second");
        assert_eq!(env["K"], "second");
    }

    #[test]
    fn empty_value_allowed() {
        let pairs = parse_overlay("EMPTY=");
        assert_eq!(pairs, vec![("EMPTY".to_string(), String::new())]);
    }
}
