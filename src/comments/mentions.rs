//! `@name` token extraction from comment text. Names are matched later
//! against users by case-insensitive exact name; this step only scans text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(\w+)").unwrap());

/// Deduplicated (case-insensitively) mention names, in first-seen order.
pub fn mention_names(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for captures in MENTION_RE.captures_iter(content) {
        let name = captures[1].to_string();
        if seen.insert(name.to_lowercase()) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_names() {
        assert_eq!(
            mention_names("ping @alice and @bob_smith about this"),
            vec!["alice".to_string(), "bob_smith".to_string()]
        );
    }

    #[test]
    fn test_dedup_is_case_insensitive() {
        assert_eq!(mention_names("@Alice @alice @ALICE"), vec!["Alice".to_string()]);
    }

    #[test]
    fn test_no_mentions() {
        assert!(mention_names("plain text").is_empty());
    }

    #[test]
    fn test_email_like_text_still_matches() {
        // Same behavior as the naive token scan: "a@b" yields "b".
        assert_eq!(mention_names("reach me at sam@example"), vec!["example".to_string()]);
    }

    #[test]
    fn test_punctuation_boundary() {
        assert_eq!(mention_names("thanks @carol!"), vec!["carol".to_string()]);
    }
}
