//! Keyword-based priority detection for tickets filed without an explicit
//! priority. High keywords always win over medium ones; no match means Low.

use crate::shared::enums::TicketPriority;

const HIGH_PRIORITY_KEYWORDS: &[&str] = &[
    "urgent",
    "critical",
    "emergency",
    "asap",
    "immediately",
    "payment failed",
    "security",
    "breach",
    "down",
    "crash",
    "not working",
    "broken",
    "error",
    "can't access",
    "cannot login",
    "data loss",
    "production",
    "outage",
    "hack",
];

const MEDIUM_PRIORITY_KEYWORDS: &[&str] = &[
    "issue",
    "problem",
    "bug",
    "help",
    "question",
    "slow",
    "performance",
    "delay",
    "missing",
];

/// Classify a ticket from its title and description. Pure substring scan
/// over the lowercased concatenation, first match in declaration order wins.
pub fn classify(title: &str, description: &str) -> TicketPriority {
    let text = format!("{} {}", title, description).to_lowercase();

    for keyword in HIGH_PRIORITY_KEYWORDS {
        if text.contains(keyword) {
            return TicketPriority::High;
        }
    }

    for keyword in MEDIUM_PRIORITY_KEYWORDS {
        if text.contains(keyword) {
            return TicketPriority::Medium;
        }
    }

    TicketPriority::Low
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_keyword_in_title() {
        assert_eq!(classify("System down, urgent!!", ""), TicketPriority::High);
    }

    #[test]
    fn test_high_keyword_in_description() {
        assert_eq!(
            classify("Please look at this", "we are seeing data loss on saves"),
            TicketPriority::High
        );
    }

    #[test]
    fn test_high_takes_precedence_over_medium() {
        // "slow" is a medium keyword, "production" is a high keyword
        assert_eq!(
            classify("Production is slow", "everything takes minutes"),
            TicketPriority::High
        );
        assert_eq!(
            classify("Bug: checkout crash", "cart crashes at payment step"),
            TicketPriority::High
        );
    }

    #[test]
    fn test_medium_keyword() {
        assert_eq!(
            classify("Page loads slow", "the dashboard takes a while"),
            TicketPriority::Medium
        );
        assert_eq!(classify("Question about billing", ""), TicketPriority::Medium);
    }

    #[test]
    fn test_no_keyword_is_low() {
        assert_eq!(
            classify("Feature request", "please add dark mode"),
            TicketPriority::Low
        );
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("URGENT: need access", ""), TicketPriority::High);
        assert_eq!(classify("PERFORMANCE woes", ""), TicketPriority::Medium);
    }
}
