//! End-to-end checks of the pure lifecycle rules: classification, deadline
//! arithmetic, derived SLA state, and the load-balancer tie-break.

use chrono::{DateTime, Duration, Utc};

use deskserver::comments::mentions::mention_names;
use deskserver::shared::enums::{TicketPriority, TicketStatus};
use deskserver::tickets::assign::least_loaded;
use deskserver::tickets::priority::classify;
use deskserver::tickets::sla::{deadline, sla_state, SlaState};

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

#[test]
fn urgent_ticket_gets_high_priority_and_24h_deadline() {
    let created = at("2026-03-02T09:30:00Z");
    let detected = classify("System down, urgent!!", "");
    assert_eq!(detected, TicketPriority::High);
    assert_eq!(deadline(detected, created), created + Duration::hours(24));
}

#[test]
fn high_keywords_beat_medium_keywords() {
    // "slow" alone is Medium, but "outage" forces High no matter where it
    // appears in the text.
    assert_eq!(classify("Site is slow", ""), TicketPriority::Medium);
    assert_eq!(
        classify("Site is slow", "ever since the outage last week"),
        TicketPriority::High
    );
}

#[test]
fn unmatched_text_is_low_with_72h_deadline() {
    let created = at("2026-03-02T09:30:00Z");
    let detected = classify("Request new badge photo", "mine is from 2019");
    assert_eq!(detected, TicketPriority::Low);
    assert_eq!(deadline(detected, created), created + Duration::hours(72));
}

#[test]
fn terminal_tickets_never_breach() {
    let past_deadline = at("2026-01-01T00:00:00Z");
    let now = at("2026-06-01T00:00:00Z");
    assert_eq!(
        sla_state(past_deadline, TicketStatus::Resolved, now),
        SlaState::Completed
    );
    assert_eq!(
        sla_state(past_deadline, TicketStatus::Closed, now),
        SlaState::Completed
    );
    assert_eq!(
        sla_state(past_deadline, TicketStatus::Open, now),
        SlaState::Breach
    );
}

#[test]
fn least_loaded_picks_first_strict_minimum() {
    // Loads [3, 1, 4, 1] in fetch order: the first agent with load 1 wins.
    let agents = vec![("ana", 3), ("ben", 1), ("cam", 4), ("dee", 1)];
    assert_eq!(least_loaded(agents), Some("ben"));
}

#[test]
fn least_loaded_with_no_agents_is_none() {
    assert_eq!(least_loaded(Vec::<((), i64)>::new()), None);
}

#[test]
fn mentions_resolve_once_per_name() {
    let names = mention_names("@dee please sync with @Ana, @ana already knows");
    assert_eq!(names, vec!["dee".to_string(), "Ana".to_string()]);
}
