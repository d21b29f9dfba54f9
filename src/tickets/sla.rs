//! SLA deadline arithmetic and derived SLA state.
//!
//! The deadline is computed exactly once, at ticket creation, and stored.
//! Everything else (ok/warning/critical/breach/completed) is derived at read
//! time from deadline + status + now and never persisted.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::enums::{TicketPriority, TicketStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaState {
    Ok,
    Warning,
    Critical,
    Breach,
    Completed,
}

pub fn resolution_hours(priority: TicketPriority) -> i64 {
    match priority {
        TicketPriority::High => 24,
        TicketPriority::Medium => 48,
        TicketPriority::Low => 72,
    }
}

pub fn deadline(priority: TicketPriority, created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::hours(resolution_hours(priority))
}

/// Derived SLA state. Terminal tickets are always `completed`, whatever their
/// deadline.
pub fn sla_state(
    deadline: DateTime<Utc>,
    status: TicketStatus,
    now: DateTime<Utc>,
) -> SlaState {
    if status.is_terminal() {
        return SlaState::Completed;
    }

    let remaining = deadline - now;
    if remaining < Duration::zero() {
        SlaState::Breach
    } else if remaining <= Duration::hours(6) {
        SlaState::Critical
    } else if remaining <= Duration::hours(24) {
        SlaState::Warning
    } else {
        SlaState::Ok
    }
}

pub fn is_breached(deadline: DateTime<Utc>, status: TicketStatus, now: DateTime<Utc>) -> bool {
    !status.is_terminal() && now > deadline
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_deadline_per_priority() {
        let created = at("2026-01-10T08:00:00Z");
        assert_eq!(
            deadline(TicketPriority::High, created) - created,
            Duration::hours(24)
        );
        assert_eq!(
            deadline(TicketPriority::Medium, created) - created,
            Duration::hours(48)
        );
        assert_eq!(
            deadline(TicketPriority::Low, created) - created,
            Duration::hours(72)
        );
    }

    #[test]
    fn test_terminal_is_completed_even_past_deadline() {
        let deadline = at("2026-01-01T00:00:00Z");
        let now = at("2026-02-01T00:00:00Z");
        assert_eq!(
            sla_state(deadline, TicketStatus::Resolved, now),
            SlaState::Completed
        );
        assert_eq!(
            sla_state(deadline, TicketStatus::Closed, now),
            SlaState::Completed
        );
    }

    #[test]
    fn test_state_thresholds() {
        let deadline = at("2026-01-10T12:00:00Z");

        // past deadline
        let now = at("2026-01-10T12:00:01Z");
        assert_eq!(sla_state(deadline, TicketStatus::Open, now), SlaState::Breach);

        // exactly 6h left
        let now = at("2026-01-10T06:00:00Z");
        assert_eq!(
            sla_state(deadline, TicketStatus::Open, now),
            SlaState::Critical
        );

        // 12h left
        let now = at("2026-01-10T00:00:00Z");
        assert_eq!(
            sla_state(deadline, TicketStatus::InProgress, now),
            SlaState::Warning
        );

        // 30h left
        let now = at("2026-01-09T06:00:00Z");
        assert_eq!(sla_state(deadline, TicketStatus::Open, now), SlaState::Ok);
    }

    #[test]
    fn test_is_breached_excludes_terminal() {
        let deadline = at("2026-01-10T12:00:00Z");
        let now = at("2026-01-11T12:00:00Z");
        assert!(is_breached(deadline, TicketStatus::Open, now));
        assert!(!is_breached(deadline, TicketStatus::Closed, now));
        assert!(!is_breached(deadline, TicketStatus::Open, at("2026-01-10T11:00:00Z")));
    }

    #[test]
    fn test_state_serde_labels() {
        assert_eq!(
            serde_json::to_value(SlaState::Breach).unwrap(),
            serde_json::json!("breach")
        );
        assert_eq!(
            serde_json::to_value(SlaState::Completed).unwrap(),
            serde_json::json!("completed")
        );
    }
}
