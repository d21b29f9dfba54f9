//! Least-busy-agent auto-assignment.
//!
//! The scan is best effort: any datastore failure degrades to "no agent
//! available" so ticket creation never aborts, but each swallowed failure is
//! logged and counted. The scan-then-assign sequence is not atomic; two
//! concurrent creations may pick the same agent, which is tolerated skew.

use diesel::prelude::*;
use log::error;

use crate::directory::{self, User};
use crate::shared::enums::TicketStatus;
use crate::shared::schema::tickets;
use crate::shared::state::AppState;

/// Pick the entry with the strictly smallest load; first encountered wins
/// ties, in input order.
pub fn least_loaded<T>(entries: Vec<(T, i64)>) -> Option<T> {
    let mut best: Option<(T, i64)> = None;
    for (entry, load) in entries {
        match &best {
            Some((_, min)) if load >= *min => {}
            _ => best = Some((entry, load)),
        }
    }
    best.map(|(entry, _)| entry)
}

/// Scan all active agents and return the one with the fewest non-terminal
/// tickets, or None when there are no agents or the scan fails.
pub async fn find_least_busy_agent(state: &AppState) -> Option<User> {
    let mut conn = match state.conn.get() {
        Ok(conn) => conn,
        Err(e) => {
            error!("Agent scan failed to acquire connection: {}", e);
            state.metrics.increment("assign.scan_failures").await;
            return None;
        }
    };

    let agents = match directory::active_agents(&mut conn) {
        Ok(agents) => agents,
        Err(e) => {
            error!("Agent scan failed to load agents: {}", e);
            state.metrics.increment("assign.scan_failures").await;
            return None;
        }
    };

    if agents.is_empty() {
        return None;
    }

    let mut loads = Vec::with_capacity(agents.len());
    for agent in agents {
        let active_tickets: i64 = match tickets::table
            .filter(tickets::assigned_to.eq(agent.id))
            .filter(tickets::status.ne(TicketStatus::Resolved))
            .filter(tickets::status.ne(TicketStatus::Closed))
            .count()
            .get_result(&mut conn)
        {
            Ok(count) => count,
            Err(e) => {
                error!("Agent scan failed counting load for {}: {}", agent.id, e);
                state.metrics.increment("assign.scan_failures").await;
                return None;
            }
        };
        loads.push((agent, active_tickets));
    }

    least_loaded(loads)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_least_loaded_tie_broken_by_order() {
        let entries = vec![("a", 3), ("b", 1), ("c", 4), ("d", 1)];
        assert_eq!(least_loaded(entries), Some("b"));
    }

    #[test]
    fn test_least_loaded_single() {
        assert_eq!(least_loaded(vec![("only", 9)]), Some("only"));
    }

    #[test]
    fn test_least_loaded_empty() {
        assert_eq!(least_loaded(Vec::<(&str, i64)>::new()), None);
    }

    #[test]
    fn test_least_loaded_prefers_later_strict_minimum() {
        let entries = vec![("a", 2), ("b", 0)];
        assert_eq!(least_loaded(entries), Some("b"));
    }
}
