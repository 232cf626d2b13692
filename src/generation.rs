use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Hands out increasing tickets; a result is only admitted if its ticket is
/// still the most recent one issued.
#[derive(Debug, Clone, Default)]
pub struct RequestGate {
    latest: Arc<AtomicU64>,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    pub fn admit<T>(&self, ticket: Ticket, value: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(value)
        } else {
            tracing::debug!(ticket = ticket.0, "discarding stale result");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_ticket_makes_older_stale() {
        let gate = RequestGate::new();
        let first = gate.issue();
        assert!(gate.is_current(first));

        let second = gate.clone().issue();
        assert_eq!(gate.admit(first, "old"), None);
        assert_eq!(gate.admit(second, "new"), Some("new"));
    }
}
