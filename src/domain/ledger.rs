use serde::{Deserialize, Serialize};

use super::{Cents, Client, Event};

/// An event paired with the account balance right after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub event: Event,
    pub balance: Cents,
}

impl LedgerEntry {
    pub fn delta(&self) -> Cents {
        self.event.delta()
    }
}

/// Signed effect of a single event on the balance.
pub fn event_delta(event: &Event) -> Cents {
    event.delta()
}

/// Attach a running balance to every event.
///
/// `events` must already exclude soft-deleted entries and be sorted by
/// creation time, oldest first. The output keeps the input order and length.
pub fn accumulate<I>(events: I) -> Vec<LedgerEntry>
where
    I: IntoIterator<Item = Event>,
{
    events
        .into_iter()
        .scan(0 as Cents, |balance, event| {
            *balance = balance.saturating_add(event.delta());
            Some(LedgerEntry {
                event,
                balance: *balance,
            })
        })
        .collect()
}

/// Running balances only, one per event.
pub fn running_balances(events: &[Event]) -> Vec<Cents> {
    events
        .iter()
        .scan(0 as Cents, |balance, event| {
            *balance = balance.saturating_add(event.delta());
            Some(*balance)
        })
        .collect()
}

/// Final balance of a sequence of events.
pub fn total_balance(events: &[Event]) -> Cents {
    events
        .iter()
        .fold(0, |balance: Cents, event| balance.saturating_add(event.delta()))
}

/// A client's accumulated ledger, oldest entry first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub client: Client,
    pub entries: Vec<LedgerEntry>,
}

impl Statement {
    pub fn new(client: Client, events: Vec<Event>) -> Self {
        Self {
            client,
            entries: accumulate(events),
        }
    }

    /// Balance after the last entry, zero when there are none.
    pub fn balance(&self) -> Cents {
        self.entries.last().map(|e| e.balance).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries most recent first, for display.
    pub fn newest_first(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().rev()
    }
}
