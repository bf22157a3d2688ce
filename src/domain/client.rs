use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, timestamp_now};

pub type ClientId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub address: Option<String>,
    /// Cached balance shown in listings. The ledger is the source of truth.
    pub balance: Cents,
    /// Creation time of the most recent active event, cached like `balance`
    pub last_event_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: None,
            balance: 0,
            last_event_at: None,
            created_at: timestamp_now(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// A negative balance means the client owes money.
    pub fn owes(&self) -> bool {
        self.balance < 0
    }
}
