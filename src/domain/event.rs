use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CatalogItem, Cents, ClientId, Color, Quantity};

pub type EventId = Uuid;

/// Cut a timestamp to microseconds, the precision storage keeps.
pub fn truncate_timestamp(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(6)
}

pub fn timestamp_now() -> DateTime<Utc> {
    truncate_timestamp(Utc::now())
}

/// What happened on the account. Each kind carries only its own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventKind {
    /// Products taken on credit; decreases the balance by quantity * unit price
    #[serde(alias = "bajar")]
    Withdrawal {
        quantity: Option<Quantity>,
        unit_price: Option<Cents>,
        product: String,
        product_color: Option<Color>,
    },
    /// Cash handed over; increases the balance by the amount
    #[serde(alias = "entrego")]
    Payment { amount: Option<Cents> },
}

impl EventKind {
    /// A withdrawal of a catalog product, carrying its label and color.
    pub fn withdrawal_of(
        item: &CatalogItem,
        quantity: Option<Quantity>,
        unit_price: Option<Cents>,
    ) -> Self {
        EventKind::Withdrawal {
            quantity,
            unit_price,
            product: item.label.clone(),
            product_color: Some(item.color.clone()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Withdrawal { .. } => "withdrawal",
            EventKind::Payment { .. } => "payment",
        }
    }

    /// Signed effect of this event on the balance.
    /// Missing numbers count as zero.
    pub fn delta(&self) -> Cents {
        match self {
            EventKind::Withdrawal {
                quantity,
                unit_price,
                ..
            } => {
                let quantity = quantity.unwrap_or(0);
                let unit_price = unit_price.unwrap_or(0);
                quantity.saturating_mul(unit_price).saturating_neg()
            }
            EventKind::Payment { amount } => amount.unwrap_or(0),
        }
    }

    /// Check the fields an entry form requires for this kind.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            EventKind::Withdrawal {
                quantity,
                unit_price,
                product,
                ..
            } => {
                if quantity.is_none() || unit_price.is_none() || product.trim().is_empty() {
                    return Err(
                        "a withdrawal needs a quantity, a unit price and a product".to_string(),
                    );
                }
                if quantity.is_some_and(|q| q < 0) || unit_price.is_some_and(|p| p < 0) {
                    return Err("quantity and unit price cannot be negative".to_string());
                }
                Ok(())
            }
            EventKind::Payment { amount } => match amount {
                Some(_) => Ok(()),
                None => Err("a payment needs an amount".to_string()),
            },
        }
    }
}

/// A single entry on a client's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub client_id: ClientId,
    #[serde(flatten)]
    pub kind: EventKind,
    pub notes: Option<String>,
    /// Soft-delete flag; deleted events stay in storage
    pub deleted: bool,
    pub edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn new(client_id: ClientId, kind: EventKind) -> Self {
        let now = timestamp_now();
        Self {
            id: Uuid::new_v4(),
            client_id,
            kind,
            notes: None,
            deleted: false,
            edited: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn withdrawal(
        client_id: ClientId,
        quantity: Option<Quantity>,
        unit_price: Option<Cents>,
        product: impl Into<String>,
    ) -> Self {
        Self::new(
            client_id,
            EventKind::Withdrawal {
                quantity,
                unit_price,
                product: product.into(),
                product_color: None,
            },
        )
    }

    /// Build a withdrawal whose product name and color come from a catalog item.
    pub fn withdrawal_from_catalog(
        client_id: ClientId,
        quantity: Option<Quantity>,
        unit_price: Option<Cents>,
        item: &CatalogItem,
    ) -> Self {
        Self::new(client_id, EventKind::withdrawal_of(item, quantity, unit_price))
    }

    pub fn payment(client_id: ClientId, amount: Option<Cents>) -> Self {
        Self::new(client_id, EventKind::Payment { amount })
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        let created_at = truncate_timestamp(created_at);
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }

    /// Only applies to withdrawals; payments have no product.
    pub fn with_product_color(mut self, color: Color) -> Self {
        if let EventKind::Withdrawal { product_color, .. } = &mut self.kind {
            *product_color = Some(color);
        }
        self
    }

    pub fn delta(&self) -> Cents {
        self.kind.delta()
    }

    pub fn is_withdrawal(&self) -> bool {
        matches!(self.kind, EventKind::Withdrawal { .. })
    }

    pub fn is_payment(&self) -> bool {
        matches!(self.kind, EventKind::Payment { .. })
    }
}

/// The fields an operator submits when creating or editing an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub kind: EventKind,
    pub notes: Option<String>,
    /// Defaults to now for new events and to the stored value on edits
    pub created_at: Option<DateTime<Utc>>,
}

impl EventDraft {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            notes: None,
            created_at: None,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at.map(truncate_timestamp);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        self.kind.validate()
    }

    /// Materialize a new event for `client_id`.
    pub fn into_event(self, client_id: ClientId) -> Event {
        let mut event = Event::new(client_id, self.kind);
        if let Some(created_at) = self.created_at {
            event = event.with_created_at(created_at);
        }
        event.notes = self.notes;
        event
    }

    /// Overwrite every editable field of `event`, keeping its identity.
    pub fn apply_to(self, event: &mut Event, now: DateTime<Utc>) {
        event.kind = self.kind;
        event.notes = self.notes;
        if let Some(created_at) = self.created_at {
            event.created_at = truncate_timestamp(created_at);
        }
        event.edited = true;
        event.updated_at = truncate_timestamp(now);
    }
}
