use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::AccountService;
use crate::domain::{CatalogItem, Cents, Client, EventKind, LedgerEntry};

/// Column order of statement CSV files, shared with the importer.
pub const STATEMENT_CSV_HEADER: [&str; 11] = [
    "id",
    "created_at",
    "kind",
    "product",
    "product_color",
    "quantity",
    "unit_price_cents",
    "amount_cents",
    "delta_cents",
    "balance_cents",
    "notes",
];

/// A client's statement as written to JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementSnapshot {
    pub exported_at: DateTime<Utc>,
    pub client: Client,
    pub balance: Cents,
    pub entries: Vec<LedgerEntry>,
}

/// The catalog document, `{"items": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub items: Vec<CatalogItem>,
}

pub struct Exporter<'a> {
    service: &'a AccountService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a AccountService) -> Self {
        Self { service }
    }

    /// Write a client's statement as CSV, oldest entry first.
    /// Returns the number of rows written.
    pub async fn export_statement_csv<W: Write>(
        &self,
        client_name: &str,
        writer: W,
    ) -> Result<usize> {
        let statement = self.service.statement(client_name).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(STATEMENT_CSV_HEADER)?;

        for entry in &statement.entries {
            let event = &entry.event;
            let (product, color, quantity, unit_price, amount) = match &event.kind {
                EventKind::Withdrawal {
                    quantity,
                    unit_price,
                    product,
                    product_color,
                } => (
                    product.clone(),
                    product_color
                        .as_ref()
                        .map(|c| c.to_string())
                        .unwrap_or_default(),
                    optional_number(*quantity),
                    optional_number(*unit_price),
                    String::new(),
                ),
                EventKind::Payment { amount } => (
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    optional_number(*amount),
                ),
            };

            csv_writer.write_record([
                event.id.to_string(),
                event.created_at.to_rfc3339(),
                event.kind.as_str().to_string(),
                product,
                color,
                quantity,
                unit_price,
                amount,
                entry.delta().to_string(),
                entry.balance.to_string(),
                event.notes.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(statement.entries.len())
    }

    /// Write a client's statement as pretty JSON.
    pub async fn export_statement_json<W: Write>(
        &self,
        client_name: &str,
        writer: W,
    ) -> Result<usize> {
        let statement = self.service.statement(client_name).await?;
        let count = statement.entries.len();

        let snapshot = StatementSnapshot {
            exported_at: Utc::now(),
            balance: statement.balance(),
            client: statement.client,
            entries: statement.entries,
        };

        serde_json::to_writer_pretty(writer, &snapshot)?;
        Ok(count)
    }

    /// Write the product catalog document as pretty JSON.
    pub async fn export_catalog_json<W: Write>(&self, writer: W) -> Result<usize> {
        let catalog = self.service.load_catalog().await?;
        let document = CatalogDocument {
            items: catalog.into_items(),
        };

        serde_json::to_writer_pretty(writer, &document)?;
        Ok(document.items.len())
    }
}

fn optional_number(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
