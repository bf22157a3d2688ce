use anyhow::Result;
use chrono::{DateTime, Utc};
use std::io::Read;
use tracing::warn;

use crate::application::AccountService;
use crate::domain::{Catalog, Color, EventDraft, EventKind};
use crate::io::export::CatalogDocument;

/// Result of an import operation
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub imported: usize,
    pub errors: Vec<ImportError>,
}

/// Error that occurred on a single input line
#[derive(Debug, Clone)]
pub struct ImportError {
    pub line: usize,
    pub field: Option<String>,
    pub error: String,
}

pub struct Importer<'a> {
    service: &'a AccountService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a AccountService) -> Self {
        Self { service }
    }

    /// Replace the catalog with the items of a `{"items": [...]}` document.
    /// Nothing is written when `dry_run` is set.
    pub async fn import_catalog_json<R: Read>(&self, reader: R, dry_run: bool) -> Result<Catalog> {
        let document: CatalogDocument = serde_json::from_reader(reader)?;
        let catalog = Catalog::new(document.items);

        if !dry_run {
            self.service.save_catalog(&catalog).await?;
        }
        Ok(catalog)
    }

    /// Record the rows of a statement CSV as new events for `client_name`.
    ///
    /// Rows are read in the exported column layout; ids, deltas and balances in
    /// the file are ignored because they are recomputed. Bad rows are reported
    /// and skipped.
    pub async fn import_statement_csv<R: Read>(
        &self,
        client_name: &str,
        reader: R,
        dry_run: bool,
    ) -> Result<ImportResult> {
        // Fail early on an unknown client rather than once per row.
        self.service.get_client(client_name).await?;

        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut imported = 0;
        let mut errors = Vec::new();

        for (index, result) in csv_reader.records().enumerate() {
            let line = index + 2;

            let draft = match result
                .map_err(|e| ImportError {
                    line,
                    field: None,
                    error: format!("CSV parse error: {}", e),
                })
                .and_then(|record| parse_statement_row(&record, line))
            {
                Ok(draft) => draft,
                Err(error) => {
                    warn!(line, error = %error.error, "skipping import row");
                    errors.push(error);
                    continue;
                }
            };

            if let Err(e) = draft.validate() {
                warn!(line, error = %e, "skipping import row");
                errors.push(ImportError {
                    line,
                    field: None,
                    error: e,
                });
                continue;
            }

            if !dry_run {
                self.service.record_event(client_name, draft).await?;
            }
            imported += 1;
        }

        Ok(ImportResult { imported, errors })
    }
}

fn parse_statement_row(record: &csv::StringRecord, line: usize) -> Result<EventDraft, ImportError> {
    let field = |index: usize| record.get(index).unwrap_or("").trim();
    let field_error = |name: &str, error: String| ImportError {
        line,
        field: Some(name.to_string()),
        error,
    };

    let created_at = DateTime::parse_from_rfc3339(field(1))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| field_error("created_at", e.to_string()))?;

    let kind = match field(2) {
        "withdrawal" | "bajar" => {
            let product_color = match field(4) {
                "" => None,
                color => Some(
                    Color::parse(color).map_err(|e| field_error("product_color", e.to_string()))?,
                ),
            };
            EventKind::Withdrawal {
                quantity: optional_int(field(5)).map_err(|e| field_error("quantity", e))?,
                unit_price: optional_int(field(6))
                    .map_err(|e| field_error("unit_price_cents", e))?,
                product: field(3).to_string(),
                product_color,
            }
        }
        "payment" | "entrego" => EventKind::Payment {
            amount: optional_int(field(7)).map_err(|e| field_error("amount_cents", e))?,
        },
        other => return Err(field_error("kind", format!("unknown event kind '{}'", other))),
    };

    let notes = Some(field(10).to_string());
    Ok(EventDraft::new(kind)
        .with_notes(notes)
        .with_created_at(Some(created_at)))
}

fn optional_int(value: &str) -> Result<Option<i64>, String> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| format!("'{}' is not a whole number", value))
}
