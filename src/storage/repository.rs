use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    Catalog, CatalogItem, CatalogItemKind, Cents, Client, ClientId, Color, Event, EventId,
    EventKind,
};

use super::MIGRATION_001_INITIAL;

const EVENT_COLUMNS: &str = "id, client_id, kind, quantity, unit_price_cents, product, product_color, amount_cents, notes, deleted, edited, created_at, updated_at";

const CLIENT_COLUMNS: &str = "id, name, address, balance_cents, last_event_at, created_at";

/// Repository for persisting and querying clients, events and the catalog.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to database {}", database_url))?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        debug!("schema migrations applied");
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Client operations
    // ========================

    pub async fn save_client(&self, client: &Client) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (id, name, address, balance_cents, last_event_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(client.id.to_string())
        .bind(&client.name)
        .bind(&client.address)
        .bind(client.balance)
        .bind(client.last_event_at.map(format_timestamp))
        .bind(format_timestamp(client.created_at))
        .execute(&self.pool)
        .await
        .context("Failed to save client")?;
        Ok(())
    }

    pub async fn get_client(&self, id: ClientId) -> Result<Option<Client>> {
        let row = sqlx::query(&format!("SELECT {} FROM clients WHERE id = ?", CLIENT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch client")?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    pub async fn get_client_by_name(&self, name: &str) -> Result<Option<Client>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM clients WHERE name = ?",
            CLIENT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch client by name")?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    pub async fn list_clients(&self) -> Result<Vec<Client>> {
        let rows = sqlx::query(&format!("SELECT {} FROM clients ORDER BY name", CLIENT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list clients")?;

        rows.iter().map(Self::row_to_client).collect()
    }

    /// Overwrite the cached balance and last-event time of a client.
    pub async fn update_client_summary(
        &self,
        id: ClientId,
        balance: Cents,
        last_event_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query("UPDATE clients SET balance_cents = ?, last_event_at = ? WHERE id = ?")
            .bind(balance)
            .bind(last_event_at.map(format_timestamp))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update client summary")?;
        Ok(())
    }

    fn row_to_client(row: &sqlx::sqlite::SqliteRow) -> Result<Client> {
        let id_str: String = row.get("id");
        let last_event_at: Option<String> = row.get("last_event_at");
        let created_at: String = row.get("created_at");

        Ok(Client {
            id: Uuid::parse_str(&id_str).context("Invalid client ID")?,
            name: row.get("name"),
            address: row.get("address"),
            balance: row.get("balance_cents"),
            last_event_at: last_event_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()
                .context("Invalid last_event_at timestamp")?,
            created_at: parse_timestamp(&created_at).context("Invalid created_at timestamp")?,
        })
    }

    // ========================
    // Event operations
    // ========================

    /// Insert an event, or overwrite every field of the event with the same id.
    pub async fn save_event(&self, event: &Event) -> Result<()> {
        let (quantity, unit_price, product, product_color, amount) = match &event.kind {
            EventKind::Withdrawal {
                quantity,
                unit_price,
                product,
                product_color,
            } => (
                *quantity,
                *unit_price,
                Some(product.as_str()),
                product_color.as_ref().map(Color::as_str),
                None,
            ),
            EventKind::Payment { amount } => (None, None, None, None, *amount),
        };

        sqlx::query(
            r#"
            INSERT INTO events (id, client_id, kind, quantity, unit_price_cents, product, product_color, amount_cents, notes, deleted, edited, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                client_id = excluded.client_id,
                kind = excluded.kind,
                quantity = excluded.quantity,
                unit_price_cents = excluded.unit_price_cents,
                product = excluded.product,
                product_color = excluded.product_color,
                amount_cents = excluded.amount_cents,
                notes = excluded.notes,
                deleted = excluded.deleted,
                edited = excluded.edited,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.client_id.to_string())
        .bind(event.kind.as_str())
        .bind(quantity)
        .bind(unit_price)
        .bind(product)
        .bind(product_color)
        .bind(amount)
        .bind(&event.notes)
        .bind(event.deleted)
        .bind(event.edited)
        .bind(format_timestamp(event.created_at))
        .bind(format_timestamp(event.updated_at))
        .execute(&self.pool)
        .await
        .context("Failed to save event")?;

        debug!(event_id = %event.id, kind = event.kind.as_str(), "event saved");
        Ok(())
    }

    pub async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
        let row = sqlx::query(&format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch event")?;

        row.as_ref().map(Self::row_to_event).transpose()
    }

    /// Non-deleted events of a client, oldest first.
    /// This is the ordering the running balance is computed over.
    pub async fn list_active_events(&self, client_id: ClientId) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM events
            WHERE client_id = ? AND deleted = 0
            ORDER BY created_at ASC, rowid ASC
            "#,
            EVENT_COLUMNS
        ))
        .bind(client_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list events")?;

        rows.iter().map(Self::row_to_event).collect()
    }

    /// Every event of a client, soft-deleted ones included, oldest first.
    pub async fn list_all_events(&self, client_id: ClientId) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM events
            WHERE client_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
            EVENT_COLUMNS
        ))
        .bind(client_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list all events")?;

        rows.iter().map(Self::row_to_event).collect()
    }

    /// Flip the soft-delete flag. Events are never removed from storage.
    pub async fn set_event_deleted(
        &self,
        id: EventId,
        deleted: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE events SET deleted = ?, updated_at = ? WHERE id = ?")
            .bind(deleted)
            .bind(format_timestamp(updated_at))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update event deleted flag")?;
        Ok(())
    }

    /// Count a client's events as (active, deleted).
    pub async fn count_events(&self, client_id: ClientId) -> Result<(i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN deleted = 0 THEN 1 ELSE 0 END), 0) as active,
                COALESCE(SUM(CASE WHEN deleted != 0 THEN 1 ELSE 0 END), 0) as deleted
            FROM events
            WHERE client_id = ?
            "#,
        )
        .bind(client_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to count events")?;

        Ok((row.get("active"), row.get("deleted")))
    }

    fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<Event> {
        let id_str: String = row.get("id");
        let client_id_str: String = row.get("client_id");
        let kind: String = row.get("kind");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        let kind = match kind.as_str() {
            "withdrawal" => {
                let product_color: Option<String> = row.get("product_color");
                EventKind::Withdrawal {
                    quantity: row.get("quantity"),
                    unit_price: row.get("unit_price_cents"),
                    product: row
                        .get::<Option<String>, _>("product")
                        .unwrap_or_default(),
                    product_color: product_color
                        .as_deref()
                        .map(Color::parse)
                        .transpose()
                        .context("Invalid product color")?,
                }
            }
            "payment" => EventKind::Payment {
                amount: row.get("amount_cents"),
            },
            other => anyhow::bail!("Invalid event kind: {}", other),
        };

        Ok(Event {
            id: Uuid::parse_str(&id_str).context("Invalid event ID")?,
            client_id: Uuid::parse_str(&client_id_str).context("Invalid client ID")?,
            kind,
            notes: row.get("notes"),
            deleted: row.get::<i32, _>("deleted") != 0,
            edited: row.get::<i32, _>("edited") != 0,
            created_at: parse_timestamp(&created_at).context("Invalid created_at timestamp")?,
            updated_at: parse_timestamp(&updated_at).context("Invalid updated_at timestamp")?,
        })
    }

    // ========================
    // Catalog operations
    // ========================

    pub async fn load_catalog(&self) -> Result<Catalog> {
        let rows = sqlx::query(
            "SELECT id, label, color, kind FROM catalog_items ORDER BY position",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load catalog")?;

        let items = rows
            .iter()
            .map(Self::row_to_catalog_item)
            .collect::<Result<Vec<_>>>()?;
        Ok(Catalog::new(items))
    }

    /// Replace the stored catalog with `catalog`, keeping its order.
    pub async fn save_catalog(&self, catalog: &Catalog) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start catalog transaction")?;

        sqlx::query("DELETE FROM catalog_items")
            .execute(&mut *tx)
            .await
            .context("Failed to clear catalog")?;

        for (position, item) in catalog.items().iter().enumerate() {
            sqlx::query(
                "INSERT INTO catalog_items (id, position, label, color, kind) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(item.id.to_string())
            .bind(position as i64)
            .bind(&item.label)
            .bind(item.color.as_str())
            .bind(item.kind.as_str())
            .execute(&mut *tx)
            .await
            .context("Failed to save catalog item")?;
        }

        tx.commit().await.context("Failed to commit catalog")?;
        debug!(items = catalog.len(), "catalog saved");
        Ok(())
    }

    fn row_to_catalog_item(row: &sqlx::sqlite::SqliteRow) -> Result<CatalogItem> {
        let id_str: String = row.get("id");
        let color: String = row.get("color");
        let kind: String = row.get("kind");

        Ok(CatalogItem {
            id: Uuid::parse_str(&id_str).context("Invalid catalog item ID")?,
            label: row.get("label"),
            color: Color::parse(&color).context("Invalid catalog color")?,
            kind: CatalogItemKind::from_str(&kind)
                .ok_or_else(|| anyhow::anyhow!("Invalid catalog item kind: {}", kind))?,
        })
    }
}

/// Fixed-width UTC timestamps, so text order matches time order.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}
