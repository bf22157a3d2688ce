use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::{
    Catalog, CatalogItem, Cents, Client, ClientId, Color, Event, EventDraft, EventId, Statement,
    timestamp_now, total_balance,
};
use crate::storage::Repository;

use super::AppError;

/// Application service providing the account operations.
/// This is the primary interface for any front end (CLI, API, mobile bridge).
pub struct AccountService {
    repo: Repository,
}

/// Detailed client information
pub struct ClientInfo {
    pub client: Client,
    pub active_events: i64,
    pub deleted_events: i64,
}

/// Cached figures recomputed from the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSummary {
    pub balance: Cents,
    pub last_event_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

impl AccountService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        info!(database = database_path, "database initialized");
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Client operations
    // ========================

    pub async fn create_client(
        &self,
        name: String,
        address: Option<String>,
    ) -> Result<Client, AppError> {
        let name = name.trim().to_string();
        if self.repo.get_client_by_name(&name).await?.is_some() {
            return Err(AppError::ClientAlreadyExists(name));
        }

        let mut client = Client::new(name);
        if let Some(address) = address.filter(|a| !a.trim().is_empty()) {
            client = client.with_address(address);
        }

        self.repo.save_client(&client).await?;
        info!(client = %client.name, "client created");
        Ok(client)
    }

    pub async fn get_client(&self, name: &str) -> Result<Client, AppError> {
        self.repo
            .get_client_by_name(name.trim())
            .await?
            .ok_or_else(|| AppError::ClientNotFound(name.to_string()))
    }

    pub async fn get_client_by_id(&self, id: ClientId) -> Result<Client, AppError> {
        self.repo
            .get_client(id)
            .await?
            .ok_or_else(|| AppError::ClientNotFound(id.to_string()))
    }

    pub async fn get_client_info(&self, name: &str) -> Result<ClientInfo, AppError> {
        let client = self.get_client(name).await?;
        let (active_events, deleted_events) = self.repo.count_events(client.id).await?;
        Ok(ClientInfo {
            client,
            active_events,
            deleted_events,
        })
    }

    pub async fn list_clients(&self) -> Result<Vec<Client>, AppError> {
        Ok(self.repo.list_clients().await?)
    }

    /// Recompute a client's cached balance and last-event time from the ledger.
    pub async fn refresh_client_summary(
        &self,
        client_id: ClientId,
    ) -> Result<ClientSummary, AppError> {
        let events = self.repo.list_active_events(client_id).await?;
        let summary = ClientSummary {
            balance: total_balance(&events),
            last_event_at: events.last().map(|e| e.created_at),
        };

        self.repo
            .update_client_summary(client_id, summary.balance, summary.last_event_at)
            .await?;
        debug!(%client_id, balance = summary.balance, "client summary refreshed");
        Ok(summary)
    }

    // ========================
    // Event operations
    // ========================

    /// Validate and store a new event for the named client.
    pub async fn record_event(
        &self,
        client_name: &str,
        draft: EventDraft,
    ) -> Result<Event, AppError> {
        draft.validate().map_err(AppError::InvalidEvent)?;
        let client = self.get_client(client_name).await?;

        let event = draft.into_event(client.id);
        self.repo.save_event(&event).await?;
        info!(
            client = %client.name,
            event_id = %event.id,
            kind = event.kind.as_str(),
            delta = event.delta(),
            "event recorded"
        );

        self.refresh_client_summary(client.id).await?;
        Ok(event)
    }

    /// Overwrite an existing event with the submitted fields.
    /// The event keeps its id and owner and is flagged as edited.
    pub async fn update_event(&self, id: EventId, draft: EventDraft) -> Result<Event, AppError> {
        draft.validate().map_err(AppError::InvalidEvent)?;
        let mut event = self.get_event(id).await?;

        draft.apply_to(&mut event, timestamp_now());
        self.repo.save_event(&event).await?;
        info!(event_id = %event.id, kind = event.kind.as_str(), "event updated");

        self.refresh_client_summary(event.client_id).await?;
        Ok(event)
    }

    /// Soft-delete an event. It stays in storage but leaves the ledger.
    pub async fn delete_event(&self, id: EventId) -> Result<Event, AppError> {
        self.set_deleted(id, true).await
    }

    /// Bring a soft-deleted event back into the ledger.
    pub async fn restore_event(&self, id: EventId) -> Result<Event, AppError> {
        self.set_deleted(id, false).await
    }

    async fn set_deleted(&self, id: EventId, deleted: bool) -> Result<Event, AppError> {
        let mut event = self.get_event(id).await?;
        if event.deleted == deleted {
            return Ok(event);
        }

        let now = timestamp_now();
        self.repo.set_event_deleted(id, deleted, now).await?;
        event.deleted = deleted;
        event.updated_at = now;
        info!(event_id = %id, deleted, "event deleted flag changed");

        self.refresh_client_summary(event.client_id).await?;
        Ok(event)
    }

    pub async fn get_event(&self, id: EventId) -> Result<Event, AppError> {
        self.repo
            .get_event(id)
            .await?
            .ok_or(AppError::EventNotFound(id))
    }

    /// Events of a client, oldest first. Soft-deleted ones only on request.
    pub async fn list_events(
        &self,
        client_name: &str,
        include_deleted: bool,
    ) -> Result<Vec<Event>, AppError> {
        let client = self.get_client(client_name).await?;
        let events = if include_deleted {
            self.repo.list_all_events(client.id).await?
        } else {
            self.repo.list_active_events(client.id).await?
        };
        Ok(events)
    }

    /// The client's ledger with running balances, oldest entry first.
    pub async fn statement(&self, client_name: &str) -> Result<Statement, AppError> {
        let client = self.get_client(client_name).await?;
        let events = self.repo.list_active_events(client.id).await?;
        let statement = Statement::new(client, events);

        if statement.balance() != statement.client.balance {
            debug!(
                client = %statement.client.name,
                cached = statement.client.balance,
                ledger = statement.balance(),
                "cached balance differs from ledger"
            );
        }
        Ok(statement)
    }

    // ========================
    // Catalog operations
    // ========================

    pub async fn load_catalog(&self) -> Result<Catalog, AppError> {
        Ok(self.repo.load_catalog().await?)
    }

    pub async fn save_catalog(&self, catalog: &Catalog) -> Result<(), AppError> {
        self.repo.save_catalog(catalog).await?;
        info!(items = catalog.len(), "catalog saved");
        Ok(())
    }

    /// Look up a catalog item by label in an already loaded catalog.
    pub fn find_catalog_item<'a>(
        catalog: &'a Catalog,
        label: &str,
    ) -> Result<&'a CatalogItem, AppError> {
        catalog
            .find_by_label(label)
            .ok_or_else(|| AppError::CatalogItemNotFound(label.to_string()))
    }

    pub async fn add_catalog_item(
        &self,
        label: &str,
        color: Option<&str>,
    ) -> Result<CatalogItem, AppError> {
        let label = label.trim();
        let color = color.map(Color::parse).transpose()?.unwrap_or_default();

        let mut catalog = self.load_catalog().await?;
        if catalog.find_by_label(label).is_some() {
            return Err(AppError::CatalogItemAlreadyExists(label.to_string()));
        }

        let item = catalog.add(label, color).clone();
        self.save_catalog(&catalog).await?;
        Ok(item)
    }

    /// Rename and/or recolor an item. A missing color keeps the current one.
    pub async fn update_catalog_item(
        &self,
        label: &str,
        new_label: Option<&str>,
        color: Option<&str>,
    ) -> Result<CatalogItem, AppError> {
        let mut catalog = self.load_catalog().await?;
        let item = Self::find_catalog_item(&catalog, label)?.clone();

        if let Some(new_label) = new_label.map(str::trim).filter(|l| !l.is_empty()) {
            let taken = catalog
                .find_by_label(new_label)
                .is_some_and(|other| other.id != item.id);
            if taken {
                return Err(AppError::CatalogItemAlreadyExists(new_label.to_string()));
            }
        }

        let color = match color {
            Some(c) => Color::parse(c)?,
            None => item.color.clone(),
        };
        catalog.update(item.id, new_label.unwrap_or(""), color);
        self.save_catalog(&catalog).await?;

        catalog
            .get(item.id)
            .cloned()
            .ok_or_else(|| AppError::CatalogItemNotFound(label.to_string()))
    }

    pub async fn remove_catalog_item(&self, label: &str) -> Result<CatalogItem, AppError> {
        let mut catalog = self.load_catalog().await?;
        let id = Self::find_catalog_item(&catalog, label)?.id;

        let removed = catalog
            .remove(id)
            .ok_or_else(|| AppError::CatalogItemNotFound(label.to_string()))?;
        self.save_catalog(&catalog).await?;
        Ok(removed)
    }

    pub async fn move_catalog_item(
        &self,
        label: &str,
        direction: MoveDirection,
    ) -> Result<Catalog, AppError> {
        let mut catalog = self.load_catalog().await?;
        let id = Self::find_catalog_item(&catalog, label)?.id;

        let moved = match direction {
            MoveDirection::Up => catalog.move_up(id),
            MoveDirection::Down => catalog.move_down(id),
        };
        if !moved {
            return Err(AppError::CatalogMoveOutOfRange(id));
        }

        self.save_catalog(&catalog).await?;
        Ok(catalog)
    }
}
