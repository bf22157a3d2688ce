use thiserror::Error;

use crate::domain::{CatalogItemId, ColorError, EventId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    #[error("Client already exists: {0}")]
    ClientAlreadyExists(String),

    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Catalog item not found: {0}")]
    CatalogItemNotFound(String),

    #[error("Catalog item already exists: {0}")]
    CatalogItemAlreadyExists(String),

    #[error(transparent)]
    InvalidColor(#[from] ColorError),

    #[error("Catalog item {0} cannot be moved further")]
    CatalogMoveOutOfRange(CatalogItemId),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
