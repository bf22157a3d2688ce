// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use cuentas::application::AccountService;
use cuentas::domain::{EventDraft, EventKind};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(AccountService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = AccountService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

pub fn withdrawal(quantity: i64, unit_price: i64, product: &str, date: &str) -> EventDraft {
    EventDraft::new(EventKind::Withdrawal {
        quantity: Some(quantity),
        unit_price: Some(unit_price),
        product: product.to_string(),
        product_color: None,
    })
    .with_created_at(Some(parse_date(date)))
}

pub fn payment(amount: i64, date: &str) -> EventDraft {
    EventDraft::new(EventKind::Payment {
        amount: Some(amount),
    })
    .with_created_at(Some(parse_date(date)))
}

/// Test fixture: clients used across tests
pub struct StandardClients;

impl StandardClients {
    pub async fn create(service: &AccountService) -> Result<()> {
        service
            .create_client("Rosa".into(), Some("Calle 5 #120".into()))
            .await?;
        service.create_client("Tienda Sur".into(), None).await?;
        Ok(())
    }
}
