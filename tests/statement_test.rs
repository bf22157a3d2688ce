mod common;

use anyhow::Result;
use common::{StandardClients, parse_date, payment, test_service, withdrawal};
use cuentas::domain::{Cents, EventDraft, EventKind};

#[tokio::test]
async fn test_statement_running_balances() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClients::create(&service).await?;

    service
        .record_event("Rosa", withdrawal(2, 1000, "Soda", "2024-01-01"))
        .await?;
    service
        .record_event("Rosa", payment(500, "2024-01-02"))
        .await?;
    service
        .record_event(
            "Rosa",
            EventDraft::new(EventKind::Payment { amount: Some(0) })
                .with_created_at(Some(parse_date("2024-01-03"))),
        )
        .await?;

    let statement = service.statement("Rosa").await?;
    let balances: Vec<Cents> = statement.entries.iter().map(|e| e.balance).collect();

    assert_eq!(balances, vec![-2000, -1500, -1500]);
    assert_eq!(statement.balance(), -1500);
    assert_eq!(statement.client.balance, -1500);

    Ok(())
}

#[tokio::test]
async fn test_statement_orders_by_creation_time_not_insertion() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClients::create(&service).await?;

    // Backdated payment recorded after a later withdrawal
    service
        .record_event("Rosa", withdrawal(1, 300, "Water", "2024-05-10"))
        .await?;
    service
        .record_event("Rosa", payment(1000, "2024-05-01"))
        .await?;

    let statement = service.statement("Rosa").await?;
    let balances: Vec<Cents> = statement.entries.iter().map(|e| e.balance).collect();
    assert_eq!(balances, vec![1000, 700]);

    let newest: Vec<Cents> = statement.newest_first().map(|e| e.balance).collect();
    assert_eq!(newest, vec![700, 1000]);

    Ok(())
}

#[tokio::test]
async fn test_statement_excludes_deleted_events() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClients::create(&service).await?;

    service
        .record_event("Rosa", payment(1000, "2024-01-01"))
        .await?;
    let mistake = service
        .record_event("Rosa", withdrawal(10, 1000, "Beer", "2024-01-02"))
        .await?;
    service
        .record_event("Rosa", withdrawal(1, 250, "Water", "2024-01-03"))
        .await?;

    service.delete_event(mistake.id).await?;

    let statement = service.statement("Rosa").await?;
    assert_eq!(statement.entries.len(), 2);
    assert!(statement.entries.iter().all(|e| e.event.id != mistake.id));

    let balances: Vec<Cents> = statement.entries.iter().map(|e| e.balance).collect();
    assert_eq!(balances, vec![1000, 750]);

    Ok(())
}

#[tokio::test]
async fn test_empty_statement() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClients::create(&service).await?;

    let statement = service.statement("Tienda Sur").await?;
    assert!(statement.is_empty());
    assert_eq!(statement.balance(), 0);

    Ok(())
}

#[tokio::test]
async fn test_client_cache_tracks_ledger() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClients::create(&service).await?;

    let first = service
        .record_event("Rosa", withdrawal(4, 500, "Soda", "2024-06-01"))
        .await?;
    let rosa = service.get_client("Rosa").await?;
    assert_eq!(rosa.balance, -2000);
    assert_eq!(rosa.last_event_at, Some(parse_date("2024-06-01")));

    service
        .record_event("Rosa", payment(2000, "2024-06-15"))
        .await?;
    let rosa = service.get_client("Rosa").await?;
    assert_eq!(rosa.balance, 0);
    assert_eq!(rosa.last_event_at, Some(parse_date("2024-06-15")));

    service.delete_event(first.id).await?;
    let rosa = service.get_client("Rosa").await?;
    assert_eq!(rosa.balance, 2000);

    let summary = service.refresh_client_summary(rosa.id).await?;
    assert_eq!(summary.balance, 2000);
    assert_eq!(summary.last_event_at, Some(parse_date("2024-06-15")));

    Ok(())
}

#[tokio::test]
async fn test_stored_missing_numbers_count_as_zero() -> Result<()> {
    use cuentas::Repository;
    use cuentas::domain::Event;

    let (service, temp) = test_service().await?;
    StandardClients::create(&service).await?;
    let rosa = service.get_client("Rosa").await?;

    // Bypass form validation, as an older client app would have
    let db_url = format!("sqlite:{}", temp.path().join("test.db").display());
    let repo = Repository::connect(&db_url).await?;
    repo.save_event(
        &Event::withdrawal(rosa.id, Some(2), Some(1000), "Soda")
            .with_created_at(parse_date("2024-01-01")),
    )
    .await?;
    repo.save_event(&Event::payment(rosa.id, Some(500)).with_created_at(parse_date("2024-01-02")))
        .await?;
    repo.save_event(
        &Event::withdrawal(rosa.id, Some(1), None, "Water")
            .with_created_at(parse_date("2024-01-03")),
    )
    .await?;

    let statement = service.statement("Rosa").await?;
    let deltas: Vec<Cents> = statement.entries.iter().map(|e| e.delta()).collect();
    let balances: Vec<Cents> = statement.entries.iter().map(|e| e.balance).collect();

    assert_eq!(deltas, vec![-2000, 500, 0]);
    assert_eq!(balances, vec![-2000, -1500, -1500]);

    Ok(())
}
