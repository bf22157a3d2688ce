mod common;

use anyhow::Result;
use common::{StandardClients, payment, test_service, withdrawal};
use cuentas::domain::CatalogItemKind;
use cuentas::io::{CatalogDocument, Exporter, Importer, StatementSnapshot};

async fn seeded_service() -> Result<(cuentas::application::AccountService, tempfile::TempDir)> {
    let (service, temp) = test_service().await?;
    StandardClients::create(&service).await?;
    service
        .record_event("Rosa", withdrawal(2, 1000, "Soda", "2024-01-01"))
        .await?;
    service
        .record_event(
            "Rosa",
            payment(500, "2024-01-02").with_notes(Some("cash, partial".into())),
        )
        .await?;
    Ok((service, temp))
}

#[tokio::test]
async fn test_export_statement_csv() -> Result<()> {
    let (service, _temp) = seeded_service().await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service)
        .export_statement_csv("Rosa", &mut buffer)
        .await?;
    assert_eq!(count, 2);

    let mut reader = csv::Reader::from_reader(buffer.as_slice());
    let headers = reader.headers()?.clone();
    assert_eq!(&headers[9], "balance_cents");

    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][2], "withdrawal");
    assert_eq!(&rows[0][8], "-2000");
    assert_eq!(&rows[0][9], "-2000");
    assert_eq!(&rows[1][2], "payment");
    assert_eq!(&rows[1][9], "-1500");
    assert_eq!(&rows[1][10], "cash, partial");

    Ok(())
}

#[tokio::test]
async fn test_export_statement_json() -> Result<()> {
    let (service, _temp) = seeded_service().await?;

    let mut buffer = Vec::new();
    Exporter::new(&service)
        .export_statement_json("Rosa", &mut buffer)
        .await?;

    let snapshot: StatementSnapshot = serde_json::from_slice(&buffer)?;
    assert_eq!(snapshot.client.name, "Rosa");
    assert_eq!(snapshot.balance, -1500);
    assert_eq!(snapshot.entries.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_statement_csv_reimports_into_other_client() -> Result<()> {
    let (service, _temp) = seeded_service().await?;

    let mut buffer = Vec::new();
    Exporter::new(&service)
        .export_statement_csv("Rosa", &mut buffer)
        .await?;

    let importer = Importer::new(&service);

    let preview = importer
        .import_statement_csv("Tienda Sur", buffer.as_slice(), true)
        .await?;
    assert_eq!(preview.imported, 2);
    assert!(service.list_events("Tienda Sur", true).await?.is_empty());

    let result = importer
        .import_statement_csv("Tienda Sur", buffer.as_slice(), false)
        .await?;
    assert_eq!(result.imported, 2);
    assert!(result.errors.is_empty());

    let statement = service.statement("Tienda Sur").await?;
    assert_eq!(statement.balance(), -1500);
    assert_eq!(
        statement.entries[1].event.notes.as_deref(),
        Some("cash, partial")
    );

    Ok(())
}

#[tokio::test]
async fn test_import_statement_reports_bad_rows() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClients::create(&service).await?;

    let csv_data = "\
id,created_at,kind,product,product_color,quantity,unit_price_cents,amount_cents,delta_cents,balance_cents,notes
,2024-01-01T00:00:00Z,payment,,,,,1000,,,
,not-a-date,payment,,,,,1000,,,
,2024-01-02T00:00:00Z,withdrawal,,,1,100,,,,
";

    let result = Importer::new(&service)
        .import_statement_csv("Rosa", csv_data.as_bytes(), false)
        .await?;

    assert_eq!(result.imported, 1);
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.errors[0].line, 3);
    assert_eq!(result.errors[0].field.as_deref(), Some("created_at"));
    assert_eq!(result.errors[1].line, 4);
    assert_eq!(service.get_client("Rosa").await?.balance, 1000);

    Ok(())
}

#[tokio::test]
async fn test_catalog_json_round_trip() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.add_catalog_item("Soda", Some("#ff0000")).await?;
    service.add_catalog_item("Water", None).await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service)
        .export_catalog_json(&mut buffer)
        .await?;
    assert_eq!(count, 2);

    let document: CatalogDocument = serde_json::from_slice(&buffer)?;
    assert_eq!(document.items[0].label, "Soda");

    let (other, _other_temp) = test_service().await?;
    let catalog = Importer::new(&other)
        .import_catalog_json(buffer.as_slice(), false)
        .await?;
    assert_eq!(catalog.len(), 2);
    assert_eq!(other.load_catalog().await?, service.load_catalog().await?);

    Ok(())
}

#[tokio::test]
async fn test_catalog_import_accepts_original_item_kinds() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let json = r##"{"items": [
        {"id": "0.48213377102934", "input": "Soda", "color": "#FF0000", "tipo": "input"},
        {"id": "0.9120455671", "input": "Cobro", "color": "#00AA00", "tipo": "entrego"}
    ]}"##;

    let catalog = Importer::new(&service)
        .import_catalog_json(json.as_bytes(), true)
        .await?;
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.items()[0].label, "Soda");
    assert_eq!(catalog.items()[0].kind, CatalogItemKind::Input);
    assert_eq!(catalog.items()[1].color.as_str(), "#00aa00");
    assert_eq!(catalog.items()[1].kind, CatalogItemKind::Payment);
    assert_ne!(catalog.items()[0].id, catalog.items()[1].id);
    assert!(service.load_catalog().await?.is_empty(), "dry run writes nothing");

    let saved = Importer::new(&service)
        .import_catalog_json(json.as_bytes(), false)
        .await?;
    assert_eq!(service.load_catalog().await?, saved);

    Ok(())
}
