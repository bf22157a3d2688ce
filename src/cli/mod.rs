use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::debug;
use uuid::Uuid;

use crate::application::{AccountService, MoveDirection};
use crate::domain::{
    Color, Event, EventDraft, EventKind, LedgerEntry, format_cents, parse_cents, parse_quantity,
};

/// Cuentas - customer account ledger
#[derive(Parser)]
#[command(name = "cuentas")]
#[command(about = "Track product withdrawals and payments per client, with running balances")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "CUENTAS_DATABASE", default_value = "cuentas.db")]
    pub database: String,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Client management commands
    #[command(subcommand)]
    Client(ClientCommands),

    /// Record products taken by a client
    Withdraw {
        /// Client name
        client: String,

        /// Number of units
        #[arg(short, long)]
        quantity: String,

        /// Unit price (e.g., "12.50" or "12")
        #[arg(short, long)]
        price: String,

        /// Product name; catalog products also bring their color
        #[arg(long)]
        product: String,

        /// Product color (#RRGGBB), overrides the catalog color
        #[arg(long)]
        color: Option<String>,

        /// Free-text note
        #[arg(short, long)]
        notes: Option<String>,

        /// Date of the event (YYYY-MM-DD or RFC 3339, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Record a payment made by a client
    Pay {
        /// Client name
        client: String,

        /// Amount paid (e.g., "50.00" or "50")
        #[arg(allow_hyphen_values = true)]
        amount: String,

        /// Free-text note
        #[arg(short, long)]
        notes: Option<String>,

        /// Date of the event (YYYY-MM-DD or RFC 3339, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Event inspection and correction commands
    #[command(subcommand)]
    Event(EventCommands),

    /// Show a client's events with running balances
    Statement {
        /// Client name
        client: String,

        /// List the oldest event first instead of the newest
        #[arg(long)]
        oldest_first: bool,
    },

    /// Product catalog commands
    #[command(subcommand)]
    Catalog(CatalogCommands),

    /// Export data to CSV or JSON
    Export {
        /// What to export: statement, catalog
        export_type: String,

        /// Client name (required for statement)
        #[arg(long)]
        client: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format for statements: csv, json
        #[arg(short, long, default_value = "csv")]
        format: String,
    },

    /// Import data from CSV or JSON
    Import {
        /// What to import: statement (CSV), catalog (JSON)
        import_type: String,

        /// Client name (required for statement)
        #[arg(long)]
        client: Option<String>,

        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum ClientCommands {
    /// Create a new client
    Create {
        /// Client name (must be unique)
        name: String,

        /// Address
        #[arg(short, long)]
        address: Option<String>,
    },

    /// List all clients with their cached balances
    List,

    /// Show detailed client information
    Show {
        /// Client name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum EventCommands {
    /// List a client's events, oldest first
    List {
        /// Client name
        client: String,

        /// Include deleted events
        #[arg(long)]
        all: bool,
    },

    /// Show a single event
    Show {
        /// Event ID
        id: String,
    },

    /// Overwrite fields of an event; omitted fields keep their values
    Edit {
        /// Event ID
        id: String,

        /// Change the event kind: withdrawal, payment
        #[arg(long)]
        kind: Option<String>,

        #[arg(short, long)]
        quantity: Option<String>,

        #[arg(short, long)]
        price: Option<String>,

        #[arg(long)]
        product: Option<String>,

        #[arg(long)]
        color: Option<String>,

        #[arg(short, long, allow_hyphen_values = true)]
        amount: Option<String>,

        /// Replacement notes; an empty value clears them
        #[arg(short, long)]
        notes: Option<String>,

        /// New creation date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        date: Option<String>,
    },

    /// Mark an event as deleted (it stays in storage)
    Delete {
        /// Event ID
        id: String,
    },

    /// Undo a delete
    Restore {
        /// Event ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// List catalog products in display order
    List,

    /// Add a product
    Add {
        /// Product label
        label: String,

        /// Color (#RRGGBB), defaults to grey
        #[arg(short, long)]
        color: Option<String>,
    },

    /// Rename or recolor a product
    Edit {
        /// Current label
        label: String,

        /// New label
        #[arg(long)]
        rename: Option<String>,

        /// New color (#RRGGBB)
        #[arg(short, long)]
        color: Option<String>,
    },

    /// Remove a product
    Remove {
        /// Product label
        label: String,
    },

    /// Move a product one position up
    Up {
        /// Product label
        label: String,
    },

    /// Move a product one position down
    Down {
        /// Product label
        label: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        debug!(database = %self.database, "starting");

        match self.command {
            Commands::Init => {
                AccountService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Client(client_cmd) => {
                let service = AccountService::connect(&self.database).await?;
                run_client_command(&service, client_cmd).await?;
            }

            Commands::Withdraw {
                client,
                quantity,
                price,
                product,
                color,
                notes,
                date,
            } => {
                let service = AccountService::connect(&self.database).await?;
                let quantity = parse_quantity(&quantity).context("Invalid quantity")?;
                let unit_price =
                    parse_cents(&price).context("Invalid price format. Use '12.50' or '12'")?;

                let catalog = service.load_catalog().await?;
                let mut kind = match catalog.find_by_label(&product) {
                    Some(item) => EventKind::withdrawal_of(item, Some(quantity), Some(unit_price)),
                    None => EventKind::Withdrawal {
                        quantity: Some(quantity),
                        unit_price: Some(unit_price),
                        product: product.trim().to_string(),
                        product_color: None,
                    },
                };
                if let Some(color) = color {
                    if let EventKind::Withdrawal { product_color, .. } = &mut kind {
                        *product_color = Some(Color::parse(&color)?);
                    }
                }

                let draft = EventDraft::new(kind)
                    .with_notes(notes)
                    .with_created_at(parse_optional_date(date)?);
                let event = service.record_event(&client, draft).await?;
                let client = service.get_client(&client).await?;

                println!(
                    "Recorded withdrawal: {} ({})",
                    format_cents(-event.delta()),
                    event.id
                );
                println!("Balance for {}: {}", client.name, format_cents(client.balance));
            }

            Commands::Pay {
                client,
                amount,
                notes,
                date,
            } => {
                let service = AccountService::connect(&self.database).await?;
                let amount =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let draft = EventDraft::new(EventKind::Payment {
                    amount: Some(amount),
                })
                .with_notes(notes)
                .with_created_at(parse_optional_date(date)?);
                let event = service.record_event(&client, draft).await?;
                let client = service.get_client(&client).await?;

                println!(
                    "Recorded payment: {} ({})",
                    format_cents(event.delta()),
                    event.id
                );
                println!("Balance for {}: {}", client.name, format_cents(client.balance));
            }

            Commands::Event(event_cmd) => {
                let service = AccountService::connect(&self.database).await?;
                run_event_command(&service, event_cmd).await?;
            }

            Commands::Statement {
                client,
                oldest_first,
            } => {
                let service = AccountService::connect(&self.database).await?;
                run_statement_command(&service, &client, oldest_first).await?;
            }

            Commands::Catalog(catalog_cmd) => {
                let service = AccountService::connect(&self.database).await?;
                run_catalog_command(&service, catalog_cmd).await?;
            }

            Commands::Export {
                export_type,
                client,
                output,
                format,
            } => {
                let service = AccountService::connect(&self.database).await?;
                run_export_command(
                    &service,
                    &export_type,
                    client.as_deref(),
                    output.as_deref(),
                    &format,
                )
                .await?;
            }

            Commands::Import {
                import_type,
                client,
                input,
                dry_run,
            } => {
                let service = AccountService::connect(&self.database).await?;
                run_import_command(
                    &service,
                    &import_type,
                    client.as_deref(),
                    input.as_deref(),
                    dry_run,
                )
                .await?;
            }
        }

        Ok(())
    }
}

async fn run_client_command(service: &AccountService, cmd: ClientCommands) -> Result<()> {
    match cmd {
        ClientCommands::Create { name, address } => {
            let client = service.create_client(name, address).await?;
            println!("Created client: {} ({})", client.name, client.id);
        }

        ClientCommands::List => {
            let clients = service.list_clients().await?;
            if clients.is_empty() {
                println!("No clients found.");
            } else {
                println!(
                    "{:<20} {:>12} {:<12} ADDRESS",
                    "NAME", "BALANCE", "LAST EVENT"
                );
                println!("{}", "-".repeat(70));
                for client in clients {
                    let last = client
                        .last_event_at
                        .map(|dt| dt.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<20} {:>12} {:<12} {}",
                        truncate(&client.name, 20),
                        format_cents(client.balance),
                        last,
                        client.address.as_deref().unwrap_or("")
                    );
                }
            }
        }

        ClientCommands::Show { name } => {
            let info = service.get_client_info(&name).await?;
            let client = &info.client;

            println!("Client: {}", client.name);
            println!("  ID:          {}", client.id);
            if let Some(address) = &client.address {
                println!("  Address:     {}", address);
            }
            println!(
                "  Created:     {}",
                client.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!("  Balance:     {}", format_cents(client.balance));
            println!(
                "  Events:      {} ({} deleted)",
                info.active_events, info.deleted_events
            );
            if let Some(last) = client.last_event_at {
                println!("  Last event:  {}", last.format("%Y-%m-%d %H:%M:%S"));
            }
        }
    }
    Ok(())
}

async fn run_event_command(service: &AccountService, cmd: EventCommands) -> Result<()> {
    match cmd {
        EventCommands::List { client, all } => {
            let events = service.list_events(&client, all).await?;
            if events.is_empty() {
                println!("No events found.");
            } else {
                println!(
                    "{:<36} {:<12} {:<10} {:>10} FLAGS",
                    "ID", "DATE", "KIND", "DELTA"
                );
                println!("{}", "-".repeat(80));
                for event in &events {
                    println!(
                        "{:<36} {:<12} {:<10} {:>10} {}",
                        event.id,
                        event.created_at.format("%Y-%m-%d"),
                        event.kind.as_str(),
                        format_cents(event.delta()),
                        flags(event)
                    );
                }
            }
        }

        EventCommands::Show { id } => {
            let event = service.get_event(parse_event_id(&id)?).await?;
            let client = service.get_client_by_id(event.client_id).await?;
            print_event(&event, &client.name);
        }

        EventCommands::Edit {
            id,
            kind,
            quantity,
            price,
            product,
            color,
            amount,
            notes,
            date,
        } => {
            let id = parse_event_id(&id)?;
            let existing = service.get_event(id).await?;

            let kind = edited_kind(
                &existing.kind,
                kind.as_deref(),
                quantity.as_deref(),
                price.as_deref(),
                product,
                color.as_deref(),
                amount.as_deref(),
            )?;
            let draft = EventDraft::new(kind)
                .with_notes(edited_notes(existing.notes.as_deref(), notes))
                .with_created_at(parse_optional_date(date)?);

            let event = service.update_event(id, draft).await?;
            println!(
                "Updated event {}: {} {}",
                event.id,
                event.kind.as_str(),
                format_cents(event.delta())
            );
        }

        EventCommands::Delete { id } => {
            let event = service.delete_event(parse_event_id(&id)?).await?;
            println!("Deleted event: {}", event.id);
        }

        EventCommands::Restore { id } => {
            let event = service.restore_event(parse_event_id(&id)?).await?;
            println!("Restored event: {}", event.id);
        }
    }
    Ok(())
}

async fn run_statement_command(
    service: &AccountService,
    client: &str,
    oldest_first: bool,
) -> Result<()> {
    let statement = service.statement(client).await?;

    println!(
        "Statement for {}: balance {}",
        statement.client.name,
        format_cents(statement.balance())
    );
    if statement.is_empty() {
        println!("No events recorded.");
        return Ok(());
    }

    println!(
        "{:<12} {:<10} {:<24} {:>10} {:>12}",
        "DATE", "KIND", "DETAIL", "DELTA", "BALANCE"
    );
    println!("{}", "-".repeat(72));

    let entries: Box<dyn Iterator<Item = &LedgerEntry> + '_> = if oldest_first {
        Box::new(statement.entries.iter())
    } else {
        Box::new(statement.newest_first())
    };

    for entry in entries {
        let event = &entry.event;
        println!(
            "{:<12} {:<10} {:<24} {:>10} {:>12}",
            event.created_at.format("%Y-%m-%d"),
            event.kind.as_str(),
            truncate(&detail(event), 24),
            format_cents(entry.delta()),
            format_cents(entry.balance)
        );
    }
    Ok(())
}

async fn run_catalog_command(service: &AccountService, cmd: CatalogCommands) -> Result<()> {
    match cmd {
        CatalogCommands::List => {
            let catalog = service.load_catalog().await?;
            if catalog.is_empty() {
                println!("Catalog is empty.");
            } else {
                println!("{:<4} {:<24} {:<8} KIND", "#", "PRODUCT", "COLOR");
                println!("{}", "-".repeat(46));
                for (index, item) in catalog.items().iter().enumerate() {
                    println!(
                        "{:<4} {:<24} {:<8} {}",
                        index + 1,
                        truncate(&item.label, 24),
                        item.color,
                        item.kind.as_str()
                    );
                }
            }
        }

        CatalogCommands::Add { label, color } => {
            let item = service.add_catalog_item(&label, color.as_deref()).await?;
            println!("Added product: {} ({})", item.label, item.color);
        }

        CatalogCommands::Edit {
            label,
            rename,
            color,
        } => {
            let item = service
                .update_catalog_item(&label, rename.as_deref(), color.as_deref())
                .await?;
            println!("Updated product: {} ({})", item.label, item.color);
        }

        CatalogCommands::Remove { label } => {
            let item = service.remove_catalog_item(&label).await?;
            println!("Removed product: {}", item.label);
        }

        CatalogCommands::Up { label } => {
            service.move_catalog_item(&label, MoveDirection::Up).await?;
            println!("Moved up: {}", label);
        }

        CatalogCommands::Down { label } => {
            service.move_catalog_item(&label, MoveDirection::Down).await?;
            println!("Moved down: {}", label);
        }
    }
    Ok(())
}

async fn run_export_command(
    service: &AccountService,
    export_type: &str,
    client: Option<&str>,
    output: Option<&str>,
    format: &str,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "statement" => {
            let client = client.context("--client is required to export a statement")?;
            let count = match format {
                "csv" => exporter.export_statement_csv(client, writer).await?,
                "json" => exporter.export_statement_json(client, writer).await?,
                other => anyhow::bail!("Invalid format '{}'. Valid formats: csv, json", other),
            };
            if output.is_some() {
                eprintln!("Exported {} events", count);
            }
        }
        "catalog" => {
            let count = exporter.export_catalog_json(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} catalog items", count);
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: statement, catalog",
                export_type
            );
        }
    }

    Ok(())
}

async fn run_import_command(
    service: &AccountService,
    import_type: &str,
    client: Option<&str>,
    input: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    use crate::io::Importer;
    use std::fs::File;
    use std::io::{Read, stdin};

    let importer = Importer::new(service);

    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdin()),
    };

    match import_type {
        "catalog" => {
            let catalog = importer.import_catalog_json(reader, dry_run).await?;
            if dry_run {
                println!("Dry run: catalog would contain {} items", catalog.len());
            } else {
                println!("Imported catalog with {} items", catalog.len());
            }
        }
        "statement" => {
            let client = client.context("--client is required to import a statement")?;
            let result = importer
                .import_statement_csv(client, reader, dry_run)
                .await?;

            if dry_run {
                println!("Dry run: {} events would be imported", result.imported);
            } else {
                println!("Imported {} events", result.imported);
            }
            if !result.errors.is_empty() {
                eprintln!("{} rows skipped:", result.errors.len());
                for error in &result.errors {
                    match &error.field {
                        Some(field) => {
                            eprintln!("  line {} ({}): {}", error.line, field, error.error)
                        }
                        None => eprintln!("  line {}: {}", error.line, error.error),
                    }
                }
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid import type '{}'. Valid types: statement, catalog",
                import_type
            );
        }
    }

    Ok(())
}

/// A missing flag keeps the stored notes; a blank one clears them.
fn edited_notes(existing: Option<&str>, notes: Option<String>) -> Option<String> {
    match notes {
        Some(notes) if notes.trim().is_empty() => None,
        Some(notes) => Some(notes),
        None => existing.map(str::to_string),
    }
}

/// Merge edit flags over the stored kind. Switching kinds starts from empty
/// fields, so the new kind's required flags must be given.
fn edited_kind(
    existing: &EventKind,
    kind: Option<&str>,
    quantity: Option<&str>,
    price: Option<&str>,
    product: Option<String>,
    color: Option<&str>,
    amount: Option<&str>,
) -> Result<EventKind> {
    let quantity = quantity
        .map(parse_quantity)
        .transpose()
        .context("Invalid quantity")?;
    let price = price.map(parse_cents).transpose().context("Invalid price")?;
    let amount = amount
        .map(parse_cents)
        .transpose()
        .context("Invalid amount")?;
    let color = color.map(Color::parse).transpose()?;

    let target = kind.unwrap_or(existing.as_str());
    match (target, existing) {
        (
            "withdrawal",
            EventKind::Withdrawal {
                quantity: old_quantity,
                unit_price: old_price,
                product: old_product,
                product_color: old_color,
            },
        ) => Ok(EventKind::Withdrawal {
            quantity: quantity.or(*old_quantity),
            unit_price: price.or(*old_price),
            product: product.unwrap_or_else(|| old_product.clone()),
            product_color: color.or_else(|| old_color.clone()),
        }),
        ("withdrawal", EventKind::Payment { .. }) => Ok(EventKind::Withdrawal {
            quantity,
            unit_price: price,
            product: product.unwrap_or_default(),
            product_color: color,
        }),
        ("payment", EventKind::Payment { amount: old_amount }) => Ok(EventKind::Payment {
            amount: amount.or(*old_amount),
        }),
        ("payment", EventKind::Withdrawal { .. }) => Ok(EventKind::Payment { amount }),
        (other, _) => anyhow::bail!("Invalid kind '{}'. Valid kinds: withdrawal, payment", other),
    }
}

fn print_event(event: &Event, client_name: &str) {
    println!("Event: {}", event.id);
    println!("  Client:      {}", client_name);
    println!("  Kind:        {}", event.kind.as_str());
    match &event.kind {
        EventKind::Withdrawal {
            quantity,
            unit_price,
            product,
            product_color,
        } => {
            println!("  Product:     {}", product);
            if let Some(color) = product_color {
                println!("  Color:       {}", color);
            }
            println!(
                "  Quantity:    {}",
                quantity.map(|q| q.to_string()).unwrap_or_else(|| "-".into())
            );
            println!(
                "  Unit price:  {}",
                unit_price.map(format_cents).unwrap_or_else(|| "-".into())
            );
        }
        EventKind::Payment { amount } => {
            println!(
                "  Amount:      {}",
                amount.map(format_cents).unwrap_or_else(|| "-".into())
            );
        }
    }
    println!("  Effect:      {}", format_cents(event.delta()));
    if let Some(notes) = &event.notes {
        println!("  Notes:       {}", notes);
    }
    println!(
        "  Created:     {}",
        event.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  Updated:     {}",
        event.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    let flags = flags(event);
    if !flags.is_empty() {
        println!("  Flags:       {}", flags);
    }
}

fn detail(event: &Event) -> String {
    match &event.kind {
        EventKind::Withdrawal {
            quantity, product, ..
        } => match quantity {
            Some(q) => format!("{} x {}", q, product),
            None => product.clone(),
        },
        EventKind::Payment { .. } => event.notes.clone().unwrap_or_default(),
    }
}

fn flags(event: &Event) -> String {
    let mut flags = Vec::new();
    if event.edited {
        flags.push("edited");
    }
    if event.deleted {
        flags.push("deleted");
    }
    flags.join(",")
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn parse_event_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim()).context("Invalid event ID format (expected UUID)")
}

fn parse_optional_date(date: Option<String>) -> Result<Option<DateTime<Utc>>> {
    date.map(|s| {
        parse_date(&s).with_context(|| {
            format!("Invalid date format '{}'. Use YYYY-MM-DD or RFC 3339", s)
        })
    })
    .transpose()
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    use chrono::NaiveDate;

    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .context("Date must be in YYYY-MM-DD format")?;
    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Ok(DateTime::from_naive_utc_and_offset(naive_datetime, Utc))
}
