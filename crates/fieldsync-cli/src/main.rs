//! fieldsync CLI - offline-first inspection capture from the terminal
//!
//! Captures inspections and photo evidence into the durable local store,
//! shows pending/failed work, and runs explicit sync cycles against the
//! inspection API.

use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use fieldsync_core::db::StoreService;
use fieldsync_core::models::{Evidence, Inspection, SyncStatus};
use fieldsync_core::net::NetworkMonitor;
use fieldsync_core::sync::{HttpInspectionApi, SyncEngine};
use serde::Serialize;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(about = "Capture and sync field inspection work, online or offline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,

    /// Inspection API base URL (e.g. https://api.example.com)
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new inspection (works offline)
    #[command(alias = "new")]
    Add {
        /// Inspection title
        title: String,
        /// Client name
        #[arg(long, default_value = "")]
        client: String,
        /// Site address
        #[arg(long, default_value = "")]
        address: String,
    },
    /// List inspections
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Attach photo evidence to an inspection
    Evidence {
        /// Inspection id (server or local)
        inspection_id: String,
        /// Image file to attach
        file: PathBuf,
        /// Caption shown alongside the image
        #[arg(long, default_value = "")]
        caption: String,
        /// Evidence category
        #[arg(long)]
        category: Option<String>,
        /// Technician notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show pending and failed counts
    Status,
    /// List queued mutations awaiting replay
    Queue,
    /// Reset a failed record to pending so the next cycle retries it
    Retry {
        /// Record id (inspection or evidence)
        id: String,
    },
    /// Run a sync cycle now
    Sync,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] fieldsync_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Inspection not found: {0}")]
    InspectionNotFound(String),
    #[error("No record with id {0} is in the failed state")]
    NothingToRetry(String),
    #[error("No API URL configured. Pass --api-url or set FIELDSYNC_API_URL to enable `fieldsync sync`.")]
    ApiUrlMissing,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fieldsync=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    tracing::debug!("Using database at {}", db_path.display());

    match cli.command {
        Commands::Add {
            title,
            client,
            address,
        } => run_add(&title, &client, &address, &db_path).await?,
        Commands::List { json } => run_list(json, &db_path).await?,
        Commands::Evidence {
            inspection_id,
            file,
            caption,
            category,
            notes,
        } => run_evidence(&inspection_id, &file, &caption, category, notes, &db_path).await?,
        Commands::Status => run_status(&db_path).await?,
        Commands::Queue => run_queue(&db_path).await?,
        Commands::Retry { id } => run_retry(&id, &db_path).await?,
        Commands::Sync => run_sync(&db_path, resolve_api_url(cli.api_url)?).await?,
    }

    Ok(())
}

async fn run_add(
    title: &str,
    client: &str,
    address: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let service = StoreService::open_path(db_path).await?;
    let inspection = service
        .save_inspection(&Inspection::new_local(title, client, address))
        .await?;

    println!("{}", inspection.id);
    Ok(())
}

#[derive(Debug, Serialize)]
struct InspectionListItem {
    id: String,
    title: String,
    client_name: String,
    status: String,
    sync_status: String,
    updated_at: i64,
    relative_time: String,
}

async fn run_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let service = StoreService::open_path(db_path).await?;
    let inspections = service.list_inspections().await?;

    if as_json {
        let items = inspections
            .iter()
            .map(inspection_to_list_item)
            .collect::<Vec<InspectionListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_inspection_lines(&inspections) {
            println!("{line}");
        }
    }

    Ok(())
}

async fn run_evidence(
    inspection_id: &str,
    file: &Path,
    caption: &str,
    category: Option<String>,
    notes: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let service = StoreService::open_path(db_path).await?;
    if service.get_inspection(inspection_id).await?.is_none() {
        return Err(CliError::InspectionNotFound(inspection_id.to_string()));
    }

    let content = std::fs::read(file)?;
    let file_name = file
        .file_name()
        .map_or_else(|| "evidence.bin".to_string(), |name| name.to_string_lossy().into_owned());

    let mut evidence = Evidence::new_local(inspection_id, file_name, content, caption);
    evidence.category = category;
    evidence.notes = notes;
    let saved = service.save_evidence(&evidence).await?;

    println!("{}", saved.id);
    Ok(())
}

async fn run_status(db_path: &Path) -> Result<(), CliError> {
    let service = StoreService::open_path(db_path).await?;

    let inspections = service.list_inspections().await?;
    let mut evidence_counts = StatusCounts::default();
    let mut inspection_counts = StatusCounts::default();

    for inspection in &inspections {
        inspection_counts.bump(inspection.sync_status);
        for child in service.evidence_for_inspection(&inspection.id).await? {
            evidence_counts.bump(child.sync_status);
        }
    }

    let queued = service.queue_len().await?;

    println!(
        "Inspections: {} synced, {} pending, {} failed",
        inspection_counts.synced, inspection_counts.pending, inspection_counts.failed
    );
    println!(
        "Evidence:    {} synced, {} pending, {} failed",
        evidence_counts.synced, evidence_counts.pending, evidence_counts.failed
    );
    println!("Queued mutations: {queued}");

    if inspection_counts.failed + evidence_counts.failed > 0 {
        println!("Some records failed to sync. Use `fieldsync retry <id>` to try again.");
    }
    Ok(())
}

async fn run_queue(db_path: &Path) -> Result<(), CliError> {
    let service = StoreService::open_path(db_path).await?;
    let now_ms = Utc::now().timestamp_millis();

    for mutation in service.list_mutations().await? {
        println!(
            "{:<8} {:<40} attempts={}  {}",
            mutation.method,
            mutation.url,
            mutation.attempts,
            format_relative_time(mutation.timestamp, now_ms)
        );
    }
    Ok(())
}

async fn run_retry(id: &str, db_path: &Path) -> Result<(), CliError> {
    let service = StoreService::open_path(db_path).await?;

    if let Some(inspection) = service.get_inspection(id).await? {
        if inspection.sync_status == SyncStatus::Failed {
            service
                .set_inspection_sync_status(id, SyncStatus::Pending)
                .await?;
            println!("{id}");
            return Ok(());
        }
        return Err(CliError::NothingToRetry(id.to_string()));
    }

    if let Some(evidence) = service.get_evidence(id).await? {
        if evidence.sync_status == SyncStatus::Failed {
            service
                .set_evidence_sync_status(id, SyncStatus::Pending)
                .await?;
            println!("{id}");
            return Ok(());
        }
    }

    Err(CliError::NothingToRetry(id.to_string()))
}

async fn run_sync(db_path: &Path, api_url: String) -> Result<(), CliError> {
    let service = StoreService::open_path(db_path).await?;
    let api = HttpInspectionApi::new(api_url)?;
    let monitor = NetworkMonitor::new(true);

    let engine = SyncEngine::new(service, api, monitor);
    let report = engine.sync_all().await;

    println!("{}", report.message);
    Ok(())
}

#[derive(Default)]
struct StatusCounts {
    synced: usize,
    pending: usize,
    failed: usize,
}

impl StatusCounts {
    fn bump(&mut self, status: SyncStatus) {
        match status {
            SyncStatus::Synced => self.synced += 1,
            SyncStatus::Pending => self.pending += 1,
            SyncStatus::Failed => self.failed += 1,
        }
    }
}

fn format_inspection_lines(inspections: &[Inspection]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    inspections
        .iter()
        .map(|inspection| {
            let short_id = inspection.id.chars().take(19).collect::<String>();
            let title = truncate(&inspection.title, 32);
            let relative_time = format_relative_time(inspection.updated_at, now_ms);
            format!(
                "{short_id:<19}  {title:<32}  {:<9}  {:<7}  {relative_time}",
                inspection.status.as_str(),
                inspection.sync_status.as_str()
            )
        })
        .collect()
}

fn inspection_to_list_item(inspection: &Inspection) -> InspectionListItem {
    let now_ms = Utc::now().timestamp_millis();
    InspectionListItem {
        id: inspection.id.clone(),
        title: inspection.title.clone(),
        client_name: inspection.client_name.clone(),
        status: inspection.status.as_str().to_string(),
        sync_status: inspection.sync_status.as_str().to_string(),
        updated_at: inspection.updated_at,
        relative_time: format_relative_time(inspection.updated_at, now_ms),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("FIELDSYNC_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fieldsync")
        .join("fieldsync.db")
}

fn resolve_api_url(cli_api_url: Option<String>) -> Result<String, CliError> {
    cli_api_url
        .or_else(|| env::var("FIELDSYNC_API_URL").ok().filter(|url| !url.is_empty()))
        .ok_or(CliError::ApiUrlMissing)
}
