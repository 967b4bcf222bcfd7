mod config;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

use crm_core::{
    ClientSyncResult, ClientSyncService, DbConfig, ImportControl, ImportProgress, ImportService,
    ImportStatus, ImportSummary, Settings, TracingReporter, load_settings,
};
use crm_db::{ClientCounts, ClientRepository, ProgressBackend};
use crm_talkbi::TalkbiClient;

use config::{Command, Config};

type CliImportService = ImportService<TalkbiClient, ClientRepository, ProgressBackend>;

const RULE: &str = "═══════════════════════════════════════════════════════";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = Config::parse();
    let settings = load_settings(config.config.clone())?.unwrap_or_default();

    info!("Connecting to database...");
    let db_config = DbConfig::default();
    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let repo = ClientRepository::new(pool.clone());

    let backend_kind = config.progress_backend.unwrap_or(settings.progress.backend);
    let progress_file = config
        .progress_file
        .clone()
        .or_else(|| settings.progress.path.clone());
    let progress = ProgressBackend::open(backend_kind, &pool, progress_file)?;

    let control = ImportControl::new(progress.clone());

    match &config.command {
        Command::Import => {
            let import_service = ImportService::with_config(
                talkbi_client(&config, &settings)?,
                repo,
                progress,
                settings.import_config(),
            );
            run_import(&import_service).await?;
        }
        Command::Progress => {
            let snapshot = control.progress().await;
            let counts = repo.counts().await?;
            print_progress(&snapshot, Some(counts));
        }
        Command::Pause => {
            let snapshot = control.pause().await;
            if !snapshot.is_paused {
                warn!("No import is running; nothing to pause");
            }
            print_progress(&snapshot, None);
        }
        Command::Resume => print_progress(&control.resume().await, None),
        Command::Cancel => print_progress(&control.cancel().await, None),
        Command::Reset => {
            let snapshot = control.reset().await;
            info!("Progress record reset");
            print_progress(&snapshot, None);
        }
        Command::SyncClient { id } => {
            let service = ClientSyncService::new(repo, talkbi_client(&config, &settings)?);
            sync_client(&service, *id).await?;
        }
        Command::SendFlow { id, flow_ns } => {
            let service = ClientSyncService::new(repo, talkbi_client(&config, &settings)?);
            service
                .send_flow(*id, flow_ns)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("Sub-flow '{}' sent to client {}", flow_ns, id);
        }
    }

    Ok(())
}

fn talkbi_client(config: &Config, settings: &Settings) -> anyhow::Result<TalkbiClient> {
    let base_url = config
        .talkbi_base_url
        .clone()
        .or_else(|| settings.talkbi.base_url.clone())
        .context("TalkBI base URL not set: use TALKBI_BASE_URL or [talkbi] base_url")?;
    let token = config
        .talkbi_token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .context("TALKBI_TOKEN is required for this command")?;

    TalkbiClient::new(&base_url, token).context("Failed to initialize TalkBI client")
}

/// Runs the import in this process; Ctrl+C records it as cancelled.
async fn run_import(service: &CliImportService) -> anyhow::Result<()> {
    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, stopping after the current contact...");
            signal_token.cancel();
        }
    });

    let summary = service
        .run_bulk_import_with_progress(&TracingReporter, cancel_token)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    print_import_summary(&summary);
    Ok(())
}

async fn sync_client(
    service: &ClientSyncService<ClientRepository, TalkbiClient>,
    id: Uuid,
) -> anyhow::Result<()> {
    match service.sync_client(id).await {
        ClientSyncResult::Synced {
            external_id,
            replaced,
            ..
        } => {
            match replaced {
                Some(old) => println!("Client {} relinked: {} → {}", id, old, external_id),
                None => println!("Client {} linked to {}", id, external_id),
            }
            Ok(())
        }
        ClientSyncResult::Failed { stage, message, .. } => {
            anyhow::bail!("Sync of client {} failed at {}: {}", id, stage.as_str(), message)
        }
    }
}

fn print_import_summary(summary: &ImportSummary) {
    let title = match summary.status {
        ImportStatus::Completed => "IMPORT COMPLETE",
        ImportStatus::Cancelled => "IMPORT CANCELLED",
    };
    let stats = &summary.stats;

    info!("");
    info!("{}", RULE);
    info!("{}", title);
    info!("{}", RULE);
    info!("  Collected:           {}", summary.collected);
    info!("  + Created:           {}", stats.created);
    info!("  ↑ Updated:           {}", stats.updated);
    info!("  = Skipped:           {}", stats.skipped);
    info!("  ✗ Failed:            {}", stats.failed);
    info!("───────────────────────────────────────────────────────");
    info!("  Total processed:     {}", stats.total());
    info!("{}", RULE);

    if summary.status == ImportStatus::Completed && stats.failed == 0 {
        info!("All contacts processed successfully!");
    }
}

fn print_progress(progress: &ImportProgress, counts: Option<ClientCounts>) {
    println!("\nImport progress\n");
    println!("  Phase:                 {}", progress.phase);
    println!("  Status:                {}", progress.status_message);
    println!(
        "  Processed:             {}/{} ({}%)",
        progress.processed_totally, progress.total_to_process, progress.percent_complete
    );
    println!(
        "  Created/updated:       {}/{}",
        progress.created_count, progress.updated_count
    );
    println!(
        "  Skipped/failed:        {}/{}",
        progress.skipped_count, progress.failed_count
    );
    println!(
        "  Running:               {}{}",
        progress.is_running,
        if progress.is_paused { " (paused)" } else { "" }
    );
    if let Some(started) = progress.started_at {
        println!("  Started:               {}", started);
    }
    if let Some(finished) = progress.finished_at {
        println!("  Finished:              {}", finished);
    }
    if let Some(counts) = counts {
        println!(
            "  Clients:               {} ({} linked to TalkBI)",
            counts.total, counts.linked
        );
    }
    println!();
}
