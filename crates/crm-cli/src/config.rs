use clap::{Parser, Subcommand};
use crm_core::ProgressBackendKind;
use std::path::PathBuf;
use std::sync::LazyLock;
use uuid::Uuid;

static VERSION_INFO: LazyLock<String> = LazyLock::new(|| {
    let version = env!("CARGO_PKG_VERSION");
    let built = option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown"); // YYYY-MM-DD
    let target = option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown");
    let rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown");

    format!("{version}\nbuilt: {built}\ntarget: {target}\nrustc: {rustc}")
});

pub fn version_info() -> &'static str {
    &VERSION_INFO
}

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "crm-sync")]
#[command(
    author,
    version = version_info(),
    about = "Imports TalkBI subscribers into the CRM and pushes clients back"
)]
#[command(after_help = "Examples:
  crm-sync import
  crm-sync progress
  crm-sync pause
  crm-sync sync-client 6f1c2e0a-3b5d-4c84-9a57-0e9d8f3b2a11

Progress backends:
  PROGRESS_BACKEND=file (default) - JSON file under the data directory
  PROGRESS_BACKEND=postgres       - import_progress table, shared with crm-server")]
pub struct Config {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// TalkBI API root (falls back to `talkbi.base_url` in crm-sync.toml)
    #[arg(long, env = "TALKBI_BASE_URL")]
    pub talkbi_base_url: Option<String>,

    /// TalkBI bearer token (only needed by commands that call TalkBI)
    #[arg(long, env = "TALKBI_TOKEN", hide_env_values = true)]
    pub talkbi_token: Option<String>,

    /// Where import progress is kept: file or postgres
    #[arg(long, env = "PROGRESS_BACKEND")]
    pub progress_backend: Option<ProgressBackendKind>,

    /// Progress file for the file backend
    #[arg(long, env = "PROGRESS_FILE")]
    pub progress_file: Option<PathBuf>,

    /// Path to crm-sync.toml
    #[arg(short, long, env = "CRM_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a bulk import in the foreground (Ctrl+C cancels it)
    Import,
    /// Show the stored import progress and client counts
    Progress,
    /// Ask a running import to pause before its next contact
    Pause,
    /// Resume a paused import
    Resume,
    /// Ask a running import to stop
    Cancel,
    /// Clear the progress record, e.g. after a crashed run
    Reset,
    /// Replace a client's TalkBI subscriber with a fresh one
    #[command(after_help = "Example: crm-sync sync-client 6f1c2e0a-3b5d-4c84-9a57-0e9d8f3b2a11")]
    SyncClient {
        /// Client UUID
        id: Uuid,
    },
    /// Start a TalkBI sub-flow for a linked client
    SendFlow {
        /// Client UUID
        id: Uuid,
        /// Sub-flow namespace
        flow_ns: String,
    },
}
