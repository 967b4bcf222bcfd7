use clap::Parser;
use crm_core::ProgressBackendKind;
use std::path::PathBuf;

/// Server configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "crm-server")]
#[command(author, version, about = "REST API server for the TalkBI client import")]
pub struct ServerConfig {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// TalkBI API root (falls back to `talkbi.base_url` in crm-sync.toml)
    #[arg(long, env = "TALKBI_BASE_URL")]
    pub talkbi_base_url: Option<String>,

    /// TalkBI bearer token
    #[arg(long, env = "TALKBI_TOKEN", hide_env_values = true)]
    pub talkbi_token: String,

    /// Where import progress is kept: file or postgres (falls back to crm-sync.toml)
    #[arg(long, env = "PROGRESS_BACKEND")]
    pub progress_backend: Option<ProgressBackendKind>,

    /// Progress file for the file backend
    #[arg(long, env = "PROGRESS_FILE")]
    pub progress_file: Option<PathBuf>,

    /// Path to crm-sync.toml
    #[arg(long, env = "CRM_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Allowed CORS origins, comma-separated, or "*"
    #[arg(long, env = "CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,
}
