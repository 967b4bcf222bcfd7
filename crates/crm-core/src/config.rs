use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Default number of contacts requested per page from TalkBI.
pub const PAGE_LIMIT: u32 = 100;

/// Default number of contacts processed per batch.
pub const BATCH_SIZE: usize = 50;

/// Default number of contacts between status message refreshes.
pub const STATUS_INTERVAL: u64 = 10;

/// Database connection pool configuration.
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

/// HTTP client configuration for external API calls.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Upper bound for any single backoff, including server-sent `Retry-After`.
    pub max_retry_delay: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

/// Tuning knobs for a bulk import run.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Contacts requested per page.
    pub page_limit: u32,
    /// Contacts per processing batch; `processed_in_current_batch` resets at each boundary.
    pub batch_size: usize,
    /// Refresh the status message every this many contacts.
    pub status_interval: u64,
    /// Sleep between progress reads while an import is paused.
    pub pause_poll_interval: Duration,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            page_limit: PAGE_LIMIT,
            batch_size: BATCH_SIZE,
            status_interval: STATUS_INTERVAL,
            pause_poll_interval: Duration::from_secs(1),
        }
    }
}

impl ImportConfig {
    /// Returns a config with a custom page size.
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.max(1);
        self
    }

    /// Returns a config with a custom batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Returns a config with a custom status refresh interval.
    pub fn with_status_interval(mut self, every: u64) -> Self {
        self.status_interval = every.max(1);
        self
    }

    /// Returns a config with a custom pause poll interval.
    pub fn with_pause_poll_interval(mut self, interval: Duration) -> Self {
        self.pause_poll_interval = interval;
        self
    }
}

// =============================================================================
// Progress backend selection
// =============================================================================

/// Where import progress is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressBackendKind {
    /// JSON file on local disk (default).
    #[default]
    File,
    /// Row in the `import_progress` table.
    Postgres,
}

impl fmt::Display for ProgressBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

impl FromStr for ProgressBackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "postgres" | "postgresql" | "db" => Ok(Self::Postgres),
            _ => Err(AppError::ConfigError(format!(
                "Unknown progress backend: '{}'. Valid options: file, postgres",
                s
            ))),
        }
    }
}

/// File name of the progress record under the data directory.
pub const PROGRESS_FILE_NAME: &str = "import-progress.json";

/// Returns the default progress file path.
///
/// Path: `~/.local/share/crm-sync/import-progress.json` on Linux.
pub fn default_progress_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("crm-sync").join(PROGRESS_FILE_NAME))
}

// =============================================================================
// Settings file (crm-sync.toml)
// =============================================================================

/// Root structure of `crm-sync.toml`.
///
/// Every section is optional; missing values fall back to the defaults above.
///
/// # Example
///
/// ```toml
/// [talkbi]
/// base_url = "https://api.talkbi.com.br/api"
///
/// [import]
/// page_limit = 100
/// batch_size = 50
/// status_interval = 10
/// pause_poll_interval_ms = 1000
///
/// [progress]
/// backend = "file"
/// path = "/var/lib/crm-sync/import-progress.json"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub talkbi: TalkbiSettings,
    #[serde(default)]
    pub import: ImportSettings,
    #[serde(default)]
    pub progress: ProgressSettings,
}

/// `[talkbi]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TalkbiSettings {
    pub base_url: Option<String>,
}

/// `[import]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSettings {
    pub page_limit: Option<u32>,
    pub batch_size: Option<usize>,
    pub status_interval: Option<u64>,
    pub pause_poll_interval_ms: Option<u64>,
}

/// `[progress]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressSettings {
    #[serde(default)]
    pub backend: ProgressBackendKind,
    pub path: Option<PathBuf>,
}

impl Settings {
    /// Builds an [`ImportConfig`] from the `[import]` section, keeping defaults
    /// for anything left unset.
    pub fn import_config(&self) -> ImportConfig {
        let mut config = ImportConfig::default();
        if let Some(limit) = self.import.page_limit {
            config = config.with_page_limit(limit);
        }
        if let Some(size) = self.import.batch_size {
            config = config.with_batch_size(size);
        }
        if let Some(every) = self.import.status_interval {
            config = config.with_status_interval(every);
        }
        if let Some(ms) = self.import.pause_poll_interval_ms {
            config = config.with_pause_poll_interval(Duration::from_millis(ms));
        }
        config
    }

    /// Progress file path: the configured one, else the platform default.
    pub fn progress_path(&self) -> Option<PathBuf> {
        self.progress.path.clone().or_else(default_progress_path)
    }
}

/// Default settings file name.
pub const CONFIG_FILE_NAME: &str = "crm-sync.toml";

/// Returns the default configuration directory path: `~/.config/crm-sync/`.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("crm-sync"))
}

/// Returns the default settings file path: `~/.config/crm-sync/crm-sync.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join(CONFIG_FILE_NAME))
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# crm-sync configuration
#
# Environment variables (TALKBI_BASE_URL, TALKBI_TOKEN, DATABASE_URL,
# PROGRESS_BACKEND, PROGRESS_FILE) take precedence over this file.

[talkbi]
# base_url = "https://api.talkbi.com.br/api"

[import]
page_limit = 100
batch_size = 50
status_interval = 10
pause_poll_interval_ms = 1000

[progress]
# "file" keeps progress in a JSON file, "postgres" in the import_progress table.
backend = "file"
# path = "/var/lib/crm-sync/import-progress.json"
"#;

/// Load settings from a TOML file.
///
/// # Arguments
/// * `path` - Optional custom path. If `None`, uses the default XDG path.
///
/// # Returns
/// * `Ok(Some(settings))` - Settings loaded successfully
/// * `Ok(None)` - No settings file and none could be created
/// * `Err(e)` - The file exists but is invalid, or a custom path is missing
///
/// A commented template is written the first time the default path is used.
pub fn load_settings(path: Option<PathBuf>) -> Result<Option<Settings>, AppError> {
    let using_default_path = path.is_none();
    let config_path = match path {
        Some(p) => p,
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    if !config_path.exists() {
        if using_default_path {
            if let Err(e) = create_default_config(&config_path) {
                tracing::warn!("Could not create default config template: {}", e);
                return Ok(None);
            }
        } else {
            return Err(AppError::ConfigError(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        AppError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    let settings: Settings = toml::from_str(&content).map_err(|e| {
        AppError::ConfigError(format!(
            "Invalid TOML in '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    Ok(Some(settings))
}

fn create_default_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    tracing::info!("Created default config template at: {}", path.display());

    Ok(())
}
