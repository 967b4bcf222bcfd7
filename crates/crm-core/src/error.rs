use thiserror::Error;
use uuid::Uuid;

/// Application-wide error types.
///
/// Every library crate in the workspace reports failures through this enum.
/// Binaries wrap it with `anyhow` for top-level context, the HTTP server maps
/// it onto status codes.
///
/// # Error Conversion
///
/// Most errors automatically convert from their source types using the `#[from]` attribute:
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
/// - `std::io::Error` → `AppError::IoError`
///
/// # Examples
///
/// ```no_run
/// use crm_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::Generic("Something went wrong".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// Wraps connection failures, query errors and constraint violations
    /// raised by SQLx.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// The TalkBI API answered with a non-success status or the request
    /// could not be completed.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Local filesystem operation failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The API returned a 2xx response whose body does not have the expected shape.
    #[error("Malformed response from API: {0}")]
    MalformedResponse(String),

    /// Network or connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimitExceeded,

    /// Local client record does not exist.
    #[error("Client not found: {0}")]
    ClientNotFound(Uuid),

    /// Local client has no TalkBI subscriber attached.
    #[error("Client {0} is not linked to a TalkBI subscriber")]
    NotLinked(Uuid),

    /// A bulk import is already in progress.
    #[error("An import is already running")]
    ImportAlreadyRunning,

    /// Progress record could not be loaded or saved.
    #[error("Progress store error: {0}")]
    ProgressStoreError(String),

    /// Configuration file or environment error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Check DATABASE_URL."
                        .to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::ClientError(msg) => {
                if msg.contains("HTTP 401") || msg.contains("HTTP 403") {
                    "TalkBI rejected the credentials.\n   Check your TALKBI_TOKEN environment variable."
                        .to_string()
                } else {
                    format!("TalkBI API error: {}", msg)
                }
            }
            AppError::MalformedResponse(msg) => {
                format!(
                    "TalkBI returned an unexpected payload: {}\n   The API may have changed.",
                    msg
                )
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   TalkBI may be overloaded. Try again later.",
                    secs
                )
            }
            AppError::RateLimitExceeded => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            AppError::ImportAlreadyRunning => {
                "An import is already running.\n   Use `crm-sync progress` to follow it, or `crm-sync reset` if it is stale."
                    .to_string()
            }
            AppError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n   Check your configuration file.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use crm_core::error::AppError;
    ///
    /// let err = AppError::NetworkError("connection reset".to_string());
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::RateLimitExceeded;
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::MalformedResponse("missing data".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded
        )
    }
}
