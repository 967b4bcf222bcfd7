use tokio_util::sync::CancellationToken;

use crm_core::{ClientSyncService, ImportConfig, ImportService};
use crm_db::{ClientRepository, ProgressBackend};
use crm_talkbi::TalkbiClient;

/// Import service as wired by the server.
pub type ServerImportService = ImportService<TalkbiClient, ClientRepository, ProgressBackend>;

/// Single-client sync service as wired by the server.
pub type ServerClientSyncService = ClientSyncService<ClientRepository, TalkbiClient>;

/// Shared application state for all handlers.
///
/// Axum clones the state for every request; every field is a cheap handle
/// (`PgPool`, `reqwest::Client` and `Arc`s inside).
#[derive(Clone)]
pub struct AppState {
    /// Bulk import and its pause/resume/cancel controls
    pub import_service: ServerImportService,

    /// Pushes single clients to TalkBI
    pub client_sync_service: ServerClientSyncService,

    /// Client repository for health checks
    pub client_repo: ClientRepository,

    /// Cancelled on shutdown; a running import stops at its next check point
    pub shutdown_token: CancellationToken,
}

impl AppState {
    pub fn new(
        pool: sqlx::PgPool,
        talkbi: TalkbiClient,
        progress: ProgressBackend,
        import_config: ImportConfig,
        shutdown_token: CancellationToken,
    ) -> Self {
        let client_repo = ClientRepository::new(pool);

        Self {
            import_service: ImportService::with_config(
                talkbi.clone(),
                client_repo.clone(),
                progress,
                import_config,
            ),
            client_sync_service: ClientSyncService::new(client_repo.clone(), talkbi),
            client_repo,
            shutdown_token,
        }
    }
}
