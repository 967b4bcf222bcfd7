//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::dto::{
    ClientSyncResponse, HealthResponse, ImportProgressResponse, SendFlowRequest, ServiceStatus,
};
use crate::handlers::{clients, health, import};

/// OpenAPI documentation for the CRM sync API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "CRM Sync API",
        version = "1.0.0",
        description = "Imports TalkBI subscribers into the local client table and pushes
clients back to TalkBI.

## Import lifecycle

`idle` → `collecting` → `processing` → `completed`, or `error` when a page
request fails, or `cancelled` after a cancel request. Pause and resume only
apply while processing.

## Quick Start

1. Check server health: `GET /api/v1/health`
2. Start an import: `POST /api/v1/import`
3. Poll progress: `GET /api/v1/import/progress`
",
        license(
            name = "Apache-2.0",
            url = "https://www.apache.org/licenses/LICENSE-2.0"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        health::health_check,
        import::start_import,
        import::get_progress,
        import::pause_import,
        import::resume_import,
        import::cancel_import,
        import::reset_import,
        clients::sync_client,
        clients::send_flow,
    ),
    components(
        schemas(
            // Request types
            SendFlowRequest,
            // Response types
            HealthResponse,
            ServiceStatus,
            ImportProgressResponse,
            ClientSyncResponse,
        )
    ),
    tags(
        (name = "system", description = "System health"),
        (name = "import", description = "Bulk import from TalkBI and its controls"),
        (name = "clients", description = "Single-client TalkBI operations"),
    )
)]
pub struct ApiDoc;
