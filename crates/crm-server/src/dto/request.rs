//! Request DTOs for API endpoints.

use serde::Deserialize;
use utoipa::ToSchema;

/// Request body for sending a TalkBI sub-flow to a client.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendFlowRequest {
    /// TalkBI sub-flow identifier
    #[schema(example = "f123456")]
    pub flow_ns: String,
}

impl SendFlowRequest {
    /// Trimmed flow id, or `None` when blank.
    pub fn flow_ns(&self) -> Option<&str> {
        let flow_ns = self.flow_ns.trim();
        (!flow_ns.is_empty()).then_some(flow_ns)
    }
}
