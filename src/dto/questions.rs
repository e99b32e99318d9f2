use serde::Serialize;
use utoipa::ToSchema;

/// Result of a question bank reload.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReloadResponse {
    /// Questions in the new bank.
    pub count: usize,
}
