//! Request types for the meal benefit engine API.

use serde::{Deserialize, Serialize};

use crate::models::SourceTables;

/// Request body for the `/runs` endpoint.
///
/// The source tables are inlined at the top level of the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// The parsed HR exports for this run.
    #[serde(flatten)]
    pub tables: SourceTables,
}
