//! HTTP API module for the meal benefit engine.
//!
//! This module exposes the pipeline over REST: a client posts the parsed
//! source tables and receives the validated output file together with the
//! exclusion, consolidation and audit reports.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::RunRequest;
pub use response::{ApiError, ApiErrorResponse, RunResponse};
pub use state::AppState;
