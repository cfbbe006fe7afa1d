//! Response types for the meal benefit engine API.
//!
//! This module defines the run response body and the mapping from
//! [`EngineError`] to JSON error bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consolidation::ConsolidationIssue;
use crate::error::EngineError;
use crate::models::{AuditReport, ExclusionReport, OutputFile, SourceCategory};
use crate::pipeline::RunOutcome;

/// Response body for a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    /// The run id; snapshots are stored under it.
    pub run_id: Uuid,
    /// The validated output file.
    pub output: OutputFile,
    /// Every excluded employee and why.
    pub exclusions: ExclusionReport,
    /// The audit report.
    pub audit: AuditReport,
    /// Per-row problems found while consolidating.
    pub issues: Vec<ConsolidationIssue>,
    /// Sources rejected for duplicate ids.
    pub rejected_sources: Vec<SourceCategory>,
}

impl From<RunOutcome> for RunResponse {
    fn from(outcome: RunOutcome) -> Self {
        Self {
            run_id: outcome.run_id,
            output: outcome.output,
            exclusions: outcome.eligibility.report,
            audit: outcome.audit,
            issues: outcome.consolidated.issues,
            rejected_sources: outcome.consolidated.rejected_sources,
        }
    }
}

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Individual violations, for output validation failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            violations: Vec::new(),
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::new(code, message)
        }
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }

    /// Creates a validation error response.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }
}

/// API error with HTTP status code.
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        let message = error.to_string();
        match error {
            EngineError::ConfigNotFound { .. }
            | EngineError::ConfigParseError { .. }
            | EngineError::InvalidConfig { .. } => ApiErrorResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: ApiError::with_details("CONFIG_ERROR", "Configuration error", message),
            },
            EngineError::SourceRejected { source_name, .. } => ApiErrorResponse {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                error: ApiError::with_details(
                    "SOURCE_REJECTED",
                    message,
                    format!("Fix the '{}' table and submit the run again", source_name),
                ),
            },
            EngineError::InvariantViolation { invariant, .. } => ApiErrorResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: ApiError::with_details(
                    "INVARIANT_VIOLATION",
                    message,
                    format!("Calculation invariant '{}' does not hold", invariant),
                ),
            },
            EngineError::OutputValidation { violations } => ApiErrorResponse {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                error: ApiError {
                    violations,
                    ..ApiError::new(
                        "OUTPUT_VALIDATION_ERROR",
                        "Output validation failed, no file was produced",
                    )
                },
            },
            EngineError::Cancelled { .. } => ApiErrorResponse {
                status: StatusCode::SERVICE_UNAVAILABLE,
                error: ApiError::new("CANCELLED", message),
            },
            EngineError::Snapshot { .. } => ApiErrorResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: ApiError::with_details("SNAPSHOT_ERROR", "Snapshot persistence failed", message),
            },
        }
    }
}
