//! Error types for the meal benefit engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate.
//! Three families exist because they propagate differently:
//!
//! - [`EngineError`] aborts a run (configuration problems, calculation
//!   invariant violations, output validation failures, cancellation).
//! - [`RecordError`] describes a problem with a single source row. It is
//!   collected into the consolidation issue list and never aborts the run.
//! - [`OracleError`] describes a failed external lookup. It is cloneable so a
//!   memoized failure can be handed to every caller sharing the same key.

use thiserror::Error;

/// The main error type for the meal benefit engine.
///
/// Every variant is fatal for the run that produced it.
///
/// # Example
///
/// ```
/// use meal_benefit_engine::error::EngineError;
///
/// let error = EngineError::ConfigNotFound {
///     path: "/missing/run.yaml".to_string(),
/// };
/// assert_eq!(error.to_string(), "Configuration file not found: /missing/run.yaml");
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// Configuration parsed but holds values the pipeline cannot run with.
    #[error("Invalid configuration field '{field}': {message}")]
    InvalidConfig {
        /// The offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A source table the run cannot proceed without was rejected.
    #[error("Source '{source_name}' rejected: {message}")]
    SourceRejected {
        /// The rejected source category.
        source_name: String,
        /// Why it was rejected.
        message: String,
    },

    /// A calculation invariant does not hold; indicates a logic defect.
    #[error("Invariant '{invariant}' violated for employee '{employee_id}': {message}")]
    InvariantViolation {
        /// Name of the violated invariant.
        invariant: String,
        /// The employee whose entry violated it.
        employee_id: String,
        /// Details of the violation.
        message: String,
    },

    /// The assembled output failed structural validation; nothing is emitted.
    #[error("Output validation failed: {}", violations.join("; "))]
    OutputValidation {
        /// Every violation found.
        violations: Vec<String>,
    },

    /// The run was cancelled before completing.
    #[error("Run cancelled during stage '{stage}'")]
    Cancelled {
        /// The stage that was executing when the cancellation was observed.
        stage: String,
    },

    /// A snapshot or output file could not be read or written.
    #[error("Snapshot error at '{path}': {message}")]
    Snapshot {
        /// The file involved.
        path: String,
        /// A description of the failure.
        message: String,
    },
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

/// A problem with a single source row, collected rather than propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordError {
    /// A required field is absent or blank.
    #[error("Missing required field '{field}'")]
    MissingField {
        /// The missing field.
        field: String,
    },

    /// The same employee id appears more than once in one source.
    #[error("Duplicate employee id in source '{source_name}'")]
    DuplicateRecord {
        /// The source holding the duplicate.
        source_name: String,
    },

    /// Two dates on the row are in the wrong order.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange {
        /// The date expected to come first.
        start: chrono::NaiveDate,
        /// The date expected to come last.
        end: chrono::NaiveDate,
    },

    /// A field is present but holds a value the pipeline cannot use.
    #[error("Invalid value for field '{field}': {message}")]
    InvalidValue {
        /// The offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The row refers to an employee absent from the canonical set.
    #[error("Employee not present in the consolidated record set")]
    UnknownEmployee,
}

/// A failed external lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// Every attempt failed; retries are exhausted.
    #[error("Oracle unavailable for '{key}' after {attempts} attempts: {last_error}")]
    Unavailable {
        /// The lookup key (job title or location).
        key: String,
        /// How many attempts were made.
        attempts: u32,
        /// The error from the final attempt.
        last_error: String,
    },

    /// The response did not match the expected schema.
    #[error("Oracle response for '{key}' rejected: {message}")]
    Schema {
        /// The lookup key.
        key: String,
        /// What was wrong with the response.
        message: String,
    },

    /// A single attempt exceeded its deadline.
    #[error("Oracle call timed out after {timeout_ms}ms")]
    Timeout {
        /// The configured per-call timeout.
        timeout_ms: u64,
    },

    /// A single attempt failed at the transport level.
    #[error("Oracle transport error: {message}")]
    Transport {
        /// A description of the failure.
        message: String,
    },

    /// The run was cancelled while the lookup was in flight.
    #[error("Oracle call abandoned: run cancelled")]
    Cancelled,
}

impl OracleError {
    /// Returns true if another attempt may succeed.
    ///
    /// Schema violations are permanent for a given response and are not retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, OracleError::Timeout { .. } | OracleError::Transport { .. })
    }
}
