//! External decision services and their run-scoped clients.
//!
//! The classification oracle and the calendar resolver are capabilities: the
//! core only sees the [`ClassificationOracle`] and [`CalendarResolver`] traits
//! and their request/response schemas. Production code plugs in the HTTP
//! implementations from [`http`]; tests inject fixed fakes.
//!
//! The clients wrap a capability with the failure contract every lookup
//! follows: per-call timeout, bounded retry with exponential backoff, strict
//! response validation, and per-run memoization keyed by job title or
//! location (concurrent requests for one key share a single call).

mod cache;
mod calendar;
mod classification;
pub mod http;
mod retry;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::models::{BillingPeriod, Location};

pub use cache::KeyedCache;
pub use calendar::CalendarClient;
pub use classification::ClassificationClient;
pub use retry::{RetryPolicy, call_with_retry};

/// Structured hints sent with a classification request.
///
/// Aggregated per job title, so every employee sharing a title produces the
/// same request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationHints {
    /// How many employees hold the title.
    pub headcount: usize,
    /// States where the title appears.
    pub states: BTreeSet<String>,
}

/// Request sent to the classification oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    /// The job title to classify.
    pub job_title: String,
    /// Optional hints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ClassificationHints>,
}

/// Request sent to the calendar resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarRequest {
    /// Location whose holidays are requested.
    pub location: Location,
    /// Period the holidays must fall in.
    pub period: BillingPeriod,
}

/// A service that decides whether a job title is excluded from the benefit.
///
/// Implementations return the raw response body. Expected shape:
/// `{"excluded": bool, "justification": "non-empty string"}`. Validation is
/// done by [`ClassificationClient`], never by the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    /// Classifies a single job title.
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<serde_json::Value, OracleError>;
}

/// A service that lists non-working dates for a location.
///
/// Implementations return the raw response body. Expected shape:
/// `{"dates": ["YYYY-MM-DD", ...]}`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalendarResolver: Send + Sync {
    /// Resolves holidays for one location within one period.
    async fn holidays_for(&self, request: &CalendarRequest)
    -> Result<serde_json::Value, OracleError>;
}
