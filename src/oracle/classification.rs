//! Classification oracle client.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use serde::Deserialize;
use tracing::{info, warn};

use super::{
    ClassificationHints, ClassificationOracle, ClassificationRequest, KeyedCache, RetryPolicy,
    call_with_retry,
};
use crate::error::OracleError;
use crate::models::{ExclusionVerdict, VerdictSource};
use crate::pipeline::CancelSignal;

/// The only response shape the client accepts.
#[derive(Debug, Deserialize)]
struct VerdictPayload {
    excluded: bool,
    justification: String,
}

/// Validates a raw oracle response against the verdict schema.
///
/// Missing or mistyped fields and an empty justification are rejected with
/// [`OracleError::Schema`]; nothing is defaulted.
fn parse_verdict(job_title: &str, raw: serde_json::Value) -> Result<ExclusionVerdict, OracleError> {
    let payload: VerdictPayload =
        serde_json::from_value(raw).map_err(|e| OracleError::Schema {
            key: job_title.to_string(),
            message: e.to_string(),
        })?;

    if payload.justification.trim().is_empty() {
        return Err(OracleError::Schema {
            key: job_title.to_string(),
            message: "justification must be a non-empty string".to_string(),
        });
    }

    Ok(ExclusionVerdict {
        job_title: job_title.to_string(),
        excluded: payload.excluded,
        justification: payload.justification,
        source: VerdictSource::Oracle,
    })
}

/// Run-scoped client for the classification oracle.
///
/// Verdicts (and failures) are memoized per distinct trimmed job title, so
/// two employees sharing a title always receive the same verdict within a
/// run, and the oracle is called at most once per title.
pub struct ClassificationClient {
    oracle: Arc<dyn ClassificationOracle>,
    policy: RetryPolicy,
    cache: KeyedCache<Result<ExclusionVerdict, OracleError>>,
}

impl ClassificationClient {
    /// Creates a client with an empty cache.
    pub fn new(oracle: Arc<dyn ClassificationOracle>, policy: RetryPolicy) -> Self {
        Self {
            oracle,
            policy,
            cache: KeyedCache::new(),
        }
    }

    /// Classifies one job title.
    pub async fn classify(
        &self,
        job_title: &str,
        context: Option<ClassificationHints>,
        cancel: &CancelSignal,
    ) -> Result<ExclusionVerdict, OracleError> {
        let key = job_title.trim();
        self.cache
            .get_or_init(key, || async {
                let request = ClassificationRequest {
                    job_title: key.to_string(),
                    context,
                };
                let result = call_with_retry(&self.policy, key, cancel, || async {
                    let raw = self.oracle.classify(&request).await?;
                    parse_verdict(key, raw)
                })
                .await;

                match &result {
                    Ok(verdict) => info!(
                        job_title = key,
                        excluded = verdict.excluded,
                        "Job title classified"
                    ),
                    Err(error) => warn!(job_title = key, error = %error, "Job title unresolved"),
                }
                result
            })
            .await
    }

    /// Classifies many distinct titles, at most `concurrency` at a time.
    ///
    /// The returned map is keyed by trimmed title.
    pub async fn classify_all(
        &self,
        titles: BTreeMap<String, ClassificationHints>,
        concurrency: usize,
        cancel: &CancelSignal,
    ) -> BTreeMap<String, Result<ExclusionVerdict, OracleError>> {
        stream::iter(titles)
            .map(|(title, hints)| async move {
                let result = self.classify(&title, Some(hints), cancel).await;
                (title.trim().to_string(), result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    /// Number of titles with a memoized outcome.
    pub fn cached_titles(&self) -> usize {
        self.cache.len()
    }
}
