//! Calendar resolver client.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use futures_util::StreamExt;
use futures_util::stream;
use serde::Deserialize;
use tracing::{info, warn};

use super::{CalendarRequest, CalendarResolver, KeyedCache, RetryPolicy, call_with_retry};
use crate::error::OracleError;
use crate::models::{BillingPeriod, HolidaySet, Location};
use crate::pipeline::CancelSignal;

#[derive(Debug, Deserialize)]
struct CalendarPayload {
    dates: BTreeSet<NaiveDate>,
}

fn parse_dates(key: &str, raw: serde_json::Value) -> Result<BTreeSet<NaiveDate>, OracleError> {
    serde_json::from_value::<CalendarPayload>(raw)
        .map(|payload| payload.dates)
        .map_err(|e| OracleError::Schema {
            key: key.to_string(),
            message: e.to_string(),
        })
}

/// Run-scoped client for the calendar resolver.
///
/// Holiday sets are memoized per location key. A location that cannot be
/// resolved falls back to the national-default calendar and the returned set
/// is marked `fallback`; the employee is still calculated.
pub struct CalendarClient {
    resolver: Arc<dyn CalendarResolver>,
    policy: RetryPolicy,
    period: BillingPeriod,
    national_default: BTreeSet<NaiveDate>,
    cache: KeyedCache<HolidaySet>,
}

impl CalendarClient {
    /// Creates a client for one billing period.
    pub fn new(
        resolver: Arc<dyn CalendarResolver>,
        policy: RetryPolicy,
        period: BillingPeriod,
        national_default: impl IntoIterator<Item = NaiveDate>,
    ) -> Self {
        Self {
            resolver,
            policy,
            period,
            national_default: national_default.into_iter().collect(),
            cache: KeyedCache::new(),
        }
    }

    /// Returns the holiday set for a location.
    ///
    /// Dates returned by the resolver outside the billing period are dropped.
    pub async fn holidays_for(&self, location: &Location, cancel: &CancelSignal) -> HolidaySet {
        let key = location.key();
        self.cache
            .get_or_init(&key, || async {
                let request = CalendarRequest {
                    location: location.clone(),
                    period: self.period,
                };
                let result = call_with_retry(&self.policy, &key, cancel, || async {
                    let raw = self.resolver.holidays_for(&request).await?;
                    parse_dates(&key, raw)
                })
                .await;

                match result {
                    Ok(dates) => {
                        let set = HolidaySet::new(key.as_str(), self.period, dates, false);
                        info!(location = %key, holidays = set.dates.len(), "Calendar resolved");
                        set
                    }
                    Err(error) => {
                        warn!(
                            location = %key,
                            error = %error,
                            "Calendar unresolved, using national default"
                        );
                        self.fallback(&key)
                    }
                }
            })
            .await
    }

    /// Resolves many distinct locations, at most `concurrency` at a time.
    pub async fn resolve_all(
        &self,
        locations: Vec<Location>,
        concurrency: usize,
        cancel: &CancelSignal,
    ) -> BTreeMap<String, HolidaySet> {
        stream::iter(locations)
            .map(|location| async move {
                let set = self.holidays_for(&location, cancel).await;
                (location.key(), set)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    /// The national-default set for a location key.
    pub fn fallback(&self, key: &str) -> HolidaySet {
        HolidaySet::new(key, self.period, self.national_default.iter().copied(), true)
    }
}
