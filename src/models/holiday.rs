//! Holiday calendar model.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::BillingPeriod;

/// Non-working dates for one location within one billing period.
///
/// All dates fall inside `period`; an empty set is valid.
///
/// # Example
///
/// ```
/// use meal_benefit_engine::models::{BillingPeriod, HolidaySet};
/// use chrono::NaiveDate;
///
/// let period = BillingPeriod {
///     start_date: NaiveDate::from_ymd_opt(2025, 4, 15).unwrap(),
///     end_date: NaiveDate::from_ymd_opt(2025, 5, 15).unwrap(),
/// };
/// let set = HolidaySet::new(
///     "SP",
///     period,
///     [
///         NaiveDate::from_ymd_opt(2025, 4, 21).unwrap(),
///         NaiveDate::from_ymd_opt(2025, 12, 25).unwrap(), // outside, dropped
///     ],
///     false,
/// );
/// assert_eq!(set.dates.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidaySet {
    /// Location key the set was resolved for.
    pub location_key: String,
    /// The period the set was requested for.
    pub period: BillingPeriod,
    /// Holiday dates inside the period.
    pub dates: BTreeSet<NaiveDate>,
    /// True when the national-default calendar stood in for the location.
    #[serde(default)]
    pub fallback: bool,
}

impl HolidaySet {
    /// Builds a set, discarding any date outside `period`.
    pub fn new(
        location_key: impl Into<String>,
        period: BillingPeriod,
        dates: impl IntoIterator<Item = NaiveDate>,
        fallback: bool,
    ) -> Self {
        Self {
            location_key: location_key.into(),
            period,
            dates: dates
                .into_iter()
                .filter(|d| period.contains_date(*d))
                .collect(),
            fallback,
        }
    }

    /// Returns true if `date` is a holiday.
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }
}
