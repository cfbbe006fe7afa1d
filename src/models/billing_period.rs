//! Billing period and date range models.
//!
//! This module contains the [`BillingPeriod`] type that bounds every calculation
//! in a run, and [`DateRange`], the inclusive interval used for vacations.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// An inclusive range of calendar dates.
///
/// # Example
///
/// ```
/// use meal_benefit_engine::models::DateRange;
/// use chrono::NaiveDate;
///
/// let range = DateRange::new(
///     NaiveDate::from_ymd_opt(2025, 5, 5).unwrap(),
///     NaiveDate::from_ymd_opt(2025, 5, 9).unwrap(),
/// ).unwrap();
/// assert_eq!(range.len_days(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// First day of the range (inclusive).
    pub start: NaiveDate,
    /// Last day of the range (inclusive).
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range, returning `None` when `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Returns true if `date` falls inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days covered, counting both ends.
    pub fn len_days(&self) -> u32 {
        (self.end - self.start).num_days() as u32 + 1
    }

    /// Returns the overlap of two ranges, if any.
    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        DateRange::new(self.start.max(other.start), self.end.min(other.end))
    }

    /// Iterates every date in the range in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}

/// Sorts intervals and merges any that overlap or touch.
///
/// The result is ordered and non-overlapping, which is the shape every
/// vacation list on a consolidated record must have.
pub fn merge_ranges(mut ranges: Vec<DateRange>) -> Vec<DateRange> {
    ranges.sort();
    let mut merged: Vec<DateRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end.succ_opt().unwrap_or(last.end) => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// The fixed date range for which the benefit is computed.
///
/// # Example
///
/// ```
/// use meal_benefit_engine::models::BillingPeriod;
/// use chrono::NaiveDate;
///
/// let period = BillingPeriod {
///     start_date: NaiveDate::from_ymd_opt(2025, 4, 15).unwrap(),
///     end_date: NaiveDate::from_ymd_opt(2025, 5, 15).unwrap(),
/// };
///
/// assert_eq!(period.length_in_days(), 31);
/// assert!(period.contains_date(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    /// The start date of the billing period (inclusive).
    pub start_date: NaiveDate,
    /// The end date of the billing period (inclusive).
    pub end_date: NaiveDate,
}

impl BillingPeriod {
    /// Checks if a given date falls within this period, inclusive of both ends.
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Number of calendar days in the period.
    pub fn length_in_days(&self) -> u32 {
        self.as_range().len_days()
    }

    /// The period as a [`DateRange`].
    pub fn as_range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    /// The competence month reported to the vendor: first day of the month
    /// in which the period ends.
    pub fn competence(&self) -> NaiveDate {
        self.end_date.with_day(1).unwrap_or(self.end_date)
    }
}
