//! Payable-day counting.
//!
//! A day is payable when it lies inside the employee's effective window and
//! is not a weekend day, a holiday or a vacation day.

use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::{BillingPeriod, DateRange, DayBreakdown, EmployeeRecord, HolidaySet};

/// The result of counting payable days for one employee.
///
/// # Example
///
/// ```
/// use meal_benefit_engine::calculation::PayableDays;
/// use meal_benefit_engine::models::DayBreakdown;
///
/// let result = PayableDays {
///     days: 11,
///     window: None,
///     breakdown: DayBreakdown { window_days: 21, weekend_days: 8, holiday_days: 2, vacation_days: 0 },
/// };
/// assert_eq!(result.days, 11);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayableDays {
    /// Days paid.
    pub days: u32,
    /// The effective window, or `None` if employment does not overlap the period.
    pub window: Option<DateRange>,
    /// How `days` was reached.
    pub breakdown: DayBreakdown,
}

/// Computes the effective employment window inside the period.
///
/// `start = max(period start, admission)` and
/// `end = min(period end, termination)`. Returns `None` when the employee
/// is admitted after the period ends or terminated before it starts.
///
/// # Example
///
/// ```
/// use meal_benefit_engine::calculation::effective_window;
/// use meal_benefit_engine::models::{BillingPeriod, EmployeeRecord, EmploymentStatus, Location};
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let period = BillingPeriod {
///     start_date: NaiveDate::from_ymd_opt(2025, 4, 15).unwrap(),
///     end_date: NaiveDate::from_ymd_opt(2025, 5, 15).unwrap(),
/// };
/// let record = EmployeeRecord {
///     id: "1001".into(),
///     name: None,
///     job_title: "ANALISTA".into(),
///     status: EmploymentStatus::AdmittedMidPeriod,
///     admission_date: NaiveDate::from_ymd_opt(2025, 5, 5),
///     termination_date: None,
///     vacations: vec![],
///     location: Location { municipality: None, state: "SP".into() },
///     daily_rate: Decimal::new(3750, 2),
///     tags: Default::default(),
/// };
///
/// let window = effective_window(&record, &period).unwrap();
/// assert_eq!(window.start, NaiveDate::from_ymd_opt(2025, 5, 5).unwrap());
/// assert_eq!(window.len_days(), 11);
/// ```
pub fn effective_window(record: &EmployeeRecord, period: &BillingPeriod) -> Option<DateRange> {
    let start = record
        .admission_date
        .map_or(period.start_date, |d| d.max(period.start_date));
    let end = record
        .termination_date
        .map_or(period.end_date, |d| d.min(period.end_date));
    DateRange::new(start, end)
}

/// Counts payable days in a window.
///
/// Deductions are exclusive and applied in order: a weekend day is never
/// also counted as a holiday, and a vacation day is only counted when it
/// would otherwise have been payable.
///
/// # Arguments
///
/// * `window` - The effective window (`None` yields zero days)
/// * `weekend_days` - Weekdays that are not worked
/// * `holidays` - Holidays for the employee's location
/// * `vacations` - Ordered, non-overlapping vacation intervals
pub fn count_payable_days(
    window: Option<DateRange>,
    weekend_days: &[Weekday],
    holidays: &HolidaySet,
    vacations: &[DateRange],
) -> PayableDays {
    let Some(window) = window else {
        return PayableDays {
            days: 0,
            window: None,
            breakdown: DayBreakdown::default(),
        };
    };

    let mut breakdown = DayBreakdown {
        window_days: window.len_days(),
        ..DayBreakdown::default()
    };
    let mut days = 0;

    for day in window.days() {
        if weekend_days.contains(&day.weekday()) {
            breakdown.weekend_days += 1;
        } else if holidays.is_holiday(day) {
            breakdown.holiday_days += 1;
        } else if vacations.iter().any(|v| v.contains(day)) {
            breakdown.vacation_days += 1;
        } else {
            days += 1;
        }
    }

    PayableDays {
        days,
        window: Some(window),
        breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmploymentStatus, Location};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn june() -> BillingPeriod {
        BillingPeriod {
            start_date: date(2025, 6, 1),
            end_date: date(2025, 6, 30),
        }
    }

    fn weekend() -> Vec<Weekday> {
        vec![Weekday::Sat, Weekday::Sun]
    }

    fn holidays(dates: &[NaiveDate]) -> HolidaySet {
        HolidaySet::new("SP", june(), dates.iter().copied(), false)
    }

    fn create_test_record(
        admission: Option<NaiveDate>,
        termination: Option<NaiveDate>,
    ) -> EmployeeRecord {
        EmployeeRecord {
            id: "1001".to_string(),
            name: None,
            job_title: "ANALISTA".to_string(),
            status: EmploymentStatus::Active,
            admission_date: admission,
            termination_date: termination,
            vacations: Vec::new(),
            location: Location {
                municipality: None,
                state: "SP".to_string(),
            },
            daily_rate: Decimal::new(3750, 2),
            tags: BTreeSet::new(),
        }
    }

    #[test]
    fn test_full_month_without_holidays() {
        let window = effective_window(&create_test_record(None, None), &june());
        let result = count_payable_days(window, &weekend(), &holidays(&[]), &[]);

        // June 2025: 30 days, 9 weekend days (1, 7, 8, 14, 15, 21, 22, 28, 29)
        assert_eq!(result.breakdown.window_days, 30);
        assert_eq!(result.breakdown.weekend_days, 9);
        assert_eq!(result.days, 21);
    }

    #[test]
    fn test_admitted_on_day_ten_with_two_holidays() {
        // Admitted 2025-06-10: 21 window days, 6 weekend days, holidays on
        // Thursday 19th and Friday 20th.
        let record = create_test_record(Some(date(2025, 6, 10)), None);
        let window = effective_window(&record, &june());
        let result = count_payable_days(
            window,
            &weekend(),
            &holidays(&[date(2025, 6, 19), date(2025, 6, 20)]),
            &[],
        );

        assert_eq!(result.breakdown.window_days, 21);
        assert_eq!(result.breakdown.holiday_days, 2);
        assert_eq!(result.breakdown.weekend_days, 6);
        assert_eq!(result.days, 21 - 2 - 6);
    }

    #[test]
    fn test_holiday_on_weekend_not_double_counted() {
        let window = effective_window(&create_test_record(None, None), &june());
        // 2025-06-07 is a Saturday
        let result = count_payable_days(window, &weekend(), &holidays(&[date(2025, 6, 7)]), &[]);

        assert_eq!(result.breakdown.holiday_days, 0);
        assert_eq!(result.days, 21);
    }

    #[test]
    fn test_admitted_and_terminated_within_period() {
        let record = create_test_record(Some(date(2025, 6, 9)), Some(date(2025, 6, 13)));
        let window = effective_window(&record, &june());
        let result = count_payable_days(window, &weekend(), &holidays(&[]), &[]);

        assert_eq!(result.window, DateRange::new(date(2025, 6, 9), date(2025, 6, 13)));
        assert_eq!(result.days, 5);
    }

    #[test]
    fn test_no_overlap_with_period_yields_zero() {
        let record = create_test_record(Some(date(2025, 7, 2)), None);
        let window = effective_window(&record, &june());
        assert!(window.is_none());

        let result = count_payable_days(window, &weekend(), &holidays(&[]), &[]);
        assert_eq!(result.days, 0);
        assert_eq!(result.breakdown, DayBreakdown::default());
    }

    #[test]
    fn test_vacation_covering_whole_period_yields_zero() {
        let window = effective_window(&create_test_record(None, None), &june());
        let vacation = DateRange::new(date(2025, 5, 20), date(2025, 7, 10)).unwrap();
        let result = count_payable_days(window, &weekend(), &holidays(&[]), &[vacation]);

        assert_eq!(result.days, 0);
        assert_eq!(result.breakdown.vacation_days, 21);
    }

    #[test]
    fn test_vacation_only_deducts_working_days() {
        let window = effective_window(&create_test_record(None, None), &june());
        // Monday 9th to Sunday 15th, with a holiday on Thursday 12th
        let vacation = DateRange::new(date(2025, 6, 9), date(2025, 6, 15)).unwrap();
        let result = count_payable_days(
            window,
            &weekend(),
            &holidays(&[date(2025, 6, 12)]),
            &[vacation],
        );

        assert_eq!(result.breakdown.vacation_days, 4);
        assert_eq!(result.breakdown.holiday_days, 1);
        assert_eq!(result.days, 21 - 1 - 4);
    }

    #[test]
    fn test_custom_weekend_set() {
        let window = effective_window(&create_test_record(None, None), &june());
        let result = count_payable_days(window, &[Weekday::Sun], &holidays(&[]), &[]);

        // Sundays in June 2025: 1, 8, 15, 22, 29
        assert_eq!(result.breakdown.weekend_days, 5);
        assert_eq!(result.days, 25);
    }
}
