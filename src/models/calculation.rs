//! Calculated entry model produced by the proration calculator.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Metadata flags carried into the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryFlag {
    /// The national-default calendar was used for this employee's location.
    CalendarFallback,
    /// The employee's job title could not be classified.
    Unresolved,
}

/// How the payable-day count was reached.
///
/// `payable_days = window_days - weekend_days - holiday_days - vacation_days`,
/// where each deduction only counts days not already deducted by an earlier
/// term (weekends first, then holidays, then vacations).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBreakdown {
    /// Calendar days in the effective employment window.
    pub window_days: u32,
    /// Weekend days in the window.
    pub weekend_days: u32,
    /// Weekday holidays in the window.
    pub holiday_days: u32,
    /// Remaining working days covered by vacation.
    pub vacation_days: u32,
}

/// The per-employee result of the calculator.
///
/// Invariants: `employer_share + employee_share == gross_value` and
/// `payable_days <= period length`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatedEntry {
    /// The employee.
    pub employee_id: String,
    /// Location key whose calendar was applied.
    pub location_key: String,
    /// Payable days in the period.
    pub payable_days: u32,
    /// Daily benefit value used.
    pub daily_rate: Decimal,
    /// `payable_days * daily_rate`, rounded once.
    pub gross_value: Decimal,
    /// Portion paid by the employer (receives any rounding remainder).
    pub employer_share: Decimal,
    /// Portion deducted from the employee.
    pub employee_share: Decimal,
    /// Day-count derivation.
    pub breakdown: DayBreakdown,
    /// Output metadata flags.
    #[serde(default)]
    pub flags: BTreeSet<EntryFlag>,
}
