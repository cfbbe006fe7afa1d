//! Invariants every calculated entry must satisfy.
//!
//! A violation means the calculator is wrong, not the input, so it aborts
//! the run.

use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::models::CalculatedEntry;

fn violation(invariant: &str, entry: &CalculatedEntry, message: String) -> EngineError {
    EngineError::InvariantViolation {
        invariant: invariant.to_string(),
        employee_id: entry.employee_id.clone(),
        message,
    }
}

/// Checks a calculated entry.
///
/// * `share_sum`: employer + employee == gross
/// * `payable_day_bound`: payable days ≤ period length and ≤ window days
/// * `non_negative`: gross and both shares are ≥ 0
pub fn check_entry(entry: &CalculatedEntry, period_length: u32) -> EngineResult<()> {
    if entry.employer_share + entry.employee_share != entry.gross_value {
        return Err(violation(
            "share_sum",
            entry,
            format!(
                "{} + {} != {}",
                entry.employer_share, entry.employee_share, entry.gross_value
            ),
        ));
    }

    if entry.payable_days > period_length || entry.payable_days > entry.breakdown.window_days {
        return Err(violation(
            "payable_day_bound",
            entry,
            format!(
                "{} payable days exceeds period of {} days (window {})",
                entry.payable_days, period_length, entry.breakdown.window_days
            ),
        ));
    }

    let negatives: Vec<&str> = [
        ("gross_value", entry.gross_value),
        ("employer_share", entry.employer_share),
        ("employee_share", entry.employee_share),
    ]
    .into_iter()
    .filter(|(_, value)| *value < Decimal::ZERO)
    .map(|(name, _)| name)
    .collect();
    if !negatives.is_empty() {
        return Err(violation(
            "non_negative",
            entry,
            format!("negative {}", negatives.join(", ")),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DayBreakdown;
    use std::collections::BTreeSet;

    fn create_test_entry(days: u32, gross: i64, employer: i64, employee: i64) -> CalculatedEntry {
        CalculatedEntry {
            employee_id: "1001".to_string(),
            location_key: "SP".to_string(),
            payable_days: days,
            daily_rate: Decimal::new(3750, 2),
            gross_value: Decimal::new(gross, 2),
            employer_share: Decimal::new(employer, 2),
            employee_share: Decimal::new(employee, 2),
            breakdown: DayBreakdown {
                window_days: 31,
                ..DayBreakdown::default()
            },
            flags: BTreeSet::new(),
        }
    }

    fn invariant_of(result: EngineResult<()>) -> String {
        match result {
            Err(EngineError::InvariantViolation { invariant, .. }) => invariant,
            other => panic!("Expected InvariantViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_entry_passes() {
        assert!(check_entry(&create_test_entry(20, 75000, 60000, 15000), 31).is_ok());
    }

    #[test]
    fn test_share_mismatch_is_fatal() {
        let result = check_entry(&create_test_entry(20, 75000, 60000, 15001), 31);
        assert_eq!(invariant_of(result), "share_sum");
    }

    #[test]
    fn test_days_beyond_period_is_fatal() {
        let result = check_entry(&create_test_entry(32, 0, 0, 0), 31);
        assert_eq!(invariant_of(result), "payable_day_bound");
    }

    #[test]
    fn test_negative_value_is_fatal() {
        let result = check_entry(&create_test_entry(2, -7500, -6000, -1500), 31);
        assert_eq!(invariant_of(result), "non_negative");
    }
}
