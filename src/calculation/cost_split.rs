//! Gross value and employer/employee split.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::config::CostShare;

/// Monetary result for one employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostSplit {
    /// `payable_days * daily_rate`, rounded to the currency scale.
    pub gross_value: Decimal,
    /// Employer portion; absorbs the rounding remainder.
    pub employer_share: Decimal,
    /// Employee portion, truncated to the currency scale.
    pub employee_share: Decimal,
}

/// Computes the gross value and splits it.
///
/// Rounding happens once on the gross value (half away from zero). The
/// employee share is then truncated to the currency scale and the employer
/// share is the difference, so the two shares always sum exactly to the
/// gross value.
///
/// # Arguments
///
/// * `payable_days` - Days paid
/// * `daily_rate` - Benefit value per day
/// * `share` - Configured cost-share ratio
/// * `scale` - Currency decimal places
///
/// # Example
///
/// ```
/// use meal_benefit_engine::calculation::split_cost;
/// use meal_benefit_engine::config::CostShare;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let share = CostShare {
///     employer: Decimal::from_str("0.80").unwrap(),
///     employee: Decimal::from_str("0.20").unwrap(),
/// };
/// let split = split_cost(21, Decimal::from_str("37.50").unwrap(), &share, 2);
///
/// assert_eq!(split.gross_value, Decimal::from_str("787.50").unwrap());
/// assert_eq!(split.employee_share, Decimal::from_str("157.50").unwrap());
/// assert_eq!(split.employer_share, Decimal::from_str("630.00").unwrap());
/// ```
pub fn split_cost(payable_days: u32, daily_rate: Decimal, share: &CostShare, scale: u32) -> CostSplit {
    let gross_value = (Decimal::from(payable_days) * daily_rate)
        .round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    let employee_share =
        (gross_value * share.employee).round_dp_with_strategy(scale, RoundingStrategy::ToZero);
    let employer_share = gross_value - employee_share;

    CostSplit {
        gross_value,
        employer_share,
        employee_share,
    }
}
