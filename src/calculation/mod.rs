//! Proration and value calculation.
//!
//! This module computes, per eligible employee, the payable days in the
//! billing period against the employee's regional calendar, the gross
//! benefit value and its employer/employee split.

mod cost_split;
mod invariants;
mod payable_days;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use cost_split::{CostSplit, split_cost};
pub use invariants::check_entry;
pub use payable_days::{PayableDays, count_payable_days, effective_window};

use crate::config::RunSettings;
use crate::eligibility::EligibilitySnapshot;
use crate::error::EngineResult;
use crate::models::{CalculatedEntry, EmployeeRecord, EntryFlag, HolidaySet, Location};
use crate::pipeline::RunContext;

/// Output of the calculation stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationSnapshot {
    /// One entry per eligible employee, ordered by id.
    pub entries: Vec<CalculatedEntry>,
}

impl CalculationSnapshot {
    /// Ids of entries computed with the fallback calendar.
    pub fn calendar_fallback_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.flags.contains(&EntryFlag::CalendarFallback))
            .map(|e| e.employee_id.clone())
            .collect()
    }
}

/// Calculates one employee's entry.
///
/// # Arguments
///
/// * `record` - An eligible employee
/// * `holidays` - Holidays for the employee's location
/// * `settings` - Run settings (period, weekend days, cost share, scale)
///
/// # Returns
///
/// The checked entry, or `EngineError::InvariantViolation` if the result
/// breaks an invariant.
pub fn calculate_entry(
    record: &EmployeeRecord,
    holidays: &HolidaySet,
    settings: &RunSettings,
) -> EngineResult<CalculatedEntry> {
    let window = effective_window(record, &settings.period);
    let payable = count_payable_days(window, &settings.weekend_days, holidays, &record.vacations);
    let split = split_cost(
        payable.days,
        record.daily_rate,
        &settings.cost_share,
        settings.currency_scale,
    );

    let mut entry = CalculatedEntry {
        employee_id: record.id.clone(),
        location_key: record.location.key(),
        payable_days: payable.days,
        daily_rate: record.daily_rate,
        gross_value: split.gross_value,
        employer_share: split.employer_share,
        employee_share: split.employee_share,
        breakdown: payable.breakdown,
        flags: Default::default(),
    };
    if holidays.fallback {
        entry.flags.insert(EntryFlag::CalendarFallback);
    }

    check_entry(&entry, settings.period.length_in_days())?;
    debug!(
        employee_id = %entry.employee_id,
        payable_days = entry.payable_days,
        gross_value = %entry.gross_value,
        "Entry calculated"
    );
    Ok(entry)
}

/// Runs the calculation stage.
///
/// Calendars for the distinct locations of eligible employees are resolved
/// concurrently first; then every employee is calculated. Any invariant
/// violation aborts the run.
pub async fn calculate_entries(
    ctx: &RunContext,
    eligibility: &EligibilitySnapshot,
) -> EngineResult<CalculationSnapshot> {
    let locations: Vec<Location> = eligibility
        .eligible
        .iter()
        .map(|r| (r.location.key(), r.location.clone()))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .collect();
    info!(
        stage = "calculation",
        run_id = %ctx.run_id(),
        employees = eligibility.eligible.len(),
        locations = locations.len(),
        "Resolving calendars"
    );

    let calendars = ctx
        .calendar()
        .resolve_all(locations, ctx.concurrency(), ctx.cancel())
        .await;
    ctx.cancel().check("calculation")?;

    let settings = ctx.config().settings();
    let mut entries = Vec::with_capacity(eligibility.eligible.len());
    for record in &eligibility.eligible {
        let key = record.location.key();
        let entry = match calendars.get(&key) {
            Some(holidays) => calculate_entry(record, holidays, settings),
            None => calculate_entry(record, &ctx.calendar().fallback(&key), settings),
        };
        match entry {
            Ok(entry) => entries.push(entry),
            Err(error) => {
                warn!(stage = "calculation", employee_id = %record.id, error = %error, "Run aborted");
                return Err(error);
            }
        }
    }
    entries.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));

    let snapshot = CalculationSnapshot { entries };
    let fallbacks = snapshot.calendar_fallback_ids().len();
    if fallbacks > 0 {
        warn!(stage = "calculation", entries = fallbacks, "CALENDAR_FALLBACK applied");
    }
    info!(
        stage = "calculation",
        entries = snapshot.entries.len(),
        "Calculation complete"
    );
    Ok(snapshot)
}
