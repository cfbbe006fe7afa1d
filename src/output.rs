//! Output assembly.
//!
//! Maps calculated entries onto the vendor row schema and validates the
//! result. Any violation is fatal: the file is never emitted partially.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::calculation::CalculationSnapshot;
use crate::eligibility::EligibilitySnapshot;
use crate::error::{EngineError, EngineResult};
use crate::models::{BillingPeriod, EntryFlag, OutputFile, OutputRow, OutputTotals};

/// Builds and validates the output file.
///
/// # Arguments
///
/// * `eligibility` - The eligibility snapshot (eligible set and exclusions)
/// * `calculation` - The calculation snapshot
/// * `period` - The billing period, for the competence month
///
/// # Returns
///
/// The validated file, or `EngineError::OutputValidation` listing every
/// violation found:
///
/// * an entry appears more than once
/// * an eligible employee has no entry
/// * an excluded employee has an entry
/// * an entry belongs to nobody in the eligible set
/// * a monetary value is negative
/// * an entry is flagged `UNRESOLVED`
pub fn assemble_output(
    eligibility: &EligibilitySnapshot,
    calculation: &CalculationSnapshot,
    period: &BillingPeriod,
) -> EngineResult<OutputFile> {
    let mut violations = Vec::new();
    let eligible: BTreeMap<&str, _> = eligibility
        .eligible
        .iter()
        .map(|r| (r.id.as_str(), r))
        .collect();
    let excluded: BTreeSet<&str> = eligibility
        .report
        .entries
        .iter()
        .map(|e| e.employee_id.as_str())
        .collect();

    let mut seen = BTreeSet::new();
    for entry in &calculation.entries {
        let id = entry.employee_id.as_str();
        if !seen.insert(id) {
            violations.push(format!("duplicate employee id '{}'", id));
        }
        if excluded.contains(id) {
            violations.push(format!("excluded employee '{}' present", id));
        } else if !eligible.contains_key(id) {
            violations.push(format!("employee '{}' is not in the eligible set", id));
        }
        for (field, value) in [
            ("daily_rate", entry.daily_rate),
            ("gross_value", entry.gross_value),
            ("employer_share", entry.employer_share),
            ("employee_share", entry.employee_share),
        ] {
            if value < Decimal::ZERO {
                violations.push(format!("negative {} for employee '{}'", field, id));
            }
        }
        if entry.flags.contains(&EntryFlag::Unresolved) {
            violations.push(format!("employee '{}' is flagged UNRESOLVED", id));
        }
    }
    for id in eligible.keys() {
        if !seen.contains(id) {
            violations.push(format!("eligible employee '{}' missing", id));
        }
    }

    if !violations.is_empty() {
        warn!(
            stage = "output",
            violations = violations.len(),
            "Output validation failed, nothing emitted"
        );
        return Err(EngineError::OutputValidation { violations });
    }

    let competence = period.competence();
    let mut rows: Vec<OutputRow> = calculation
        .entries
        .iter()
        .filter_map(|entry| {
            eligible.get(entry.employee_id.as_str()).map(|record| OutputRow {
                employee_id: entry.employee_id.clone(),
                name: record.name.clone(),
                admission_date: record.admission_date,
                location: entry.location_key.clone(),
                competence,
                payable_days: entry.payable_days,
                daily_rate: entry.daily_rate,
                gross_value: entry.gross_value,
                employer_share: entry.employer_share,
                employee_share: entry.employee_share,
                flags: entry.flags.clone(),
            })
        })
        .collect();
    rows.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));

    let file = OutputFile {
        competence,
        totals: OutputTotals::from_rows(&rows),
        rows,
        unresolved: eligibility.report.unresolved_ids(),
        calendar_fallback: calculation.calendar_fallback_ids(),
    };
    info!(
        stage = "output",
        rows = file.totals.rows,
        gross_value = %file.totals.gross_value,
        "Output assembled"
    );
    Ok(file)
}
