//! Audit and reconciliation.
//!
//! Recomputes aggregate totals from the eligibility and calculation
//! snapshots and compares them with the assembled output. Discrepancies are
//! reported, never corrected. Heuristic checks add advisory findings for
//! human review. Nothing here aborts the run.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::calculation::CalculationSnapshot;
use crate::config::AuditSettings;
use crate::consolidation::ConsolidatedSnapshot;
use crate::eligibility::EligibilitySnapshot;
use crate::models::{
    AggregateTotals, AuditFinding, AuditReport, CalculatedEntry, OutputFile, Severity,
};

fn finding(code: &str, severity: Severity, message: String, employee_id: Option<&str>) -> AuditFinding {
    AuditFinding {
        code: code.to_string(),
        severity,
        message,
        employee_id: employee_id.map(str::to_string),
    }
}

/// Totals recomputed from the stage snapshots.
fn expected_totals(eligibility: &EligibilitySnapshot, calculation: &CalculationSnapshot) -> AggregateTotals {
    calculation.entries.iter().fold(
        AggregateTotals {
            eligible_count: eligibility.eligible.len(),
            excluded_count: eligibility.report.len(),
            ..AggregateTotals::default()
        },
        |mut acc, entry| {
            acc.gross_value += entry.gross_value;
            acc.employer_share += entry.employer_share;
            acc.employee_share += entry.employee_share;
            acc
        },
    )
}

/// Totals as the output file states them.
fn reported_totals(consolidated: &ConsolidatedSnapshot, output: &OutputFile) -> AggregateTotals {
    AggregateTotals {
        eligible_count: output.totals.rows,
        excluded_count: consolidated.records.len().saturating_sub(output.totals.rows),
        gross_value: output.totals.gross_value,
        employer_share: output.totals.employer_share,
        employee_share: output.totals.employee_share,
    }
}

fn reconcile(
    expected: &AggregateTotals,
    reported: &AggregateTotals,
    consolidated: &ConsolidatedSnapshot,
    tolerance: Decimal,
    findings: &mut Vec<AuditFinding>,
) {
    for (code, label, want, got) in [
        ("gross_total_mismatch", "gross value", expected.gross_value, reported.gross_value),
        ("employer_total_mismatch", "employer share", expected.employer_share, reported.employer_share),
        ("employee_total_mismatch", "employee share", expected.employee_share, reported.employee_share),
    ] {
        let difference = (want - got).abs();
        if difference > tolerance {
            findings.push(finding(
                code,
                Severity::Error,
                format!("{} expected {} but output reports {} (difference {})", label, want, got, difference),
                None,
            ));
        }
    }

    if expected.eligible_count != reported.eligible_count {
        findings.push(finding(
            "eligible_count_mismatch",
            Severity::Error,
            format!(
                "{} eligible employees but {} output rows",
                expected.eligible_count, reported.eligible_count
            ),
            None,
        ));
    }
    if expected.excluded_count != reported.excluded_count {
        findings.push(finding(
            "excluded_count_mismatch",
            Severity::Error,
            format!(
                "{} exclusions reported but output implies {}",
                expected.excluded_count, reported.excluded_count
            ),
            None,
        ));
    }

    let consolidated_count = consolidated.records.len();
    if consolidated_count != expected.eligible_count + expected.excluded_count {
        findings.push(finding(
            "partition_mismatch",
            Severity::Error,
            format!(
                "{} consolidated records but {} eligible + {} excluded",
                consolidated_count, expected.eligible_count, expected.excluded_count
            ),
            None,
        ));
    }
}

/// Flags entries whose payable days deviate from the median of their
/// location by more than `threshold`, for locations with at least
/// `min_group` entries.
fn payable_day_outliers(entries: &[CalculatedEntry], settings: &AuditSettings) -> Vec<AuditFinding> {
    let mut groups: BTreeMap<&str, Vec<&CalculatedEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.location_key.as_str()).or_default().push(entry);
    }

    let mut findings = Vec::new();
    for (location, group) in groups {
        if group.len() < settings.outlier_min_group.max(1) {
            continue;
        }
        let mut days: Vec<i64> = group.iter().map(|e| i64::from(e.payable_days)).collect();
        days.sort_unstable();
        // Twice the median, so even-sized groups stay in integers.
        let mid = days.len() / 2;
        let doubled_median = if days.len() % 2 == 0 {
            days[mid - 1] + days[mid]
        } else {
            days[mid] * 2
        };
        let doubled_threshold = i64::from(settings.outlier_day_threshold) * 2;

        for entry in group {
            let deviation = (i64::from(entry.payable_days) * 2 - doubled_median).abs();
            if deviation > doubled_threshold {
                findings.push(finding(
                    "payable_day_outlier",
                    Severity::Advisory,
                    format!(
                        "{} payable days against a median of {} in {}",
                        entry.payable_days,
                        Decimal::new(doubled_median * 5, 1).normalize(),
                        location
                    ),
                    Some(entry.employee_id.as_str()),
                ));
            }
        }
    }
    findings
}

/// Runs the audit.
///
/// # Arguments
///
/// * `consolidated` - The consolidation snapshot
/// * `eligibility` - The eligibility snapshot
/// * `calculation` - The calculation snapshot
/// * `output` - The assembled output file
/// * `settings` - Tolerance and outlier thresholds
///
/// # Returns
///
/// The audit report. It is signed off when no finding is an error.
pub fn audit_run(
    consolidated: &ConsolidatedSnapshot,
    eligibility: &EligibilitySnapshot,
    calculation: &CalculationSnapshot,
    output: &OutputFile,
    settings: &AuditSettings,
) -> AuditReport {
    let expected = expected_totals(eligibility, calculation);
    let reported = reported_totals(consolidated, output);
    let mut findings = Vec::new();

    reconcile(&expected, &reported, consolidated, settings.tolerance, &mut findings);
    findings.extend(payable_day_outliers(&calculation.entries, settings));

    for entry in calculation.entries.iter().filter(|e| e.payable_days == 0) {
        findings.push(finding(
            "zero_payable_days",
            Severity::Advisory,
            "eligible employee has no payable days in the period".to_string(),
            Some(entry.employee_id.as_str()),
        ));
    }
    for id in &output.calendar_fallback {
        findings.push(finding(
            "calendar_fallback",
            Severity::Warning,
            "national-default calendar applied".to_string(),
            Some(id.as_str()),
        ));
    }
    for entry in eligibility.report.entries.iter().filter(|e| e.is_unresolved()) {
        findings.push(finding(
            "unresolved_classification",
            Severity::Warning,
            format!("'{}' excluded without a verdict: {}", entry.job_title, entry.reason),
            Some(entry.employee_id.as_str()),
        ));
    }
    for source in &consolidated.rejected_sources {
        findings.push(finding(
            "source_rejected",
            Severity::Warning,
            format!("source '{}' discarded because of duplicate ids", source),
            None,
        ));
    }
    if !consolidated.issues.is_empty() {
        findings.push(finding(
            "consolidation_issues",
            Severity::Info,
            format!("{} source rows reported during consolidation", consolidated.issues.len()),
            None,
        ));
    }

    findings.sort_by(|a, b| b.severity.cmp(&a.severity));
    let signed_off = findings.iter().all(|f| f.severity != Severity::Error);

    if signed_off {
        info!(stage = "audit", findings = findings.len(), "Audit signed off");
    } else {
        warn!(
            stage = "audit",
            errors = findings.iter().filter(|f| f.severity == Severity::Error).count(),
            "Audit not signed off"
        );
    }

    AuditReport {
        generated_at: Utc::now(),
        expected,
        reported,
        findings,
        signed_off,
    }
}
