//! Audit report model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational.
    Info,
    /// Heuristic observation for human review.
    Advisory,
    /// Degraded input or lookup that a reviewer should confirm.
    Warning,
    /// Reconciliation failure; the report is not signed off.
    Error,
}

/// A single audit finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFinding {
    /// Machine-readable code (e.g. `gross_total_mismatch`).
    pub code: String,
    /// Severity.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// The employee concerned, for per-employee findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
}

/// Aggregate figures compared by the audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateTotals {
    /// Employees paid.
    pub eligible_count: usize,
    /// Employees excluded.
    pub excluded_count: usize,
    /// Sum of gross values.
    pub gross_value: Decimal,
    /// Sum of employer shares.
    pub employer_share: Decimal,
    /// Sum of employee shares.
    pub employee_share: Decimal,
}

/// The audit result for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Totals recomputed from the eligibility and calculation snapshots.
    pub expected: AggregateTotals,
    /// Totals reported by the output assembler.
    pub reported: AggregateTotals,
    /// Findings, most severe first.
    pub findings: Vec<AuditFinding>,
    /// True when no finding has [`Severity::Error`].
    pub signed_off: bool,
}

impl AuditReport {
    /// Findings at exactly the given severity.
    pub fn findings_with(&self, severity: Severity) -> impl Iterator<Item = &AuditFinding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }

    /// Returns true if any finding carries `code`.
    pub fn has_finding(&self, code: &str) -> bool {
        self.findings.iter().any(|f| f.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_orders_error_highest() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Advisory);
        assert!(Severity::Advisory > Severity::Info);
    }

    #[test]
    fn test_finding_omits_absent_employee_id() {
        let finding = AuditFinding {
            code: "gross_total_mismatch".to_string(),
            severity: Severity::Error,
            message: "mismatch".to_string(),
            employee_id: None,
        };
        let json = serde_json::to_string(&finding).unwrap();
        assert!(!json.contains("employee_id"));
        assert!(json.contains("\"severity\":\"error\""));
    }
}
