//! Eligibility verdicts and the exclusion report.

use serde::{Deserialize, Serialize};

/// Where an exclusion decision came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VerdictSource {
    /// A configured or built-in deterministic rule.
    Rule {
        /// The rule identifier.
        rule_id: String,
    },
    /// The classification oracle.
    Oracle,
    /// The oracle could not be consulted; excluded conservatively.
    Unresolved,
}

/// A classification decision for a job title.
///
/// Immutable once issued. A later run may receive a different verdict for
/// the same title; within one run every employee sharing a title receives
/// the same verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionVerdict {
    /// The job title the verdict applies to.
    pub job_title: String,
    /// Whether employees holding this title are excluded.
    pub excluded: bool,
    /// Explanation supplied with the decision.
    pub justification: String,
    /// Who issued the decision.
    pub source: VerdictSource,
}

/// One excluded employee in the [`ExclusionReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionEntry {
    /// The excluded employee.
    pub employee_id: String,
    /// Their job title.
    pub job_title: String,
    /// Human-readable reason.
    pub reason: String,
    /// The rule or verdict responsible.
    pub source: VerdictSource,
}

impl ExclusionEntry {
    /// Returns true if the employee was excluded only because the oracle
    /// could not be consulted.
    pub fn is_unresolved(&self) -> bool {
        self.source == VerdictSource::Unresolved
    }
}

/// Every exclusion made by the eligibility filter, ordered by employee id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionReport {
    /// The exclusions.
    pub entries: Vec<ExclusionEntry>,
}

impl ExclusionReport {
    /// Number of excluded employees.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nobody was excluded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of employees tagged `UNRESOLVED`.
    pub fn unresolved_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.is_unresolved())
            .map(|e| e.employee_id.clone())
            .collect()
    }

    /// Returns true if the employee appears in the report.
    pub fn contains(&self, employee_id: &str) -> bool {
        self.entries.iter().any(|e| e.employee_id == employee_id)
    }
}
