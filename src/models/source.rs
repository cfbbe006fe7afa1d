//! Source table models.
//!
//! Spreadsheet parsing happens outside this crate; the consolidator receives
//! already-parsed rows grouped by source category. Fields are optional so the
//! consolidator can report missing values per row instead of failing a file.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The HR export a table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    /// Employees active at the snapshot date.
    Active,
    /// Terminations.
    Terminated,
    /// New admissions.
    Admissions,
    /// Vacation schedule (one row per interval).
    Vacations,
    /// Previous period's output, used to fill gaps.
    PriorTemplate,
    /// Interns.
    Interns,
    /// Apprentices.
    Apprentices,
    /// Employees working abroad.
    Abroad,
    /// Employees on leave of absence.
    LeaveOfAbsence,
}

impl SourceCategory {
    /// Sources in which an employee id must be unique.
    pub fn requires_unique_ids(&self) -> bool {
        matches!(
            self,
            SourceCategory::Active
                | SourceCategory::Terminated
                | SourceCategory::Admissions
                | SourceCategory::PriorTemplate
        )
    }
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceCategory::Active => "active",
            SourceCategory::Terminated => "terminated",
            SourceCategory::Admissions => "admissions",
            SourceCategory::Vacations => "vacations",
            SourceCategory::PriorTemplate => "prior_template",
            SourceCategory::Interns => "interns",
            SourceCategory::Apprentices => "apprentices",
            SourceCategory::Abroad => "abroad",
            SourceCategory::LeaveOfAbsence => "leave_of_absence",
        };
        write!(f, "{}", name)
    }
}

/// One parsed row from any source table.
///
/// Which fields are meaningful depends on the source: terminations carry
/// `termination_date`, the vacation schedule carries `vacation_start` and
/// `vacation_end`, and so on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRow {
    /// Row number in the original file, for reporting.
    #[serde(default)]
    pub row_number: usize,
    /// Employee identifier.
    pub employee_id: String,
    /// Employee name.
    #[serde(default)]
    pub name: Option<String>,
    /// Job title.
    #[serde(default)]
    pub job_title: Option<String>,
    /// Admission date.
    #[serde(default)]
    pub admission_date: Option<NaiveDate>,
    /// Termination date.
    #[serde(default)]
    pub termination_date: Option<NaiveDate>,
    /// First vacation day.
    #[serde(default)]
    pub vacation_start: Option<NaiveDate>,
    /// Last vacation day.
    #[serde(default)]
    pub vacation_end: Option<NaiveDate>,
    /// Municipality of the work location.
    #[serde(default)]
    pub municipality: Option<String>,
    /// State of the work location.
    #[serde(default)]
    pub state: Option<String>,
    /// Explicit daily benefit value.
    #[serde(default)]
    pub daily_rate: Option<Decimal>,
}

impl SourceRow {
    /// Creates a row carrying only an employee id.
    pub fn new(employee_id: impl Into<String>) -> Self {
        Self {
            employee_id: employee_id.into(),
            ..Self::default()
        }
    }
}

/// Every source table for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTables {
    /// Date the active export was taken. Defaults to the period start.
    #[serde(default)]
    pub active_snapshot_date: Option<NaiveDate>,
    /// Active employees (required).
    pub active: Vec<SourceRow>,
    /// Terminations.
    #[serde(default)]
    pub terminated: Vec<SourceRow>,
    /// Admissions.
    #[serde(default)]
    pub admissions: Vec<SourceRow>,
    /// Vacation intervals.
    #[serde(default)]
    pub vacations: Vec<SourceRow>,
    /// Prior-period template.
    #[serde(default)]
    pub prior_template: Option<Vec<SourceRow>>,
    /// Interns.
    #[serde(default)]
    pub interns: Vec<SourceRow>,
    /// Apprentices.
    #[serde(default)]
    pub apprentices: Vec<SourceRow>,
    /// Employees abroad.
    #[serde(default)]
    pub abroad: Vec<SourceRow>,
    /// Employees on leave.
    #[serde(default)]
    pub leave_of_absence: Vec<SourceRow>,
}
