//! Canonical employee record and related types.
//!
//! An [`EmployeeRecord`] is what the consolidator produces: exactly one per
//! employee id, with every required field resolved.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::DateRange;

/// Employment status after consolidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    /// Present in the active snapshot.
    Active,
    /// Terminated on or before the active snapshot date.
    Terminated,
    /// Admitted after the active snapshot date.
    AdmittedMidPeriod,
}

impl fmt::Display for EmploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmploymentStatus::Active => write!(f, "active"),
            EmploymentStatus::Terminated => write!(f, "terminated"),
            EmploymentStatus::AdmittedMidPeriod => write!(f, "admitted_mid_period"),
        }
    }
}

/// Membership in one of the HR category lists (interns, apprentices, ...).
///
/// Tags carry no meaning on their own; deterministic exclusion rules decide
/// what a tag implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordTag {
    /// Listed in the interns table.
    Intern,
    /// Listed in the apprentices table.
    Apprentice,
    /// Listed in the working-abroad table.
    Abroad,
    /// Listed in the leave-of-absence table.
    LeaveOfAbsence,
}

/// Work location used as the holiday calendar key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Municipality, when known. State-level calendars apply without it.
    #[serde(default)]
    pub municipality: Option<String>,
    /// State code or name.
    pub state: String,
}

impl Location {
    /// Stable key used for calendar caching and per-location grouping.
    ///
    /// # Example
    ///
    /// ```
    /// use meal_benefit_engine::models::Location;
    ///
    /// let loc = Location { municipality: Some("Porto Alegre".into()), state: "RS".into() };
    /// assert_eq!(loc.key(), "RS/Porto Alegre");
    /// ```
    pub fn key(&self) -> String {
        match &self.municipality {
            Some(m) => format!("{}/{}", self.state, m),
            None => self.state.clone(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A consolidated employee record.
///
/// Invariants after consolidation: one record per `id`; when both dates are
/// present `admission_date <= termination_date`; `vacations` is ordered and
/// non-overlapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    /// Unique employee identifier.
    pub id: String,
    /// Display name, when the source carried one.
    #[serde(default)]
    pub name: Option<String>,
    /// Job title or role code as exported by HR.
    pub job_title: String,
    /// Consolidated employment status.
    pub status: EmploymentStatus,
    /// Admission date, when known.
    #[serde(default)]
    pub admission_date: Option<NaiveDate>,
    /// Termination date, when the employee is leaving.
    #[serde(default)]
    pub termination_date: Option<NaiveDate>,
    /// Vacation intervals, ordered and non-overlapping.
    #[serde(default)]
    pub vacations: Vec<DateRange>,
    /// Work location.
    pub location: Location,
    /// Benefit value per payable day.
    pub daily_rate: Decimal,
    /// HR category memberships.
    #[serde(default)]
    pub tags: BTreeSet<RecordTag>,
}

impl EmployeeRecord {
    /// Returns true if the record carries the given tag.
    pub fn has_tag(&self, tag: RecordTag) -> bool {
        self.tags.contains(&tag)
    }
}
