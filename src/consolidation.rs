//! Record consolidation.
//!
//! Merges the per-category source tables into exactly one
//! [`EmployeeRecord`] per employee id. Problems with individual rows are
//! collected as [`ConsolidationIssue`]s; only an unusable active table aborts
//! the run.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{RunConfig, normalize_state};
use crate::error::{EngineError, EngineResult, RecordError};
use crate::models::{
    DateRange, EmployeeRecord, EmploymentStatus, Location, RecordTag, SourceCategory, SourceRow,
    SourceTables, merge_ranges,
};

/// A non-fatal problem found while consolidating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationIssue {
    /// Source the offending row came from.
    pub source: SourceCategory,
    /// Row number as reported by the parser.
    pub row_number: usize,
    /// Employee id on the row (may be blank).
    pub employee_id: String,
    /// What went wrong.
    pub error: RecordError,
}

/// Output of the consolidation stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedSnapshot {
    /// Canonical records ordered by employee id.
    pub records: Vec<EmployeeRecord>,
    /// Row-level problems, in the order they were found.
    pub issues: Vec<ConsolidationIssue>,
    /// Sources discarded because of duplicate ids.
    pub rejected_sources: Vec<SourceCategory>,
}

impl ConsolidatedSnapshot {
    /// Looks up a record by employee id.
    pub fn record(&self, employee_id: &str) -> Option<&EmployeeRecord> {
        self.records
            .binary_search_by(|r| r.id.as_str().cmp(employee_id))
            .ok()
            .map(|i| &self.records[i])
    }
}

type RowIndex<'a> = BTreeMap<String, &'a SourceRow>;

/// Trimmed, non-blank text.
fn text(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

struct Consolidator {
    issues: Vec<ConsolidationIssue>,
    rejected: Vec<SourceCategory>,
}

impl Consolidator {
    fn issue(&mut self, source: SourceCategory, row: &SourceRow, error: RecordError) {
        self.issues.push(ConsolidationIssue {
            source,
            row_number: row.row_number,
            employee_id: row.employee_id.trim().to_string(),
            error,
        });
    }

    fn missing(&mut self, source: SourceCategory, row: &SourceRow, field: &str) {
        self.issue(
            source,
            row,
            RecordError::MissingField {
                field: field.to_string(),
            },
        );
    }

    /// Indexes an identity source by employee id.
    ///
    /// Returns `None` when the source holds a duplicated id; every duplicate
    /// row is reported and the whole source is discarded.
    fn index_unique<'a>(
        &mut self,
        source: SourceCategory,
        rows: &'a [SourceRow],
    ) -> Option<RowIndex<'a>> {
        let mut index = RowIndex::new();
        let mut duplicates = 0usize;

        for row in rows {
            let Some(id) = text(Some(row.employee_id.as_str())) else {
                self.missing(source, row, "employee_id");
                continue;
            };
            if index.contains_key(&id) {
                duplicates += 1;
                self.issue(
                    source,
                    row,
                    RecordError::DuplicateRecord {
                        source_name: source.to_string(),
                    },
                );
            } else {
                index.insert(id, row);
            }
        }

        if duplicates > 0 {
            warn!(source = %source, duplicates, "Source rejected: duplicate employee ids");
            self.rejected.push(source);
            return None;
        }
        Some(index)
    }

    /// Like [`index_unique`](Self::index_unique) but an absent result is an
    /// empty index.
    fn index_or_empty<'a>(&mut self, source: SourceCategory, rows: &'a [SourceRow]) -> RowIndex<'a> {
        self.index_unique(source, rows).unwrap_or_default()
    }
}

/// Builds the canonical record set.
///
/// # Arguments
///
/// * `tables` - Parsed source tables
/// * `config` - Run configuration (billing period and default daily rates)
///
/// # Returns
///
/// The consolidated snapshot, or `EngineError::SourceRejected` if the active
/// table contains duplicate ids.
///
/// # Conflict policy
///
/// * Termination on or before the active snapshot date marks the employee
///   terminated; a later termination only bounds proration.
/// * An admission after the snapshot date marks the employee admitted
///   mid-period and its date overrides any admission date in the active row.
/// * Missing job title, state or daily rate (after falling back to the prior
///   template and the per-state table) drops the record with an issue.
/// * A negative daily rate drops the record with an issue.
/// * State codes are trimmed and uppercased.
pub fn consolidate(tables: &SourceTables, config: &RunConfig) -> EngineResult<ConsolidatedSnapshot> {
    let period = config.period();
    let snapshot_date = tables.active_snapshot_date.unwrap_or(period.start_date);
    let mut c = Consolidator {
        issues: Vec::new(),
        rejected: Vec::new(),
    };

    let Some(active) = c.index_unique(SourceCategory::Active, &tables.active) else {
        let ids: BTreeSet<&str> = c
            .issues
            .iter()
            .filter(|i| matches!(i.error, RecordError::DuplicateRecord { .. }))
            .map(|i| i.employee_id.as_str())
            .collect();
        return Err(EngineError::SourceRejected {
            source_name: SourceCategory::Active.to_string(),
            message: format!(
                "duplicate employee ids: {}",
                ids.into_iter().collect::<Vec<_>>().join(", ")
            ),
        });
    };
    let terminated = c.index_or_empty(SourceCategory::Terminated, &tables.terminated);
    let admissions = c.index_or_empty(SourceCategory::Admissions, &tables.admissions);
    let template = match &tables.prior_template {
        Some(rows) => c.index_or_empty(SourceCategory::PriorTemplate, rows),
        None => RowIndex::new(),
    };

    let candidates: BTreeSet<&String> = active.keys().chain(admissions.keys()).collect();
    let mut records: BTreeMap<String, EmployeeRecord> = BTreeMap::new();

    for id in candidates {
        let active_row = active.get(id).copied();
        let admission_row = admissions.get(id).copied();
        let template_row = template.get(id).copied();
        let Some(primary) = active_row.or(admission_row) else {
            continue;
        };
        let primary_source = if active_row.is_some() {
            SourceCategory::Active
        } else {
            SourceCategory::Admissions
        };
        let rows: Vec<&SourceRow> = [active_row, admission_row, template_row]
            .into_iter()
            .flatten()
            .collect();
        let first_text = |field: fn(&SourceRow) -> Option<&str>| {
            rows.iter().find_map(|row| text(field(row)))
        };

        // Admission
        let mut status = EmploymentStatus::Active;
        let mut admission_date = active_row.and_then(|r| r.admission_date);
        if let Some(row) = admission_row {
            match row.admission_date {
                Some(date) => {
                    admission_date = Some(date);
                    if date > snapshot_date {
                        status = EmploymentStatus::AdmittedMidPeriod;
                    }
                }
                None => {
                    c.missing(SourceCategory::Admissions, row, "admission_date");
                    if active_row.is_none() {
                        continue;
                    }
                }
            }
        }
        if admission_date.is_none() {
            admission_date = template_row.and_then(|r| r.admission_date);
        }

        // Termination
        let mut termination_date = None;
        if let Some(row) = terminated.get(id) {
            match row.termination_date {
                Some(date) => {
                    termination_date = Some(date);
                    if date <= snapshot_date {
                        status = EmploymentStatus::Terminated;
                    }
                }
                None => c.missing(SourceCategory::Terminated, row, "termination_date"),
            }
        }

        if let (Some(start), Some(end)) = (admission_date, termination_date) {
            if start > end {
                c.issue(primary_source, primary, RecordError::InvalidDateRange { start, end });
                continue;
            }
        }

        // Required fields
        let job_title = first_text(|r| r.job_title.as_deref());
        let state = first_text(|r| r.state.as_deref()).map(|s| normalize_state(&s));
        let daily_rate = rows
            .iter()
            .find_map(|r| r.daily_rate)
            .or_else(|| state.as_deref().and_then(|s| config.daily_rate_for_state(s)));

        let mut complete = true;
        if job_title.is_none() {
            c.missing(primary_source, primary, "job_title");
            complete = false;
        }
        if state.is_none() {
            c.missing(primary_source, primary, "state");
            complete = false;
        }
        match daily_rate {
            None if state.is_some() => {
                c.missing(primary_source, primary, "daily_rate");
                complete = false;
            }
            Some(rate) if rate < Decimal::ZERO => {
                c.issue(
                    primary_source,
                    primary,
                    RecordError::InvalidValue {
                        field: "daily_rate".to_string(),
                        message: format!("{} is negative", rate),
                    },
                );
                complete = false;
            }
            _ => {}
        }
        let (Some(job_title), Some(state), Some(daily_rate), true) =
            (job_title, state, daily_rate, complete)
        else {
            continue;
        };

        records.insert(
            id.clone(),
            EmployeeRecord {
                id: id.clone(),
                name: first_text(|r| r.name.as_deref()),
                job_title,
                status,
                admission_date,
                termination_date,
                vacations: Vec::new(),
                location: Location {
                    municipality: first_text(|r| r.municipality.as_deref()),
                    state,
                },
                daily_rate,
                tags: BTreeSet::new(),
            },
        );
    }

    for (id, row) in &terminated {
        if !active.contains_key(id) && !admissions.contains_key(id) {
            c.issue(SourceCategory::Terminated, row, RecordError::UnknownEmployee);
        }
    }

    apply_vacations(&mut c, &tables.vacations, &mut records);

    let tag_sources = [
        (SourceCategory::Interns, &tables.interns, RecordTag::Intern),
        (SourceCategory::Apprentices, &tables.apprentices, RecordTag::Apprentice),
        (SourceCategory::Abroad, &tables.abroad, RecordTag::Abroad),
        (
            SourceCategory::LeaveOfAbsence,
            &tables.leave_of_absence,
            RecordTag::LeaveOfAbsence,
        ),
    ];
    for (source, rows, tag) in tag_sources {
        for row in rows {
            match records.get_mut(row.employee_id.trim()) {
                Some(record) => {
                    record.tags.insert(tag);
                }
                None => c.issue(source, row, RecordError::UnknownEmployee),
            }
        }
    }

    let snapshot = ConsolidatedSnapshot {
        records: records.into_values().collect(),
        issues: c.issues,
        rejected_sources: c.rejected,
    };
    info!(
        stage = "consolidation",
        records = snapshot.records.len(),
        issues = snapshot.issues.len(),
        rejected_sources = snapshot.rejected_sources.len(),
        "Consolidation complete"
    );
    Ok(snapshot)
}

fn apply_vacations(
    c: &mut Consolidator,
    rows: &[SourceRow],
    records: &mut BTreeMap<String, EmployeeRecord>,
) {
    let source = SourceCategory::Vacations;
    let mut intervals: BTreeMap<String, Vec<DateRange>> = BTreeMap::new();

    for row in rows {
        let id = row.employee_id.trim();
        if !records.contains_key(id) {
            c.issue(source, row, RecordError::UnknownEmployee);
            continue;
        }
        let (Some(start), Some(end)) = (row.vacation_start, row.vacation_end) else {
            let field = if row.vacation_start.is_none() {
                "vacation_start"
            } else {
                "vacation_end"
            };
            c.missing(source, row, field);
            continue;
        };
        match DateRange::new(start, end) {
            Some(range) => intervals.entry(id.to_string()).or_default().push(range),
            None => c.issue(source, row, RecordError::InvalidDateRange { start, end }),
        }
    }

    for (id, ranges) in intervals {
        if let Some(record) = records.get_mut(&id) {
            record.vacations = merge_ranges(ranges);
        }
    }
}
