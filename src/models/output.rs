//! Vendor output file model.
//!
//! The exact on-disk layout belongs to the spreadsheet writer; this crate
//! produces the validated rows and writes them as JSON for that writer.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::EntryFlag;
use crate::error::{EngineError, EngineResult};

/// One row of the vendor file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    /// Employee id.
    pub employee_id: String,
    /// Employee name, when known.
    #[serde(default)]
    pub name: Option<String>,
    /// Admission date, when known.
    #[serde(default)]
    pub admission_date: Option<NaiveDate>,
    /// Work location key.
    pub location: String,
    /// Competence month.
    pub competence: NaiveDate,
    /// Payable days.
    pub payable_days: u32,
    /// Daily benefit value.
    pub daily_rate: Decimal,
    /// Total benefit value.
    pub gross_value: Decimal,
    /// Employer cost.
    pub employer_share: Decimal,
    /// Employee deduction.
    pub employee_share: Decimal,
    /// Metadata flags.
    #[serde(default)]
    pub flags: BTreeSet<EntryFlag>,
}

/// Totals over every row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTotals {
    /// Number of rows.
    pub rows: usize,
    /// Sum of gross values.
    pub gross_value: Decimal,
    /// Sum of employer shares.
    pub employer_share: Decimal,
    /// Sum of employee shares.
    pub employee_share: Decimal,
}

impl OutputTotals {
    /// Sums the given rows.
    pub fn from_rows(rows: &[OutputRow]) -> Self {
        rows.iter().fold(
            OutputTotals::default(),
            |mut acc, row| {
                acc.rows += 1;
                acc.gross_value += row.gross_value;
                acc.employer_share += row.employer_share;
                acc.employee_share += row.employee_share;
                acc
            },
        )
    }
}

/// The validated vendor file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    /// Competence month of the file.
    pub competence: NaiveDate,
    /// Rows ordered by employee id.
    pub rows: Vec<OutputRow>,
    /// Totals over `rows`.
    pub totals: OutputTotals,
    /// Employees excluded as `UNRESOLVED`.
    #[serde(default)]
    pub unresolved: Vec<String>,
    /// Employees whose row used the fallback calendar.
    #[serde(default)]
    pub calendar_fallback: Vec<String>,
}

impl OutputFile {
    /// Writes the file as pretty-printed JSON.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> EngineResult<()> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let json = serde_json::to_string_pretty(self).map_err(|e| EngineError::Snapshot {
            path: path_str.clone(),
            message: e.to_string(),
        })?;
        fs::write(path, json).map_err(|e| EngineError::Snapshot {
            path: path_str,
            message: e.to_string(),
        })
    }
}
