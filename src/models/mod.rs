//! Core data models for the meal benefit engine.
//!
//! This module contains the domain models passed between pipeline stages.

mod audit;
mod billing_period;
mod calculation;
mod employee;
mod holiday;
mod output;
mod source;
mod verdict;

pub use audit::{AggregateTotals, AuditFinding, AuditReport, Severity};
pub use billing_period::{BillingPeriod, DateRange, merge_ranges};
pub use calculation::{CalculatedEntry, DayBreakdown, EntryFlag};
pub use employee::{EmployeeRecord, EmploymentStatus, Location, RecordTag};
pub use holiday::HolidaySet;
pub use output::{OutputFile, OutputRow, OutputTotals};
pub use source::{SourceCategory, SourceRow, SourceTables};
pub use verdict::{ExclusionEntry, ExclusionReport, ExclusionVerdict, VerdictSource};
