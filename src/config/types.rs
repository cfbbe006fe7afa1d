//! Configuration types for a benefit run.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::{BillingPeriod, EmploymentStatus, RecordTag};
use crate::oracle::RetryPolicy;

/// Employer/employee split of the gross benefit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CostShare {
    /// Fraction paid by the employer (e.g. 0.80).
    pub employer: Decimal,
    /// Fraction deducted from the employee (e.g. 0.20).
    pub employee: Decimal,
}

/// Retry, timeout and concurrency parameters for external lookups.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OracleSettings {
    /// Attempts per key, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Growth factor applied to the delay after each failure.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Cap on the delay between attempts.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Deadline for a single call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum distinct keys looked up at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Endpoint of the classification service.
    #[serde(default)]
    pub classification_url: Option<String>,
    /// Endpoint of the calendar service.
    #[serde(default)]
    pub calendar_url: Option<String>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_concurrency() -> usize {
    4
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_ms: default_timeout_ms(),
            concurrency: default_concurrency(),
            classification_url: None,
            calendar_url: None,
        }
    }
}

impl OracleSettings {
    /// The retry policy these settings describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            backoff_multiplier: self.backoff_multiplier,
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// Audit thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuditSettings {
    /// Largest monetary difference between recomputed and reported totals
    /// that is not reported as an error.
    #[serde(default)]
    pub tolerance: Decimal,
    /// Payable-day deviation from the location median that is flagged.
    #[serde(default = "default_outlier_day_threshold")]
    pub outlier_day_threshold: u32,
    /// Smallest location group considered for outlier detection.
    #[serde(default = "default_outlier_min_group")]
    pub outlier_min_group: usize,
}

fn default_outlier_day_threshold() -> u32 {
    5
}

fn default_outlier_min_group() -> usize {
    3
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            tolerance: Decimal::ZERO,
            outlier_day_threshold: default_outlier_day_threshold(),
            outlier_min_group: default_outlier_min_group(),
        }
    }
}

/// Contents of `run.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunSettings {
    /// Human-readable run name.
    pub name: String,
    /// Billing period.
    pub period: BillingPeriod,
    /// Cost split.
    pub cost_share: CostShare,
    /// Decimal places monetary values are rounded to.
    #[serde(default = "default_currency_scale")]
    pub currency_scale: u32,
    /// Weekdays that never count as payable.
    #[serde(default = "default_weekend_days")]
    pub weekend_days: Vec<Weekday>,
    /// External lookup parameters.
    #[serde(default)]
    pub oracle: OracleSettings,
    /// Audit thresholds.
    #[serde(default)]
    pub audit: AuditSettings,
}

fn default_currency_scale() -> u32 {
    2
}

fn default_weekend_days() -> Vec<Weekday> {
    vec![Weekday::Sat, Weekday::Sun]
}

/// What a deterministic rule matches on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RuleMatcher {
    /// Exact job title (after trimming, case-insensitive).
    TitleEquals(String),
    /// Job title containing the text (case-insensitive).
    TitleContains(String),
    /// Employment status.
    Status(EmploymentStatus),
    /// HR category tag.
    Tag(RecordTag),
}

/// A deterministic exclusion rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExclusionRule {
    /// Identifier reported in the exclusion report.
    pub id: String,
    /// Why the rule exists.
    #[serde(default)]
    pub description: String,
    /// What the rule matches.
    pub matcher: RuleMatcher,
}

/// Contents of `exclusion_rules.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExclusionRulesConfig {
    /// Rules in evaluation order.
    #[serde(default)]
    pub rules: Vec<ExclusionRule>,
}

/// Contents of `daily_rates.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct DailyRatesConfig {
    /// Default daily benefit value keyed by state.
    #[serde(default)]
    pub rates: BTreeMap<String, Decimal>,
}

/// A named holiday in the national-default calendar.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedHoliday {
    /// The date.
    pub date: NaiveDate,
    /// The holiday's name.
    pub name: String,
}

/// Contents of `calendars/national.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct NationalCalendar {
    /// Holidays observed nationwide.
    #[serde(default)]
    pub holidays: Vec<NamedHoliday>,
}

/// Canonical form of a state code: trimmed and uppercased.
pub fn normalize_state(state: &str) -> String {
    state.trim().to_uppercase()
}

/// The complete configuration for one run.
///
/// This struct aggregates all configuration loaded from the various
/// YAML files in a run configuration directory.
#[derive(Debug, Clone)]
pub struct RunConfig {
    settings: RunSettings,
    rules: Vec<ExclusionRule>,
    daily_rates: BTreeMap<String, Decimal>,
    national_calendar: Vec<NamedHoliday>,
}

impl RunConfig {
    /// Creates a new RunConfig from its component parts.
    pub fn new(
        settings: RunSettings,
        rules: Vec<ExclusionRule>,
        daily_rates: BTreeMap<String, Decimal>,
        national_calendar: Vec<NamedHoliday>,
    ) -> Self {
        Self {
            settings,
            rules,
            daily_rates: daily_rates
                .into_iter()
                .map(|(state, rate)| (normalize_state(&state), rate))
                .collect(),
            national_calendar,
        }
    }

    /// Returns the run settings.
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Returns the billing period.
    pub fn period(&self) -> BillingPeriod {
        self.settings.period
    }

    /// Returns the deterministic exclusion rules.
    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    /// Returns the default daily rate for a state, if configured.
    pub fn daily_rate_for_state(&self, state: &str) -> Option<Decimal> {
        self.daily_rates.get(&normalize_state(state)).copied()
    }

    /// Returns the per-state default daily rates, keyed by normalized state.
    pub fn daily_rates(&self) -> &BTreeMap<String, Decimal> {
        &self.daily_rates
    }

    /// Returns the national-default holidays.
    pub fn national_calendar(&self) -> &[NamedHoliday] {
        &self.national_calendar
    }

    /// Returns a copy of this configuration with a different rule list.
    pub fn with_rules(&self, rules: Vec<ExclusionRule>) -> Self {
        Self {
            rules,
            ..self.clone()
        }
    }

    /// Returns a copy of this configuration with different oracle settings.
    pub fn with_oracle_settings(&self, oracle: OracleSettings) -> Self {
        let mut config = self.clone();
        config.settings.oracle = oracle;
        config
    }
}
