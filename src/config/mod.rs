//! Configuration loading and management for the meal benefit engine.
//!
//! This module provides functionality to load a run configuration from YAML
//! files: billing period, cost share, weekend days, oracle parameters,
//! deterministic exclusion rules, default daily rates and the national
//! fallback calendar.
//!
//! # Example
//!
//! ```no_run
//! use meal_benefit_engine::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load("./config/vr_2025_05").unwrap();
//! println!("Loaded run: {}", loader.config().settings().name);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    AuditSettings, CostShare, DailyRatesConfig, ExclusionRule, ExclusionRulesConfig,
    NamedHoliday, NationalCalendar, OracleSettings, RuleMatcher, RunConfig, RunSettings,
    normalize_state,
};
