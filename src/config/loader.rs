//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading run
//! configurations from YAML files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};

use super::types::{
    DailyRatesConfig, ExclusionRulesConfig, NationalCalendar, RunConfig, RunSettings,
};

/// Loads and validates a run configuration.
///
/// # Directory Structure
///
/// ```text
/// config/vr_2025_05/
/// ├── run.yaml              # Period, cost share, weekend days, oracle and audit settings
/// ├── exclusion_rules.yaml  # Deterministic exclusion rules
/// ├── daily_rates.yaml      # Default daily value per state
/// └── calendars/
///     └── national.yaml     # National-default holiday calendar (fallback)
/// ```
///
/// # Example
///
/// ```no_run
/// use meal_benefit_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/vr_2025_05")?;
/// let period = loader.config().period();
/// println!("Billing {} to {}", period.start_date, period.end_date);
/// # Ok::<(), meal_benefit_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: RunConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` instance on success, or an error if:
    /// - Any required file is missing (`ConfigNotFound`)
    /// - Any file contains invalid YAML (`ConfigParseError`)
    /// - Any value fails validation (`InvalidConfig`)
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let settings = Self::load_yaml::<RunSettings>(&path.join("run.yaml"))?;
        let rules = Self::load_yaml::<ExclusionRulesConfig>(&path.join("exclusion_rules.yaml"))?;
        let daily_rates = Self::load_yaml::<DailyRatesConfig>(&path.join("daily_rates.yaml"))?;
        let national =
            Self::load_yaml::<NationalCalendar>(&path.join("calendars").join("national.yaml"))?;

        Self::validate(&settings, &rules, &daily_rates.rates)?;

        let config = RunConfig::new(settings, rules.rules, daily_rates.rates, national.holidays);
        Ok(Self { config })
    }

    /// Wraps an already-built configuration after validating it.
    pub fn from_config(config: RunConfig) -> EngineResult<Self> {
        let rules = ExclusionRulesConfig {
            rules: config.rules().to_vec(),
        };
        Self::validate(config.settings(), &rules, config.daily_rates())?;
        Ok(Self { config })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    fn validate(
        settings: &RunSettings,
        rules: &ExclusionRulesConfig,
        daily_rates: &BTreeMap<String, Decimal>,
    ) -> EngineResult<()> {
        let invalid = |field: &str, message: String| EngineError::InvalidConfig {
            field: field.to_string(),
            message,
        };

        if settings.period.start_date > settings.period.end_date {
            return Err(invalid(
                "period",
                format!(
                    "start {} is after end {}",
                    settings.period.start_date, settings.period.end_date
                ),
            ));
        }

        let share = settings.cost_share;
        if share.employer < Decimal::ZERO || share.employee < Decimal::ZERO {
            return Err(invalid("cost_share", "shares must not be negative".to_string()));
        }
        if share.employer + share.employee != Decimal::ONE {
            return Err(invalid(
                "cost_share",
                format!(
                    "employer {} + employee {} must equal 1",
                    share.employer, share.employee
                ),
            ));
        }

        let oracle = &settings.oracle;
        if oracle.max_attempts == 0 {
            return Err(invalid("oracle.max_attempts", "must be at least 1".to_string()));
        }
        if oracle.concurrency == 0 {
            return Err(invalid("oracle.concurrency", "must be at least 1".to_string()));
        }
        if oracle.timeout_ms == 0 {
            return Err(invalid("oracle.timeout_ms", "must be positive".to_string()));
        }
        if oracle.backoff_multiplier < 1.0 {
            return Err(invalid(
                "oracle.backoff_multiplier",
                "must be at least 1.0".to_string(),
            ));
        }

        if settings.audit.tolerance < Decimal::ZERO {
            return Err(invalid("audit.tolerance", "must not be negative".to_string()));
        }

        for (state, rate) in daily_rates {
            if *rate < Decimal::ZERO {
                return Err(invalid(
                    &format!("daily_rates.{}", state),
                    format!("rate {} must not be negative", rate),
                ));
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        for rule in &rules.rules {
            if rule.id.trim().is_empty() {
                return Err(invalid("rules.id", "rule id must not be empty".to_string()));
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(invalid("rules.id", format!("duplicate rule id '{}'", rule.id)));
            }
        }

        Ok(())
    }

    /// Returns the underlying run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Consumes the loader, returning the configuration.
    pub fn into_config(self) -> RunConfig {
        self.config
    }
}
