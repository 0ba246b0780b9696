//! Engine configuration
//!
//! All business constants (rounding, variance band, POC blend, scenario
//! multipliers) live here so they can be tuned without touching the
//! calculators. `EngineConfig::default()` reproduces the reference values.

use std::path::Path;
use std::str::FromStr;

use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::DEFAULT_UNASSIGNED_LABEL;
use crate::cash::ScenarioMultipliers;
use crate::coverage::PocWeights;
use crate::error::{EngineError, EngineResult};
use crate::money::RoundingPolicy;
use crate::variance::VarianceThresholds;

/// Environment variables read by `with_env_overrides`
pub const ENV_BASE_MULTIPLIER: &str = "ENGINE_BASE_MULTIPLIER";
pub const ENV_OPTIMISTIC_MULTIPLIER: &str = "ENGINE_OPTIMISTIC_MULTIPLIER";
pub const ENV_CONSERVATIVE_MULTIPLIER: &str = "ENGINE_CONSERVATIVE_MULTIPLIER";
pub const ENV_VARIANCE_THRESHOLD: &str = "ENGINE_VARIANCE_THRESHOLD";
pub const ENV_POC_HOURS_WEIGHT: &str = "ENGINE_POC_HOURS_WEIGHT";

/// Container for every tunable policy constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rounding: RoundingPolicy,
    pub variance: VarianceThresholds,
    pub poc: PocWeights,
    pub scenarios: ScenarioMultipliers,
    /// Group value for records missing a grouped dimension
    pub unassigned_label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rounding: RoundingPolicy::default(),
            variance: VarianceThresholds::default(),
            poc: PocWeights::default(),
            scenarios: ScenarioMultipliers::default(),
            unassigned_label: DEFAULT_UNASSIGNED_LABEL.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; absent fields keep their defaults
    pub fn from_json_path(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        debug!("loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `ENGINE_*` environment variables
    pub fn with_env_overrides(self) -> EngineResult<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Overlay values from an arbitrary lookup (environment, test map, ...)
    pub fn with_overrides<F>(mut self, lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_override(&lookup, ENV_BASE_MULTIPLIER)? {
            self.scenarios.base = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_OPTIMISTIC_MULTIPLIER)? {
            self.scenarios.optimistic = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_CONSERVATIVE_MULTIPLIER)? {
            self.scenarios.conservative = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_VARIANCE_THRESHOLD)? {
            self.variance.within_expectation_percent = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_POC_HOURS_WEIGHT)? {
            self.poc = PocWeights::hours_weighted(v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.scenarios.validate()?;
        self.poc.validate()?;
        self.variance.validate()?;
        if self.unassigned_label.trim().is_empty() {
            return Err(EngineError::invalid_input("unassigned_label", "must not be blank"));
        }
        if self.rounding.decimal_places > 28 || self.rounding.percent_decimal_places > 28 {
            return Err(EngineError::invalid_input("rounding", "at most 28 decimal places"));
        }
        Ok(())
    }
}

fn parse_override<F>(lookup: &F, name: &str) -> EngineResult<Option<Decimal>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => Decimal::from_str(raw.trim())
            .map(Some)
            .map_err(|e| EngineError::invalid_input(name, format!("{:?}: {}", raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.scenarios.base, dec!(1.0));
        assert_eq!(config.scenarios.optimistic, dec!(1.15));
        assert_eq!(config.scenarios.conservative, dec!(0.80));
        assert_eq!(config.poc.hours_weight, dec!(0.5));
        assert_eq!(config.poc.cost_weight, dec!(0.5));
        assert_eq!(config.variance.within_expectation_percent, dec!(5));
        assert_eq!(config.unassigned_label, "unassigned");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(r#"{"scenarios": {"optimistic": "1.25"}}"#).unwrap();
        assert_eq!(config.scenarios.optimistic, dec!(1.25));
        assert_eq!(config.scenarios.conservative, dec!(0.80));
        assert_eq!(config.rounding.decimal_places, 2);
    }

    #[test]
    fn test_invalid_json_config_rejected() {
        let err = EngineConfig::from_json_str(r#"{"poc": {"hours_weight": "0.7", "cost_weight": "0.7"}}"#)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { .. }));

        assert!(matches!(
            EngineConfig::from_json_str("{not json").unwrap_err(),
            EngineError::Load(_)
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_CONSERVATIVE_MULTIPLIER, "0.75"),
            (ENV_POC_HOURS_WEIGHT, "0.6"),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::default()
            .with_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.scenarios.conservative, dec!(0.75));
        assert_eq!(config.poc.hours_weight, dec!(0.6));
        assert_eq!(config.poc.cost_weight, dec!(0.4));
        assert_eq!(config.scenarios.optimistic, dec!(1.15));
    }

    #[test]
    fn test_unparseable_override() {
        let err = EngineConfig::default()
            .with_overrides(|name| (name == ENV_VARIANCE_THRESHOLD).then(|| "five".to_string()))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { ref field, .. } if field == ENV_VARIANCE_THRESHOLD));
    }
}
