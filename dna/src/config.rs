use std::collections::HashMap;
use std::time::Duration;

use dna_integration::{BackoffPolicy, LimitTable, RequestKind};
use dna_sim::SimulationConfig;
use dna_store::CURRENT_SCHEMA_VERSION;
use dna_validate::ValidatorConfig;
use dna_instrument::ParamSet;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Per-kind token-bucket override, mirroring [`dna_integration::LimitTable`]
/// but with plain, serializable fields instead of [`Duration`] (§6).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RateLimitOverride {
    pub capacity: u32,
    pub window_secs: u64,
}

/// Exponential backoff knobs, mirroring [`dna_integration::retry::BackoffPolicy`]
/// in a serializable shape. `max_attempts` is the attempt cap applied
/// uniformly across request kinds, since the Rate Governor retries with a
/// single policy per instance.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BackoffConfig {
    pub base_secs: f64,
    pub factor: u32,
    pub cap_secs: f64,
    pub jitter: f64,
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        let defaults = BackoffPolicy::default();
        Self {
            base_secs: defaults.base.as_secs_f64(),
            factor: defaults.factor,
            cap_secs: defaults.cap.as_secs_f64(),
            jitter: defaults.jitter,
            max_attempts: defaults.max_attempts,
        }
    }
}

impl From<BackoffConfig> for BackoffPolicy {
    fn from(config: BackoffConfig) -> Self {
        BackoffPolicy {
            base: Duration::from_secs_f64(config.base_secs.max(0.0)),
            factor: config.factor.max(1),
            cap: Duration::from_secs_f64(config.cap_secs.max(0.0)),
            jitter: config.jitter.clamp(0.0, 1.0),
            max_attempts: config.max_attempts.max(1),
        }
    }
}

/// Rate Governor configuration (§4.1, §6): per-kind capacity overrides plus
/// one backoff policy shared by every kind.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub overrides: HashMap<RequestKind, RateLimitOverride>,
    pub backoff: BackoffConfig,
}

impl RateLimitConfig {
    pub fn to_limit_table(&self) -> LimitTable {
        self.overrides
            .iter()
            .map(|(kind, limit)| (*kind, (limit.capacity, Duration::from_secs(limit.window_secs))))
            .collect()
    }
}

/// Top-level pipeline configuration (§6). Deserialized with
/// `deny_unknown_fields` so an unrecognized option is a startup-time
/// [`CoreError::ConfigInvalid`] rather than a silently ignored typo.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    pub broker_endpoint: String,
    pub broker_client_id: String,
    pub rate_limits: RateLimitConfig,
    pub validator: ValidatorConfig,
    pub simulation: SimulationConfig,
    /// Indicator families to run for every tracked (symbol, timeframe).
    pub indicators: Vec<ParamSet>,
    pub max_bars_per_request: u32,
    /// Upper bound on concurrently-running (symbol, timeframe) workers;
    /// clamped at runtime to `min(worker_budget, hardware_cores)` (§5).
    pub worker_budget: usize,
    pub storage_connection_string: String,
    pub schema_version: u32,
}

impl Configuration {
    /// Cross-field validation beyond what serde's typed deserialization
    /// already enforces (§6, §7 `ConfigInvalid`).
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.broker_endpoint.trim().is_empty() {
            return Err(CoreError::ConfigInvalid("broker_endpoint must not be empty".into()));
        }
        if self.broker_client_id.trim().is_empty() {
            return Err(CoreError::ConfigInvalid("broker_client_id must not be empty".into()));
        }
        if self.max_bars_per_request == 0 {
            return Err(CoreError::ConfigInvalid("max_bars_per_request must be at least 1".into()));
        }
        if self.worker_budget == 0 {
            return Err(CoreError::ConfigInvalid("worker_budget must be at least 1".into()));
        }
        if self.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(CoreError::ConfigInvalid(format!(
                "schema_version {} is newer than this binary understands ({})",
                self.schema_version, CURRENT_SCHEMA_VERSION
            )));
        }
        if self.indicators.is_empty() {
            return Err(CoreError::ConfigInvalid(
                "indicators must list at least one enabled parameter set".into(),
            ));
        }
        if self.validator.acceptance_threshold > 100 {
            return Err(CoreError::ConfigInvalid(
                "validator.acceptance_threshold must be a percentage in 0..=100".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            broker_endpoint: "mock://local".to_string(),
            broker_client_id: "dna-pipeline".to_string(),
            rate_limits: RateLimitConfig::default(),
            validator: ValidatorConfig::default(),
            simulation: SimulationConfig::default(),
            indicators: vec![
                ParamSet::Sma { period: 20 },
                ParamSet::Ema { period: 20 },
                ParamSet::Rsi { period: 14 },
            ],
            max_bars_per_request: 1000,
            worker_budget: 8,
            storage_connection_string: "memory://dna".to_string(),
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_validates() {
        assert!(Configuration::default().validate().is_ok());
    }

    #[test]
    fn empty_broker_endpoint_is_invalid() {
        let mut config = Configuration::default();
        config.broker_endpoint = String::new();
        assert!(matches!(config.validate(), Err(CoreError::ConfigInvalid(_))));
    }

    #[test]
    fn schema_version_ahead_of_the_binary_is_invalid() {
        let mut config = Configuration::default();
        config.schema_version = CURRENT_SCHEMA_VERSION + 1;
        assert!(matches!(config.validate(), Err(CoreError::ConfigInvalid(_))));
    }

    #[test]
    fn rate_limit_overrides_convert_to_a_limit_table() {
        let mut config = RateLimitConfig::default();
        config.overrides.insert(
            RequestKind::Historical,
            RateLimitOverride {
                capacity: 6,
                window_secs: 60,
            },
        );
        let table = config.to_limit_table();
        assert_eq!(table.get(&RequestKind::Historical), Some(&(6, Duration::from_secs(60))));
    }
}
