//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Base time granularity, in minutes. Durations and "now" are rounded
/// up to a multiple of this before slot computation.
pub const DEFAULT_QUANTUM_MINUTES: u32 = 15;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Granularity quantum, in minutes. Must be positive and divide 60.
    pub quantum_minutes: u32,
    /// How far from today, in days, a week overview may start.
    pub max_overview_offset_days: i64,
    /// Defaults applied when a provider schedule omits a value.
    pub provider_defaults: ProviderDefaults,
}

/// Default values for newly created provider schedules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderDefaults {
    /// Default slot size, in minutes. Used as the duration when booking
    /// a break without an explicit one.
    pub slot_minutes: u32,
    /// Default currency code attached to new schedules.
    pub currency: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quantum_minutes: DEFAULT_QUANTUM_MINUTES,
            max_overview_offset_days: 365,
            provider_defaults: ProviderDefaults::default(),
        }
    }
}

impl Default for ProviderDefaults {
    fn default() -> Self {
        Self {
            slot_minutes: DEFAULT_QUANTUM_MINUTES,
            currency: "UAH".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file if it exists, defaults otherwise.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::info!("Loading config from: {}", path.display());
            Self::from_file(path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(EngineConfig::default())
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.quantum_minutes == 0 || 60 % self.quantum_minutes != 0 {
            return Err(ConfigError::Invalid(format!(
                "quantum_minutes must be a positive divisor of 60, got {}",
                self.quantum_minutes
            ))
            .into());
        }
        if self.provider_defaults.slot_minutes == 0
            || self.provider_defaults.slot_minutes % self.quantum_minutes != 0
        {
            return Err(ConfigError::Invalid(format!(
                "provider_defaults.slot_minutes must be a positive multiple of {}, got {}",
                self.quantum_minutes, self.provider_defaults.slot_minutes
            ))
            .into());
        }
        if self.max_overview_offset_days < 0 {
            return Err(
                ConfigError::Invalid("max_overview_offset_days must be non-negative".into()).into(),
            );
        }
        Ok(())
    }
}
