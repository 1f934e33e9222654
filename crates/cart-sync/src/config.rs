//! Engine configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! [serving]
//! min = 0.5
//! max = 3.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error while loading or validating an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Range serving sizes are clamped into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for ServingBounds {
    fn default() -> Self {
        Self { min: 0.5, max: 3.0 }
    }
}

impl ServingBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp `value` into `[min, max]`. Never panics; with inverted bounds
    /// the result is `max`.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(ConfigError::Invalid(
                "serving bounds must be finite".to_string(),
            ));
        }
        if self.min <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "serving.min must be positive, got {}",
                self.min
            )));
        }
        if self.min > self.max {
            return Err(ConfigError::Invalid(format!(
                "serving.min ({}) exceeds serving.max ({})",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Configuration for [`CartEngine`](crate::CartEngine).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub serving: ServingBounds,
}

impl EngineConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.serving.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.serving.clamp(10.0), 3.0);
        assert_eq!(config.serving.clamp(0.1), 0.5);
        assert_eq!(config.serving.clamp(1.25), 1.25);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str("[serving]\nmax = 8.0\n").unwrap();
        assert_eq!(config.serving, ServingBounds::new(0.5, 8.0));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = EngineConfig::from_toml_str("[serving]\nmin = 4.0\nmax = 2.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn clamp_tolerates_unvalidated_bounds() {
        let inverted = ServingBounds::new(4.0, 2.0);
        assert!(inverted.validate().is_err());
        assert_eq!(inverted.clamp(1.0), 2.0);
        assert_eq!(ServingBounds::new(f64::NAN, 2.0).clamp(1.0), 1.0);
    }

    #[test]
    fn non_positive_minimum_is_rejected() {
        let err = EngineConfig::from_toml_str("[serving]\nmin = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = EngineConfig::from_toml_str("[serving\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.toml");
        std::fs::write(&path, "[serving]\nmin = 1.0\nmax = 2.0\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.serving, ServingBounds::new(1.0, 2.0));

        let missing = EngineConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io(_)));
    }
}
