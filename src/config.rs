//! Pipeline configuration
//!
//! All constants are fixed when a pipeline is constructed. They can be loaded
//! from JSON (camelCase keys, every key optional) and are validated up front so
//! a bad value fails fast instead of surfacing mid-session.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Label reported by the recognizer for a raised index finger
pub const DEFAULT_ACTIVE_LABEL: &str = "Pointing_Up";

/// Label reported by the recognizer for a flat open hand
pub const DEFAULT_IDLE_LABEL: &str = "Open_Palm";

/// Errors raised while building or loading a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    InvalidConstant { name: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration for a gesture pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Target period between detection passes
    pub frame_interval_ms: f64,
    /// One repaint period; the scheduler yields `budget - cycle duration` after each pass
    pub frame_budget_ms: f64,
    /// Max normalized distance for a detection to keep an existing identity
    pub association_threshold: f64,
    /// Max silence before an identity is removed
    pub expiry_timeout_ms: f64,
    /// Min time between two clicks of the same identity
    pub click_cooldown_ms: f64,
    /// Label whose rising edge produces a click
    pub active_label: String,
    /// Label the pointer fallback reports while the button is up
    pub idle_label: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 1000.0 / 30.0,
            frame_budget_ms: 16.0,
            association_threshold: 0.15,
            expiry_timeout_ms: 250.0,
            click_cooldown_ms: 300.0,
            active_label: DEFAULT_ACTIVE_LABEL.to_string(),
            idle_label: DEFAULT_IDLE_LABEL.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        tracing::debug!("Loaded pipeline config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        positive("frameIntervalMs", self.frame_interval_ms)?;
        positive("frameBudgetMs", self.frame_budget_ms)?;
        positive("associationThreshold", self.association_threshold)?;
        positive("expiryTimeoutMs", self.expiry_timeout_ms)?;

        if !self.click_cooldown_ms.is_finite() || self.click_cooldown_ms < 0.0 {
            return Err(ConfigError::InvalidConstant {
                name: "clickCooldownMs",
                reason: format!("must be a finite, non-negative duration (got {})", self.click_cooldown_ms),
            });
        }

        if self.active_label.is_empty() {
            return Err(invalid("activeLabel", "must not be empty"));
        }
        if self.idle_label.is_empty() {
            return Err(invalid("idleLabel", "must not be empty"));
        }
        if self.active_label == self.idle_label {
            return Err(invalid("idleLabel", "must differ from activeLabel"));
        }

        Ok(())
    }

    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            association_threshold: self.association_threshold,
            expiry_timeout_ms: self.expiry_timeout_ms,
        }
    }

    pub fn clicks(&self) -> ClickConfig {
        ClickConfig {
            active_label: self.active_label.clone(),
            cooldown_ms: self.click_cooldown_ms,
        }
    }
}

/// Constants used by the identity tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    pub association_threshold: f64,
    pub expiry_timeout_ms: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        PipelineConfig::default().tracker()
    }
}

/// Constants used by click derivation
#[derive(Debug, Clone, PartialEq)]
pub struct ClickConfig {
    pub active_label: String,
    pub cooldown_ms: f64,
}

impl Default for ClickConfig {
    fn default() -> Self {
        PipelineConfig::default().clicks()
    }
}

fn positive(name: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidConstant {
            name,
            reason: format!("must be a finite, positive number (got {})", value),
        })
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidConstant {
        name,
        reason: reason.to_string(),
    }
}
