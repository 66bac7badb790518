//! Engine configuration.
//!
//! Configuration is a plain value: built once at startup, validated once, then
//! handed to the engine by value. Nothing reads configuration globally.
//!
//! Load order used by [`ResolutionConfig::load`]:
//! 1. JSON file, if a path is given (missing fields fall back to defaults)
//! 2. Environment overrides (`DECAY_HALF_LIFE_DAYS`, `DRIFT_SIGNAL_THRESHOLD`, ...)
//! 3. [`ResolutionConfig::validate`]

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tuning for the resolution policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Days after which credibility halves without reinforcement.
    pub decay_half_life_days: f64,

    /// Signals inside the window needed to force a SUPERSEDE.
    pub drift_signal_threshold: u64,

    /// Width of the signal counting window, in days.
    pub drift_signal_window_days: f64,

    /// Maximum embedding distance still considered a match.
    pub semantic_gate_threshold: f32,

    /// Cap on matcher results.
    pub max_semantic_candidates: usize,

    /// Dimension of every candidate and stored embedding.
    pub embedding_dimension: usize,

    pub retry: RetryConfig,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            decay_half_life_days: 180.0,
            drift_signal_threshold: 3,
            drift_signal_window_days: 30.0,
            semantic_gate_threshold: 0.55,
            max_semantic_candidates: 5,
            embedding_dimension: 3072,
            retry: RetryConfig::default(),
        }
    }
}

/// Bounded retry policy for transient store failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per store call, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 25,
            max_backoff_ms: 500,
        }
    }
}

impl RetryConfig {
    /// No waiting between attempts. Handy for tests.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Backoff before retry number `retry` (1-based), doubling each time.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Widest accepted signal window, in days (100 years).
pub const MAX_SIGNAL_WINDOW_DAYS: f64 = 36_525.0;

const ENV_HALF_LIFE: &str = "DECAY_HALF_LIFE_DAYS";
const ENV_THRESHOLD: &str = "DRIFT_SIGNAL_THRESHOLD";
const ENV_WINDOW: &str = "DRIFT_SIGNAL_WINDOW_DAYS";
const ENV_GATE: &str = "SEMANTIC_GATE_THRESHOLD";
const ENV_MAX_CANDIDATES: &str = "MAX_SEMANTIC_CANDIDATES";
const ENV_DIMENSION: &str = "EMBEDDING_DIMENSION";

impl ResolutionConfig {
    /// Parses a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` on malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read and
    /// `ConfigError::Parse` if it is not valid JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    /// File (or defaults), then environment overrides, then validation.
    ///
    /// # Errors
    ///
    /// Any `ConfigError` from reading, overriding or validating.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::from_json_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from a variable lookup.
    ///
    /// The lookup is injected so tests do not have to mutate the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnv` when a set variable does not parse.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_env(&lookup, ENV_HALF_LIFE)? {
            self.decay_half_life_days = v;
        }
        if let Some(v) = parse_env(&lookup, ENV_THRESHOLD)? {
            self.drift_signal_threshold = v;
        }
        if let Some(v) = parse_env(&lookup, ENV_WINDOW)? {
            self.drift_signal_window_days = v;
        }
        if let Some(v) = parse_env(&lookup, ENV_GATE)? {
            self.semantic_gate_threshold = v;
        }
        if let Some(v) = parse_env(&lookup, ENV_MAX_CANDIDATES)? {
            self.max_semantic_candidates = v;
        }
        if let Some(v) = parse_env(&lookup, ENV_DIMENSION)? {
            self.embedding_dimension = v;
        }
        Ok(())
    }

    /// Checks every field. Called once before the engine starts.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.decay_half_life_days.is_finite() && self.decay_half_life_days > 0.0) {
            return Err(ConfigError::invalid(
                "decay_half_life_days",
                format!("must be a positive number, got {}", self.decay_half_life_days),
            ));
        }
        if self.drift_signal_threshold < 1 {
            return Err(ConfigError::invalid("drift_signal_threshold", "must be >= 1"));
        }
        if !(self.drift_signal_window_days.is_finite() && self.drift_signal_window_days > 0.0) {
            return Err(ConfigError::invalid(
                "drift_signal_window_days",
                format!("must be a positive number, got {}", self.drift_signal_window_days),
            ));
        }
        if self.drift_signal_window_days > MAX_SIGNAL_WINDOW_DAYS {
            return Err(ConfigError::invalid(
                "drift_signal_window_days",
                format!(
                    "must be at most {MAX_SIGNAL_WINDOW_DAYS} days, got {}",
                    self.drift_signal_window_days
                ),
            ));
        }
        if !(self.semantic_gate_threshold.is_finite() && self.semantic_gate_threshold > 0.0) {
            return Err(ConfigError::invalid(
                "semantic_gate_threshold",
                format!("must be a positive distance, got {}", self.semantic_gate_threshold),
            ));
        }
        if self.max_semantic_candidates < 1 {
            return Err(ConfigError::invalid("max_semantic_candidates", "must be >= 1"));
        }
        if self.embedding_dimension < 1 {
            return Err(ConfigError::invalid("embedding_dimension", "must be >= 1"));
        }
        if self.retry.max_attempts < 1 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be >= 1"));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::invalid(
                "retry.initial_backoff_ms",
                "must not exceed retry.max_backoff_ms",
            ));
        }
        Ok(())
    }
}

fn parse_env<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let parsed = raw
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidEnv { var, value: raw.clone() })?;
    tracing::info!("Environment override: {var}={}", raw.trim());
    Ok(Some(parsed))
}

/// Worker runtime sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of single-threaded lanes. A user always maps to the same lane.
    pub lanes: usize,
    /// Maximum queued batches per lane.
    pub queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            lanes: 4,
            queue_capacity: 256,
        }
    }
}
