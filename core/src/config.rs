//! Engine configuration.
//!
//! Fixed before a calculation run and read-only while the run lasts.

use serde::{Deserialize, Serialize};

use crate::buhlmann::{ModelVariant, DEFAULT_SURFACE_PRESSURE};
use crate::conveyor::MIN_TIME_DELTA;
use crate::error::EngineError;

/// Which tissue calculator and first stop finder the engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Calculator {
    /// Schreiner equation evaluated on every call.
    #[default]
    Exact,
    /// Precomputed `exp` tables, see [`crate::tab`].
    Tabular,
}

/// Decompression engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Surface pressure (bar).
    #[serde(default = "default_surface_pressure")]
    pub surface_pressure: f64,
    /// Gradient factor low (0.0-1.0)
    #[serde(default = "default_gf_low")]
    pub gf_low: f64,
    /// Gradient factor high (0.0-1.0)
    #[serde(default = "default_gf_high")]
    pub gf_high: f64,
    /// Ascent rate (m/min)
    #[serde(default = "default_ascent_rate")]
    pub ascent_rate: f64,
    /// Descent rate (m/min)
    #[serde(default = "default_descent_rate")]
    pub descent_rate: f64,
    /// Sampling granularity of dive phases (s), no slicing when unset. At
    /// least 0.1s.
    #[serde(default)]
    pub time_delta: Option<f64>,
    /// Perform last decompression stop at 6m instead of 3m.
    #[serde(default)]
    pub last_stop_6m: bool,
    #[serde(default)]
    pub model: ModelVariant,
    #[serde(default)]
    pub calculator: Calculator,
}

fn default_surface_pressure() -> f64 {
    DEFAULT_SURFACE_PRESSURE
}

fn default_gf_low() -> f64 {
    0.30
}

fn default_gf_high() -> f64 {
    0.85
}

fn default_ascent_rate() -> f64 {
    10.0
}

fn default_descent_rate() -> f64 {
    10.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            surface_pressure: default_surface_pressure(),
            gf_low: default_gf_low(),
            gf_high: default_gf_high(),
            ascent_rate: default_ascent_rate(),
            descent_rate: default_descent_rate(),
            time_delta: None,
            last_stop_6m: false,
            model: ModelVariant::default(),
            calculator: Calculator::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON, missing fields take default values.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.surface_pressure > 0.0) {
            return Err(EngineError::Config(format!(
                "surface pressure must be positive, got {}",
                self.surface_pressure
            )));
        }
        if !(self.gf_low > 0.0 && self.gf_low <= 1.0) || !(self.gf_high > 0.0 && self.gf_high <= 1.0)
        {
            return Err(EngineError::Config(format!(
                "gradient factors must be within (0, 1], got {}/{}",
                self.gf_low, self.gf_high
            )));
        }
        if self.gf_low > self.gf_high {
            return Err(EngineError::Config(format!(
                "gf low {} is higher than gf high {}",
                self.gf_low, self.gf_high
            )));
        }
        if !(self.ascent_rate > 0.0) || !(self.descent_rate > 0.0) {
            return Err(EngineError::Config(format!(
                "ascent and descent rates must be positive, got {}/{}",
                self.ascent_rate, self.descent_rate
            )));
        }
        if let Some(delta) = self.time_delta {
            if !(delta >= MIN_TIME_DELTA) {
                return Err(EngineError::Config(format!(
                    "time delta below {MIN_TIME_DELTA}s not supported, got {delta}"
                )));
            }
        }
        if self.calculator == Calculator::Tabular && self.ascent_rate != 10.0 {
            return Err(EngineError::Config(format!(
                "tabular calculator requires 10m/min ascent rate, got {}",
                self.ascent_rate
            )));
        }
        Ok(())
    }
}
