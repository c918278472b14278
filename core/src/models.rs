//! Records exchanged with the mobile bindings.

use crate::error::EngineError;

#[derive(Clone, Debug, PartialEq, uniffi::Record)]
pub struct GasMixInput {
    pub switch_depth_m: f64,
    pub o2_percent: f64,
    pub he_percent: f64,
    /// Breathed on descent only.
    pub travel: bool,
}

#[derive(Clone, Debug, PartialEq, uniffi::Record)]
pub struct PlanRequest {
    pub depth_m: f64,
    /// Bottom time, descent included.
    pub bottom_time_min: f64,
    /// Gas mixes in switch order, the first one at 0m. Travel gas mixes
    /// come first.
    pub gas_mixes: Vec<GasMixInput>,
    pub gf_low: f64,
    pub gf_high: f64,
    pub last_stop_6m: bool,
    pub tabular: bool,
}

#[derive(Clone, Debug, PartialEq, uniffi::Record)]
pub struct DecoStopRecord {
    pub depth_m: f64,
    pub duration_min: f64,
}

#[derive(Clone, Debug, PartialEq, uniffi::Record)]
pub struct PlanResult {
    pub stops: Vec<DecoStopRecord>,
    pub total_deco_min: f64,
    pub runtime_min: f64,
    pub max_depth_m: f64,
    pub surface_gf: f64,
    pub gas_switch_count: u32,
    pub step_count: u64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error, uniffi::Error)]
pub enum PlanError {
    #[error("invalid dive plan: {message}")]
    InvalidPlan { message: String },

    #[error("calculation failed: {message}")]
    Calculation { message: String },
}

impl From<EngineError> for PlanError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Config(_)
            | EngineError::InvalidGasMix { .. }
            | EngineError::GasOrder { .. }
            | EngineError::Parse { .. } => PlanError::InvalidPlan {
                message: err.to_string(),
            },
            EngineError::InvalidExposureTime { .. } | EngineError::Consistency(_) => {
                PlanError::Calculation {
                    message: err.to_string(),
                }
            }
        }
    }
}
