//! Dive decompression profile calculation.
//!
//! Bühlmann ZH-L16 tissue model with gradient factors, an exact and a
//! tabular tissue calculator, and the engine producing a dive profile as a
//! sequence of dive steps.

pub mod buhlmann;
pub mod config;
pub mod conveyor;
pub mod engine;
pub mod error;
pub mod gas;
pub mod models;
pub mod numeric;
pub mod plan;
pub mod search;
pub mod sink;
pub mod tab;

uniffi::setup_scaffolding!();

pub use buhlmann::{ModelVariant, Tissues, ZhL16Gf};
pub use config::{Calculator, EngineConfig};
pub use engine::{DiveProfile, Engine, Phase, Step};
pub use error::EngineError;
pub use gas::{GasList, GasMix};
pub use models::{DecoStopRecord, GasMixInput, PlanError, PlanRequest, PlanResult};
pub use plan::plan_dive;
pub use sink::{DecoStop, DecoTable, DiveSummary, StepSink};
