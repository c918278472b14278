//! Dive decompression engine.
//!
//! The engine calculates a dive profile as a chain of [`Step`] records:
//! descent, time at the bottom, free ascent and decompression stops. The
//! tissue model ([`ZhL16Gf`]) and the first decompression stop finder
//! ([`FirstStopFinder`]) are replaceable parts; [`Calculator::Tabular`]
//! swaps both for the tabular implementations from [`crate::tab`]. Descent,
//! and any exposure the tissue calculator cannot split into its supported
//! times, is calculated with the exact Schreiner calculator.
//!
//! Bottom time is counted from leaving the surface, so time spent at the
//! maximum depth is the bottom time less the descent.
//!
//! # Example
//!
//! ```
//! use deco_compute::{DecoTable, Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig::default()).expect("valid config");
//! engine.add_gas(0.0, 21.0).expect("valid gas");
//!
//! let mut table = DecoTable::default();
//! let steps = engine
//!     .calculate(40.0, 25.0)
//!     .expect("gas configured")
//!     .with_sink(&mut table)
//!     .collect::<Result<Vec<_>, _>>()
//!     .expect("profile calculated");
//!
//! assert_eq!(steps.last().map(|s| s.depth), Some(0.0));
//! assert!(!table.stops().is_empty());
//! ```

mod finder;
mod profile;

pub use finder::{bisect_first_stop, ExactFinder, FirstStopFinder};
pub use profile::DiveProfile;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::buhlmann::{Tissues, ZhL16Gf, METER_TO_BAR};
use crate::config::{Calculator, EngineConfig};
use crate::conveyor::Conveyor;
use crate::error::EngineError;
use crate::gas::{GasList, GasMix};
use crate::numeric::round10;
use crate::search::{bisect_find, recurse_while};
use crate::tab::{TabularCalculator, TabularFinder, MAX_DEPTH_CHANGE};

/// Tolerance of "target reached" comparisons.
pub const EPSILON: f64 = 1e-10;

/// Length of a block of the linear decompression stop search (min).
const DECO_STOP_BLOCK: usize = 64;

/// Upper bound of linear search blocks for a single decompression stop
/// (48h).
const MAX_DECO_STOP_BLOCKS: usize = 45;

/// Dive phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Start,
    Descent,
    Const,
    Ascent,
    DecoStop,
}

/// Dive step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub phase: Phase,
    /// Depth of dive [m].
    pub depth: f64,
    /// Time of dive [s].
    pub time: f64,
    /// Absolute pressure at depth [bar].
    pub pressure: f64,
    pub gas: GasMix,
    pub tissues: Tissues<f64>,
    /// Gradient factor value used to produce the step.
    pub gf: f64,
    /// Index of previous step in [`DiveProfile::history`].
    pub prev: Option<usize>,
}

/// Largest multiple of 3m not deeper than `depth`.
pub(crate) fn floor3(depth: f64) -> f64 {
    (depth / 3.0).floor() * 3.0
}

/// Dive decompression engine.
pub struct Engine {
    config: EngineConfig,
    gases: GasList,
    model: ZhL16Gf<f64>,
    exact: ZhL16Gf<f64>,
    finder: Box<dyn FirstStopFinder>,
    conveyor: Conveyor,
}

impl Engine {
    /// Create engine with tissue calculator and first stop finder selected
    /// by `config.calculator`.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let (model, finder): (ZhL16Gf<f64>, Box<dyn FirstStopFinder>) = match config.calculator {
            Calculator::Exact => (ZhL16Gf::new(config.model), Box::new(ExactFinder)),
            Calculator::Tabular => {
                let calc = TabularCalculator::<f64>::new(MAX_DEPTH_CHANGE);
                let finder = TabularFinder::new(calc.max_time());
                (
                    ZhL16Gf::with_calculator(config.model, Box::new(calc)),
                    Box::new(finder),
                )
            }
        };
        Self::with_parts(config, model, finder)
    }

    /// Create engine with custom model and first stop finder.
    pub fn with_parts(
        config: EngineConfig,
        model: ZhL16Gf<f64>,
        finder: Box<dyn FirstStopFinder>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let conveyor = Conveyor::new(config.time_delta);
        Ok(Engine {
            gases: GasList::new(),
            exact: ZhL16Gf::new(config.model),
            config,
            model,
            finder,
            conveyor,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model(&self) -> &ZhL16Gf<f64> {
        &self.model
    }

    pub fn gases(&self) -> &GasList {
        &self.gases
    }

    /// Add gas mix to gas mix list, see [`GasList`] for the rules.
    pub fn add_gas(&mut self, depth: f64, o2: f64) -> Result<(), EngineError> {
        self.gases.add_gas(depth, o2)
    }

    /// Add gas mix with helium to gas mix list.
    pub fn add_mix(&mut self, depth: f64, o2: f64, he: f64) -> Result<(), EngineError> {
        self.gases.add_mix(depth, o2, he)
    }

    /// Add travel gas mix, used on descent only.
    pub fn add_travel(&mut self, depth: f64, o2: f64, he: f64) -> Result<(), EngineError> {
        self.gases.add_travel(depth, o2, he)
    }

    pub fn set_gases(&mut self, gases: GasList) {
        self.gases = gases;
    }

    /// Calculate dive profile.
    ///
    /// Bottom time includes descent.
    ///
    /// - `depth`: maximum depth [m]
    /// - `time`: bottom time [min]
    pub fn calculate(&self, depth: f64, time: f64) -> Result<DiveProfile<'_>, EngineError> {
        self.check_time_delta();

        if self.gases.mixes().is_empty() {
            return Err(EngineError::Config("no gas mixes configured".to_string()));
        }
        if !(depth > 0.0) {
            return Err(EngineError::Config(format!(
                "dive depth must be positive, got {depth}"
            )));
        }
        if !(time >= 0.0) {
            return Err(EngineError::Config(format!(
                "bottom time cannot be negative, got {time}"
            )));
        }
        let descent = depth * 60.0 / self.config.descent_rate;
        let at_depth = round10(time * 60.0 - descent);
        if at_depth < 0.0 {
            return Err(EngineError::Config(format!(
                "bottom time {time}min is shorter than descent to {depth}m ({descent}s)"
            )));
        }

        Ok(DiveProfile::new(self, depth, at_depth))
    }

    fn check_time_delta(&self) {
        let Some(delta) = self.config.time_delta else {
            return;
        };
        if delta < 60.0 && (60.0 / delta).fract() != 0.0 {
            warn!(delta, "possible calculation problems: time delta does not divide 60 evenly");
        } else if delta >= 60.0 && delta % 60.0 != 0.0 {
            warn!(delta, "possible calculation problems: time delta modulo 60 not zero");
        }
    }

    // ------------------------------------------------------------------
    // Conversions and invariants
    // ------------------------------------------------------------------

    /// Convert depth [m] to absolute pressure [bar].
    pub fn to_pressure(&self, depth: f64) -> f64 {
        depth * METER_TO_BAR + self.config.surface_pressure
    }

    /// Depth travelled in `time` seconds at `rate` [m/min].
    pub fn to_depth(&self, time: f64, rate: f64) -> f64 {
        time * rate / 60.0
    }

    /// Time [s] to ascend `depth` metres at the configured ascent rate.
    pub fn ascent_time(&self, depth: f64) -> f64 {
        depth * 60.0 / self.config.ascent_rate
    }

    /// Maximum tissue pressure limit for gradient factor `gf`.
    pub fn max_tissue_pressure(&self, tissues: &Tissues<f64>, gf: f64) -> f64 {
        self.model.ceiling(gf, tissues)
    }

    /// True if ascent from the step is possible, checked with gradient
    /// factor low.
    pub fn inv_ascent(&self, step: &Step) -> bool {
        step.pressure > self.max_tissue_pressure(&step.tissues, self.config.gf_low)
    }

    /// True if one should stay at a decompression stop.
    ///
    /// Tissue pressure limit is calculated (with gradient factor `gf`) for
    /// the next stop reached after `time` seconds of ascent, the stop
    /// continues while that ascent is not possible.
    fn inv_deco_stop(
        &self,
        step: &Step,
        gas: &GasMix,
        gf: f64,
        time: f64,
    ) -> Result<bool, EngineError> {
        let tissues = self.tissue_pressure_ascent(step.pressure, time, gas, &step.tissues)?;
        let max_tp = self.max_tissue_pressure(&tissues, gf);
        let next = step.depth - self.to_depth(time, self.config.ascent_rate);
        Ok(self.to_pressure(next) <= max_tp)
    }

    // ------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------

    /// Create dive step record, pressure is calculated from depth.
    pub fn step(
        &self,
        phase: Phase,
        depth: f64,
        time: f64,
        gas: &GasMix,
        tissues: Tissues<f64>,
        gf: f64,
    ) -> Step {
        Step {
            phase,
            depth,
            time,
            pressure: self.to_pressure(depth),
            gas: *gas,
            tissues,
            gf,
            prev: None,
        }
    }

    /// Next dive step at constant depth, `time` seconds later.
    pub fn step_next(
        &self,
        step: &Step,
        time: f64,
        gas: &GasMix,
        gf: f64,
        phase: Phase,
    ) -> Result<Step, EngineError> {
        let tissues = self.tissue_pressure_const(step.pressure, time, gas, &step.tissues)?;
        Ok(self.step(phase, step.depth, step.time + time, gas, tissues, gf))
    }

    /// Next dive step after `time` seconds of descent.
    pub fn step_next_descent(
        &self,
        step: &Step,
        time: f64,
        gas: &GasMix,
    ) -> Result<Step, EngineError> {
        let tissues = self.tissue_pressure_descent(step.pressure, time, gas, &step.tissues)?;
        let depth = step.depth + self.to_depth(time, self.config.descent_rate);
        Ok(self.step(
            Phase::Descent,
            depth,
            step.time + time,
            gas,
            tissues,
            self.config.gf_low,
        ))
    }

    /// Next dive step after `time` seconds of ascent.
    pub fn step_next_ascent(
        &self,
        step: &Step,
        time: f64,
        gas: &GasMix,
        gf: f64,
    ) -> Result<Step, EngineError> {
        let tissues = self.tissue_pressure_ascent(step.pressure, time, gas, &step.tissues)?;
        let depth = step.depth - self.to_depth(time, self.config.ascent_rate);
        Ok(self.step(Phase::Ascent, depth, step.time + time, gas, tissues, gf))
    }

    fn tissue_pressure_const(
        &self,
        abs_p: f64,
        time: f64,
        gas: &GasMix,
        tissues: &Tissues<f64>,
    ) -> Result<Tissues<f64>, EngineError> {
        self.load(abs_p, time, gas, 0.0, tissues)
    }

    fn tissue_pressure_descent(
        &self,
        abs_p: f64,
        time: f64,
        gas: &GasMix,
        tissues: &Tissues<f64>,
    ) -> Result<Tissues<f64>, EngineError> {
        let rate = self.config.descent_rate * METER_TO_BAR;
        self.exact.load(abs_p, time, gas, rate, tissues)
    }

    fn tissue_pressure_ascent(
        &self,
        abs_p: f64,
        time: f64,
        gas: &GasMix,
        tissues: &Tissues<f64>,
    ) -> Result<Tissues<f64>, EngineError> {
        let rate = -self.config.ascent_rate * METER_TO_BAR;
        self.load(abs_p, time, gas, rate, tissues)
    }

    /// Load tissues, exposure time split into the parts accepted by the
    /// tissue calculator. Exact calculator is used when the time cannot be
    /// split.
    fn load(
        &self,
        abs_p: f64,
        time: f64,
        gas: &GasMix,
        rate: f64,
        tissues: &Tissues<f64>,
    ) -> Result<Tissues<f64>, EngineError> {
        let Some(parts) = self.model.calculator().partition(time) else {
            trace!(time, "exposure time not supported by tissue calculator");
            return self.exact.load(abs_p, time, gas, rate, tissues);
        };

        let mut abs_p = abs_p;
        let mut tissues = *tissues;
        for part in parts {
            tissues = self.model.load(abs_p, part, gas, rate, &tissues)?;
            abs_p += rate * part / 60.0;
        }
        Ok(tissues)
    }

    // ------------------------------------------------------------------
    // Dive phases
    // ------------------------------------------------------------------

    /// Descent from surface to `depth`, starting with the START step.
    pub fn dive_descent(&self, depth: f64, gas: &GasMix) -> Result<Vec<Step>, EngineError> {
        self.dive_descent_stages(&[(depth, *gas)])
    }

    /// Descent from surface through `stages`, each one a destination depth
    /// and the gas mix breathed to reach it (see
    /// [`GasList::descent_stages`]).
    pub fn dive_descent_stages(&self, stages: &[(f64, GasMix)]) -> Result<Vec<Step>, EngineError> {
        let Some((_, first)) = stages.first() else {
            return Err(EngineError::Config("no descent gas mix".to_string()));
        };
        let tissues = self.model.init(self.config.surface_pressure);
        let mut step = self.step(Phase::Start, 0.0, 0.0, first, tissues, self.config.gf_low);
        let mut steps = vec![step.clone()];

        for (depth, gas) in stages {
            let time = (depth - step.depth) * 60.0 / self.config.descent_rate;
            debug!(to = depth, time, o2 = gas.o2, he = gas.he, "descent");
            for tray in self.conveyor.trays(step.time, step.time + time) {
                step = self.step_next_descent(&step, tray.d_time, gas)?;
                steps.push(step.clone());
            }
        }
        debug!(depth = step.depth, time = step.time, "descent finished");
        Ok(steps)
    }

    /// Stay at depth of `start` step for `time` seconds.
    pub fn dive_const(
        &self,
        start: &Step,
        time: f64,
        gas: &GasMix,
    ) -> Result<Vec<Step>, EngineError> {
        let mut step = start.clone();
        let mut steps = Vec::new();
        for tray in self.conveyor.trays(start.time, start.time + time) {
            step = self.step_next(&step, tray.d_time, gas, self.config.gf_low, Phase::Const)?;
            steps.push(step.clone());
        }
        Ok(steps)
    }

    /// Ascent from `start` to `stop` without decompression stops.
    ///
    /// It is caller responsibility to provide destination step outside of
    /// decompression zone. The last produced step has to match the
    /// destination step.
    pub fn free_ascent(
        &self,
        start: &Step,
        stop: &Step,
        gas: &GasMix,
    ) -> Result<Vec<Step>, EngineError> {
        debug!(
            from = start.depth,
            from_time = start.time,
            to = stop.depth,
            to_time = stop.time,
            "ascent"
        );

        let mut step = start.clone();
        let mut steps = Vec::new();
        for tray in self.conveyor.trays(start.time, stop.time) {
            step = self.step_next_ascent(&step, tray.d_time, gas, self.config.gf_low)?;
            steps.push(step.clone());
        }
        debug!(depth = step.depth, "ascent finished");

        if (step.depth - stop.depth).abs() >= EPSILON {
            return Err(EngineError::Consistency(format!(
                "free ascent finished at {}m ({}s), expected {}m ({}s)",
                step.depth, step.time, stop.depth, stop.time
            )));
        }
        let diff = step.tissues.max_diff(&stop.tissues);
        if diff >= EPSILON {
            return Err(EngineError::Consistency(format!(
                "free ascent tissue pressure differs by {diff} at {}m",
                step.depth
            )));
        }
        Ok(steps)
    }

    /// Find first decompression stop between `start` and `depth` (surface or
    /// gas switch depth) with the configured finder.
    pub fn find_first_stop(
        &self,
        start: &Step,
        depth: f64,
        gas: &GasMix,
    ) -> Result<Step, EngineError> {
        self.finder.find_first_stop(self, start, depth, gas)
    }

    /// Single decompression stop at depth of `step`.
    ///
    /// The stop lasts until ascent to the next stop, `ascent` seconds away,
    /// is possible with gradient factor `gf_next`. Returns the DECOSTOP
    /// steps followed by the ascent step to the next stop.
    fn deco_stop(
        &self,
        step: &Step,
        gas: &GasMix,
        gf: f64,
        ascent: f64,
        gf_next: f64,
    ) -> Result<Vec<Step>, EngineError> {
        let block = (DECO_STOP_BLOCK * 60) as f64;
        let inv = |s: &Step| self.inv_deco_stop(s, gas, gf_next, ascent);

        let l_step = recurse_while(
            &inv,
            |s| self.step_next(s, block, gas, gf, Phase::DecoStop),
            step.clone(),
            MAX_DECO_STOP_BLOCKS,
        )?;
        debug!(time = l_step.time, "deco stop: linear find finished");

        let k = bisect_find(DECO_STOP_BLOCK + 1, |k| {
            if k == 0 {
                return Ok(true);
            }
            let next = self.step_next(&l_step, (k * 60) as f64, gas, gf, Phase::DecoStop)?;
            inv(&next)
        })?
        .ok_or_else(|| EngineError::Consistency("deco stop search space exhausted".to_string()))?;

        let raw = l_step.time - step.time + ((k + 1) * 60) as f64;
        let t = raw.round();
        if (raw - t).abs() > 1e-6 || t % 60.0 != 0.0 {
            return Err(EngineError::Consistency(format!(
                "deco stop time {raw}s is not a multiple of 60s"
            )));
        }
        debug!(depth = step.depth, time = t, gf, "deco stop: search completed");

        let mut current = step.clone();
        let mut steps = Vec::new();
        for tray in self.conveyor.trays(step.time, step.time + t) {
            current = self.step_next(&current, tray.d_time, gas, gf, Phase::DecoStop)?;
            steps.push(current.clone());
        }

        steps.push(self.step_next_ascent(&current, ascent, gas, gf_next)?);
        Ok(steps)
    }
}
