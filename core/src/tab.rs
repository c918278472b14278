//! Tabular tissue calculator.
//!
//! The values of `exp` used by the Schreiner equation are precomputed for a
//! small set of exposure times:
//!
//! - 6s and 12s (1m and 2m of ascent at 10m/min)
//! - 60s (1 minute of a decompression stop)
//! - multiples of 18s (3m of ascent) up to the maximum depth change
//!
//! Longer exposures are split with [`TissueCalculator::partition`]. An
//! exposure, which cannot be split into table times, is left to the exact
//! calculator by the engine; [`TabularCalculator`] itself rejects it with
//! [`EngineError::InvalidExposureTime`].
//!
//! The tables assume ascent rate of 10m/min.

use tracing::debug;

use crate::buhlmann::{eq_schreiner_t, half_lives, TissueCalculator, LOG_2, NUM_COMPARTMENTS};
use crate::engine::{bisect_first_stop, floor3, Engine, FirstStopFinder, Step};
use crate::error::EngineError;
use crate::gas::GasMix;
use crate::numeric::{round10, Real};

/// Maximum depth change covered by the exp tables (m).
pub const MAX_DEPTH_CHANGE: usize = 30;

const TS_3M: f64 = 18.0;
const TS_1M: f64 = 6.0;

type Exp<T> = [T; NUM_COMPARTMENTS];

fn exposure(time: f64, half_life: &[f64; NUM_COMPARTMENTS]) -> [f64; NUM_COMPARTMENTS] {
    half_life.map(|hl| (-time / 60.0 * LOG_2 / hl).exp())
}

/// Tissue calculator using precomputed `exp` values.
#[derive(Debug, Clone)]
pub struct TabularCalculator<T> {
    n2_half_life: Exp<T>,
    he_half_life: Exp<T>,
    n2_exp_3m: Vec<Exp<T>>,
    he_exp_3m: Vec<Exp<T>>,
    n2_exp_1m: Exp<T>,
    he_exp_1m: Exp<T>,
    n2_exp_2m: Exp<T>,
    he_exp_2m: Exp<T>,
    n2_exp_1min: Exp<T>,
    he_exp_1min: Exp<T>,
    max_time: f64,
}

impl<T: Real> TabularCalculator<T> {
    /// Create calculator with exp tables covering `max_depth` metres of
    /// ascent.
    pub fn new(max_depth: usize) -> Self {
        let (n2_hl, he_hl) = half_lives();
        let conv = |v: [f64; NUM_COMPARTMENTS]| v.map(T::from_f64);
        let n = max_depth / 3;

        TabularCalculator {
            n2_half_life: conv(*n2_hl),
            he_half_life: conv(*he_hl),
            n2_exp_3m: (1..=n).map(|k| conv(exposure(k as f64 * TS_3M, n2_hl))).collect(),
            he_exp_3m: (1..=n).map(|k| conv(exposure(k as f64 * TS_3M, he_hl))).collect(),
            n2_exp_1m: conv(exposure(6.0, n2_hl)),
            he_exp_1m: conv(exposure(6.0, he_hl)),
            n2_exp_2m: conv(exposure(12.0, n2_hl)),
            he_exp_2m: conv(exposure(12.0, he_hl)),
            n2_exp_1min: conv(exposure(60.0, n2_hl)),
            he_exp_1min: conv(exposure(60.0, he_hl)),
            max_time: n as f64 * TS_3M,
        }
    }

    /// Longest exposure time covered by the tables (s).
    pub fn max_time(&self) -> f64 {
        self.max_time
    }

    fn lookup(&self, time: f64) -> Option<(&Exp<T>, &Exp<T>)> {
        if time == 6.0 {
            return Some((&self.n2_exp_1m, &self.he_exp_1m));
        }
        if time == 12.0 {
            return Some((&self.n2_exp_2m, &self.he_exp_2m));
        }
        if time == 60.0 {
            return Some((&self.n2_exp_1min, &self.he_exp_1min));
        }
        if time >= TS_3M && time <= self.max_time && time % TS_3M == 0.0 {
            let idx = (time / TS_3M) as usize - 1;
            return Some((&self.n2_exp_3m[idx], &self.he_exp_3m[idx]));
        }
        None
    }
}

impl<T: Real> TissueCalculator<T> for TabularCalculator<T> {
    fn load_tissue(
        &self,
        abs_p: T,
        time: f64,
        gas: &GasMix,
        rate: T,
        p_n2: T,
        p_he: T,
        tissue_no: usize,
    ) -> Result<(T, T), EngineError> {
        let time = round10(time);
        let (n2_exp, he_exp) = self
            .lookup(time)
            .ok_or(EngineError::InvalidExposureTime { time })?;

        let fn2 = T::from_f64(gas.n2 / 100.0);
        let fhe = T::from_f64(gas.he / 100.0);
        let p_n2 = eq_schreiner_t(
            abs_p,
            time,
            fn2,
            rate,
            p_n2,
            self.n2_half_life[tissue_no],
            n2_exp[tissue_no],
        );
        let p_he = eq_schreiner_t(
            abs_p,
            time,
            fhe,
            rate,
            p_he,
            self.he_half_life[tissue_no],
            he_exp[tissue_no],
        );
        Ok((p_n2, p_he))
    }

    /// Split time into maximum table times, a multiple of 18s and a 6s or
    /// 12s remainder.
    fn partition(&self, time: f64) -> Option<Vec<f64>> {
        let mut rest = round10(time);
        let mut parts = Vec::new();
        if rest <= 0.0 {
            return Some(parts);
        }

        while rest > self.max_time {
            parts.push(self.max_time);
            rest = round10(rest - self.max_time);
        }

        if rest > 0.0 && self.lookup(rest).is_none() {
            let r = round10(rest % TS_3M);
            let q = round10(rest - r);
            if q > 0.0 && (r == 6.0 || r == 12.0) {
                parts.push(q);
                rest = r;
            }
        }
        if rest > 0.0 {
            self.lookup(rest)?;
            parts.push(rest);
        }
        Some(parts)
    }
}

/// First stop finder for the tabular calculator.
///
/// Ascent is performed in windows of the maximum table time while the
/// ascent invariant holds, the first stop is found within the last window.
#[derive(Debug, Clone, Copy)]
pub struct TabularFinder {
    max_time: f64,
}

impl TabularFinder {
    pub fn new(max_time: f64) -> Self {
        TabularFinder { max_time }
    }
}

impl FirstStopFinder for TabularFinder {
    fn find_first_stop(
        &self,
        engine: &Engine,
        start: &Step,
        depth: f64,
        gas: &GasMix,
    ) -> Result<Step, EngineError> {
        if start.depth <= depth {
            return Err(EngineError::Consistency(format!(
                "first stop search from {}m to {depth}m is not an ascent",
                start.depth
            )));
        }

        let gf_low = engine.config().gf_low;
        let target = floor3(depth);

        // ascent to depth divisible by 3; whole metres on the 6s grid, the
        // rest of a fractional depth separately
        let t = round10(engine.ascent_time(start.depth - floor3(start.depth)));
        let t_grid = (t / TS_1M).trunc() * TS_1M;
        let mut step = start.clone();
        for part in [t_grid, round10(t - t_grid)] {
            if part > 0.0 {
                step = engine.step_next_ascent(&step, part, gas, gf_low)?;
            }
        }
        if !engine.inv_ascent(&step) {
            return Err(EngineError::Consistency(format!(
                "no safe ascent from {}m to a 3m aligned depth",
                start.depth
            )));
        }

        let window = |s: &Step| self.max_time.min(round10(engine.ascent_time(s.depth - target)));
        let limit = (start.depth / 3.0).ceil() as usize + 1;
        let mut found = None;
        for _ in 0..limit {
            let w = window(&step);
            if w <= 0.0 {
                found = Some(step.clone());
                break;
            }
            let next = engine.step_next_ascent(&step, w, gas, gf_low)?;
            if !engine.inv_ascent(&next) {
                let n = (w / engine.ascent_time(3.0)).round() as usize;
                debug!(depth = step.depth, window = w, n, "first stop: tabular window");
                found = Some(bisect_first_stop(engine, &step, n, 0.0, gas)?);
                break;
            }
            step = next;
        }

        let stop = found.ok_or_else(|| {
            EngineError::Consistency(format!(
                "first stop search from {}m did not finish",
                start.depth
            ))
        })?;
        debug!(depth = stop.depth, time = stop.time, "first stop: found");
        Ok(stop)
    }
}
