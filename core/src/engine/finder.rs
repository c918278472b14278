use tracing::debug;

use super::{floor3, Engine, Step};
use crate::error::EngineError;
use crate::gas::GasMix;
use crate::numeric::round10;
use crate::search::bisect_find;

/// Finder of the first decompression stop.
pub trait FirstStopFinder {
    /// Find first decompression stop using the ascent invariant.
    ///
    /// The search is between `start` step and `depth` (surface or gas
    /// switch depth). Returns `start` when no ascent is possible, otherwise
    /// the ascent step at the first stop depth, a multiple of 3m.
    fn find_first_stop(
        &self,
        engine: &Engine,
        start: &Step,
        depth: f64,
        gas: &GasMix,
    ) -> Result<Step, EngineError>;
}

/// First stop finder evaluating the ascent invariant with the tissue
/// calculator of the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactFinder;

impl FirstStopFinder for ExactFinder {
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

        let ts_3m = engine.ascent_time(3.0);
        let t = round10(engine.ascent_time(start.depth - floor3(depth)));
        let dt = round10(t % ts_3m);
        let n = (t / ts_3m).floor() as usize + 1;
        debug!(time = t, dt, n, "first stop: search range");

        let stop = bisect_first_stop(engine, start, n, dt, gas)?;
        debug!(depth = stop.depth, time = stop.time, "first stop: found");
        Ok(stop)
    }
}

/// Find first decompression stop among the ascent steps of `k * 3m + dt`
/// seconds from `start`, `k` in `[0, n)`.
///
/// The candidate for `k = 0` is `start` itself when `dt` is zero.
pub fn bisect_first_stop(
    engine: &Engine,
    start: &Step,
    n: usize,
    dt: f64,
    gas: &GasMix,
) -> Result<Step, EngineError> {
    let ts_3m = engine.ascent_time(3.0);
    let gf_low = engine.config().gf_low;

    let k = bisect_find(n, |k| {
        if k == 0 && dt == 0.0 {
            return Ok(true);
        }
        let step = engine.step_next_ascent(start, k as f64 * ts_3m + dt, gas, gf_low)?;
        Ok(engine.inv_ascent(&step))
    })?
    .ok_or_else(|| {
        EngineError::Consistency(format!(
            "no safe ascent from {}m to a 3m aligned depth",
            start.depth
        ))
    })?;

    let t = round10(k as f64 * ts_3m + dt);
    if t > 0.0 {
        engine.step_next_ascent(start, t, gas, gf_low)
    } else {
        Ok(start.clone())
    }
}
