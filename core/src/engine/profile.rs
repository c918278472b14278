use std::collections::VecDeque;

use tracing::debug;

use super::{floor3, Engine, Step, EPSILON};
use crate::error::EngineError;
use crate::gas::GasMix;
use crate::numeric::round10;
use crate::sink::StepSink;

/// Decompression stops of one ascent segment.
#[derive(Debug, Clone, Copy)]
struct DecoRun {
    segment: usize,
    first_stop: f64,
    gf_step: f64,
    gf_start: f64,
    k_stop: usize,
    n_stops: usize,
    target: f64,
    gas: GasMix,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Descent,
    Bottom,
    Ascent(usize),
    Deco(DecoRun),
    Done,
}

/// Lazily calculated dive profile.
///
/// Steps are calculated phase by phase as the iterator is advanced. Every
/// emitted step is recorded in [`DiveProfile::history`] and passed to the
/// attached sinks. After an error the iterator is fused.
pub struct DiveProfile<'a> {
    engine: &'a Engine,
    // descent stages, destination depth and gas
    descent: Vec<(f64, GasMix)>,
    bottom_time: f64,
    gas: GasMix,
    segments: Vec<(f64, GasMix)>,
    stage: Stage,
    pending: VecDeque<Step>,
    tail: Option<Step>,
    history: Vec<Step>,
    sinks: Vec<&'a mut dyn StepSink>,
}

impl<'a> DiveProfile<'a> {
    /// Profile of a dive to `depth` with `bottom_time` seconds spent at
    /// the depth.
    pub(super) fn new(engine: &'a Engine, depth: f64, bottom_time: f64) -> Self {
        let descent = engine.gases().descent_stages(depth);
        let gas = descent.last().map_or_else(GasMix::air, |(_, gas)| *gas);
        DiveProfile {
            engine,
            descent,
            bottom_time,
            gas,
            segments: engine.gases().segments(),
            stage: Stage::Descent,
            pending: VecDeque::new(),
            tail: None,
            history: Vec::new(),
            sinks: Vec::new(),
        }
    }

    /// Attach a sink receiving every emitted step.
    pub fn with_sink(mut self, sink: &'a mut dyn StepSink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Steps emitted so far, [`Step::prev`] indexes into this slice.
    pub fn history(&self) -> &[Step] {
        &self.history
    }

    /// Previous step of `step`, if any.
    pub fn prev(&self, step: &Step) -> Option<&Step> {
        step.prev.and_then(|i| self.history.get(i))
    }

    fn emit(&mut self, mut step: Step) -> Step {
        step.prev = self.history.len().checked_sub(1);
        for sink in self.sinks.iter_mut() {
            sink.on_step(&step);
        }
        self.history.push(step.clone());
        step
    }

    fn queue(&mut self, steps: Vec<Step>) {
        if let Some(last) = steps.last() {
            self.tail = Some(last.clone());
        }
        self.pending.extend(steps);
    }

    /// Last calculated step, emitted or not.
    fn tail(&self) -> Result<Step, EngineError> {
        self.tail
            .clone()
            .ok_or_else(|| EngineError::Consistency("dive profile has no steps".to_string()))
    }

    /// Calculate next part of the profile, false when the profile is
    /// complete.
    fn advance(&mut self) -> Result<bool, EngineError> {
        match self.stage {
            Stage::Descent => {
                let steps = self.engine.dive_descent_stages(&self.descent)?;
                self.queue(steps);
                self.stage = Stage::Bottom;
            }
            Stage::Bottom => {
                let start = self.tail()?;
                let steps = self.engine.dive_const(&start, self.bottom_time, &self.gas)?;
                self.queue(steps);
                self.stage = Stage::Ascent(0);
            }
            Stage::Ascent(segment) => self.ascent(segment)?,
            Stage::Deco(run) => self.deco(run)?,
            Stage::Done => return Ok(false),
        }
        Ok(true)
    }

    /// Ascend to the destination of the segment, switch to decompression
    /// stops when free ascent is not possible.
    fn ascent(&mut self, segment: usize) -> Result<(), EngineError> {
        let Some(&(depth, gas)) = self.segments.get(segment) else {
            self.finish();
            return Ok(());
        };
        let engine = self.engine;
        let step = self.tail()?;
        let target = floor3(depth);

        if round10(step.depth - target) <= 0.0 {
            debug!(depth = step.depth, target, "ascent: segment skipped");
            self.stage = Stage::Ascent(segment + 1);
            return Ok(());
        }

        let time = engine.ascent_time(step.depth - target);
        let mut stop = engine.step_next_ascent(&step, time, &gas, engine.config().gf_low)?;
        let deco = !engine.inv_ascent(&stop);
        if deco {
            stop = engine.find_first_stop(&step, depth, &gas)?;
        }

        if (stop.depth - step.depth).abs() > EPSILON {
            let steps = engine.free_ascent(&step, &stop, &gas)?;
            self.queue(steps);
        }

        if !deco {
            self.stage = Stage::Ascent(segment + 1);
            return Ok(());
        }

        let first_stop = self.tail()?.depth;
        let aligned = round10(first_stop);
        if aligned <= 0.0 || aligned % 3.0 != 0.0 {
            return Err(EngineError::Consistency(format!(
                "first stop at {first_stop}m is not a positive multiple of 3m"
            )));
        }
        let config = engine.config();
        let gf_step = (config.gf_high - config.gf_low) / (aligned / 3.0).round();
        debug!(first_stop, gf_step, "deco engine: first stop found");

        self.enter_deco(segment, first_stop, gf_step)
    }

    fn enter_deco(
        &mut self,
        segment: usize,
        first_stop: f64,
        gf_step: f64,
    ) -> Result<(), EngineError> {
        let Some(&(depth, gas)) = self.segments.get(segment) else {
            self.finish();
            return Ok(());
        };
        let step = self.tail()?;
        let target = floor3(depth);
        let n_stops = ((step.depth - target) / 3.0).round().max(0.0) as usize;
        let gf_start =
            self.engine.config().gf_low + (first_stop - step.depth) / 3.0 * gf_step;
        debug!(
            depth = step.depth,
            target,
            n_stops,
            gf_start,
            "deco engine: segment"
        );

        self.stage = Stage::Deco(DecoRun {
            segment,
            first_stop,
            gf_step,
            gf_start,
            k_stop: 0,
            n_stops,
            target,
            gas,
        });
        Ok(())
    }

    /// Single decompression stop of the current segment.
    fn deco(&mut self, mut run: DecoRun) -> Result<(), EngineError> {
        if run.k_stop >= run.n_stops {
            return self.enter_deco(run.segment + 1, run.first_stop, run.gf_step);
        }

        let engine = self.engine;
        let step = self.tail()?;
        let gf = run.gf_start + run.k_stop as f64 * run.gf_step;
        let ts_3m = engine.ascent_time(3.0);

        let last_6m = engine.config().last_stop_6m
            && run.target == 0.0
            && (round10(step.depth) - 6.0).abs() < EPSILON;
        let (ascent, gf_next) = if last_6m {
            (2.0 * ts_3m, gf + 2.0 * run.gf_step)
        } else {
            (ts_3m, gf + run.gf_step)
        };

        let steps = engine.deco_stop(&step, &run.gas, gf, ascent, gf_next)?;
        self.queue(steps);

        run.k_stop = if last_6m { run.n_stops } else { run.k_stop + 1 };
        self.stage = Stage::Deco(run);
        Ok(())
    }

    fn finish(&mut self) {
        if let Some(step) = &self.tail {
            debug!(depth = step.depth, time = step.time, gf = step.gf, "dive finished");
        }
        self.stage = Stage::Done;
    }
}

impl Iterator for DiveProfile<'_> {
    type Item = Result<Step, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(step) = self.pending.pop_front() {
                return Some(Ok(self.emit(step)));
            }
            match self.advance() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => {
                    self.stage = Stage::Done;
                    self.pending.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}
