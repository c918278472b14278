//! Listeners of dive profile steps.
//!
//! A [`StepSink`] receives every step emitted by a [`DiveProfile`] in
//! order. The sinks here summarize a profile without keeping its steps.
//!
//! [`DiveProfile`]: crate::engine::DiveProfile

use serde::Serialize;

use crate::engine::{Phase, Step};

/// Receiver of dive profile steps.
pub trait StepSink {
    fn on_step(&mut self, step: &Step);
}

impl<F: FnMut(&Step)> StepSink for F {
    fn on_step(&mut self, step: &Step) {
        self(step)
    }
}

/// Decompression stop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecoStop {
    /// Depth of the stop (m).
    pub depth: f64,
    /// Length of the stop (min).
    pub time: f64,
}

/// Decompression table, collects the decompression stops of a dive.
#[derive(Debug, Clone, Default)]
pub struct DecoTable {
    // depth, start and end time of each stop (s)
    stops: Vec<(f64, f64, f64)>,
    last_time: f64,
}

impl DecoTable {
    /// Decompression stops, in dive order.
    pub fn stops(&self) -> Vec<DecoStop> {
        self.stops
            .iter()
            .map(|&(depth, start, end)| DecoStop {
                depth,
                time: ((end - start) / 60.0).round(),
            })
            .collect()
    }

    /// Total decompression time (min).
    pub fn total(&self) -> f64 {
        self.stops().iter().map(|s| s.time).sum()
    }
}

impl StepSink for DecoTable {
    fn on_step(&mut self, step: &Step) {
        if step.phase == Phase::DecoStop {
            let same_depth = self.stops.last().is_some_and(|s| s.0 == step.depth);
            if same_depth {
                if let Some(stop) = self.stops.last_mut() {
                    stop.2 = step.time;
                }
            } else {
                self.stops.push((step.depth, self.last_time, step.time));
            }
        }
        self.last_time = step.time;
    }
}

/// Summary of a dive profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiveSummary {
    /// Dive runtime (s).
    pub runtime: f64,
    /// Maximum depth (m).
    pub max_depth: f64,
    /// Time spent descending (s).
    pub descent_time: f64,
    /// Time spent at the bottom (s).
    pub bottom_time: f64,
    /// Time spent ascending (s).
    pub ascent_time: f64,
    /// Time spent at decompression stops (s).
    pub deco_time: f64,
    pub gas_switch_count: u32,
    /// Gradient factor of the last step.
    pub surface_gf: f64,
    pub step_count: usize,
    #[serde(skip)]
    last_gas: Option<(f64, f64)>,
}

impl StepSink for DiveSummary {
    fn on_step(&mut self, step: &Step) {
        let dt = step.time - self.runtime;
        match step.phase {
            Phase::Start => {}
            Phase::Descent => self.descent_time += dt,
            Phase::Const => self.bottom_time += dt,
            Phase::Ascent => self.ascent_time += dt,
            Phase::DecoStop => self.deco_time += dt,
        }

        let gas = (step.gas.o2, step.gas.he);
        if self.last_gas.is_some_and(|g| g != gas) {
            self.gas_switch_count += 1;
        }
        self.last_gas = Some(gas);

        self.runtime = step.time;
        self.max_depth = self.max_depth.max(step.depth);
        self.surface_gf = step.gf;
        self.step_count += 1;
    }
}
