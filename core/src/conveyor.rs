//! Time-stepping of dive phases.
//!
//! A phase between two points in time is sliced into trays no longer than
//! the configured time delta, so a dive profile can be sampled with a fixed
//! granularity.

use crate::numeric::round10;

/// Sub-interval of a dive phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tray {
    /// Time at the end of the tray (s since start of the dive).
    pub time: f64,
    /// Length of the tray (s).
    pub d_time: f64,
}

/// Smallest supported time delta (s).
pub const MIN_TIME_DELTA: f64 = 0.1;

/// Time-stepper, `None` time delta produces a single tray per phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Conveyor {
    pub time_delta: Option<f64>,
}

impl Conveyor {
    pub fn new(time_delta: Option<f64>) -> Self {
        Conveyor { time_delta }
    }

    /// Slice time between `t_start` and `t_end` into trays.
    ///
    /// Tray lengths sum to `t_end - t_start`, no tray is produced for an
    /// empty interval. Trays are produced on demand.
    pub fn trays(&self, t_start: f64, t_end: f64) -> Trays {
        let total = round10(t_end - t_start);
        let (delta, n) = match self.time_delta {
            Some(delta) if delta > 0.0 && delta < total => {
                (delta, (total / delta).floor() as usize)
            }
            _ => (total, 0),
        };
        Trays {
            t_start,
            t_end,
            delta,
            n,
            k: 0,
            done: total <= 0.0,
        }
    }
}

/// Iterator over the trays of a dive phase, see [`Conveyor::trays`].
#[derive(Debug, Clone)]
pub struct Trays {
    t_start: f64,
    t_end: f64,
    delta: f64,
    // number of full trays
    n: usize,
    k: usize,
    done: bool,
}

impl Iterator for Trays {
    type Item = Tray;

    fn next(&mut self) -> Option<Tray> {
        if self.done {
            return None;
        }
        if self.k < self.n {
            self.k += 1;
            return Some(Tray {
                time: self.t_start + self.k as f64 * self.delta,
                d_time: self.delta,
            });
        }

        self.done = true;
        let rest = round10(self.t_end - self.t_start - self.n as f64 * self.delta);
        (rest > 0.0).then_some(Tray {
            time: self.t_end,
            d_time: rest,
        })
    }
}
