//! Breathing gas mixes and the ordered gas mix list of a dive.
//!
//! Gas mixes can be built programmatically with [`GasList::add_gas`] and
//! [`GasList::add_mix`] or parsed from the compact notation understood by
//! [`parse_gas_list`].
//!
//! # Notation
//!
//! - `air`, `o2`: air (21% O2) and oxygen
//! - `ean32`, `32`: nitrox with 32% O2
//! - `21/35`: trimix with 21% O2 and 35% He
//! - `@22`: optional switch depth in metres (0m when omitted)
//! - `travel`: optional suffix marking a travel gas mix, i.e. `ean36 travel`
//!
//! ```
//! use deco_compute::gas::parse_gas_list;
//!
//! let gases = parse_gas_list("air, ean50@22, o2@6").expect("valid notation");
//! assert_eq!(gases.len(), 3);
//! assert_eq!(gases.mixes()[1].o2, 50.0);
//! ```

pub mod parser;

pub use parser::{parse_gas_list, parse_mix};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Gas mix configuration.
///
/// Percentages of O2, N2 and He always sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasMix {
    /// Gas mix switch depth [m].
    pub depth: f64,
    pub o2: f64,
    pub n2: f64,
    pub he: f64,
    /// Travel gas mix, breathed on descent only.
    #[serde(default)]
    pub travel: bool,
}

impl GasMix {
    /// Create gas mix, nitrogen takes the remainder.
    pub fn new(depth: f64, o2: f64, he: f64) -> Result<Self, EngineError> {
        if !(0.0..=100.0).contains(&o2) || !(0.0..=100.0).contains(&he) || o2 + he > 100.0 {
            return Err(EngineError::InvalidGasMix { o2, he });
        }
        if depth < 0.0 {
            return Err(EngineError::GasOrder {
                depth,
                message: "switch depth cannot be negative".to_string(),
            });
        }
        Ok(GasMix {
            depth,
            o2,
            n2: 100.0 - o2 - he,
            he,
            travel: false,
        })
    }

    pub fn air() -> Self {
        GasMix {
            depth: 0.0,
            o2: 21.0,
            n2: 79.0,
            he: 0.0,
            travel: false,
        }
    }

    /// Same gas at another switch depth.
    pub fn at(self, depth: f64) -> Self {
        GasMix { depth, ..self }
    }

    /// Same gas used as travel gas mix.
    pub fn as_travel(self) -> Self {
        GasMix {
            travel: true,
            ..self
        }
    }
}

/// Ordered list of gas mixes used during a dive.
///
/// Travel gas mixes are breathed on descent only, bottom gas mixes on the
/// bottom and on ascent (the first one is also the last descent gas).
///
/// Rules
///
/// 1. First gas mix switch depth is 0m, travel gas mix or not.
/// 2. Travel gas mixes are added before bottom gas mixes, each one deeper
///    than the previous one.
/// 3. With travel gas mixes, first bottom gas mix switch depth is deeper
///    than the last travel gas mix.
/// 4. Second or later gas mix switch depth is greater than 0m.
/// 5. Third or later bottom gas mix switch depth is not deeper than the
///    last one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GasList {
    travel: Vec<GasMix>,
    mixes: Vec<GasMix>,
}

fn order_error(depth: f64, message: impl Into<String>) -> EngineError {
    EngineError::GasOrder {
        depth,
        message: message.into(),
    }
}

impl GasList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add nitrox (or air) gas mix.
    pub fn add_gas(&mut self, depth: f64, o2: f64) -> Result<(), EngineError> {
        self.add_mix(depth, o2, 0.0)
    }

    /// Add gas mix with helium.
    pub fn add_mix(&mut self, depth: f64, o2: f64, he: f64) -> Result<(), EngineError> {
        let mix = GasMix::new(depth, o2, he)?;
        self.push(mix)
    }

    /// Add travel gas mix.
    pub fn add_travel(&mut self, depth: f64, o2: f64, he: f64) -> Result<(), EngineError> {
        let mix = GasMix::new(depth, o2, he)?.as_travel();
        self.push(mix)
    }

    /// Append gas mix, checking switch depth ordering.
    pub fn push(&mut self, mix: GasMix) -> Result<(), EngineError> {
        let depth = mix.depth;
        let first = self.is_empty();
        if first && depth != 0.0 {
            return Err(order_error(depth, "first gas mix switch depth should be at 0m"));
        }
        if !first && depth == 0.0 {
            return Err(order_error(
                depth,
                "second or later gas mix switch depth should be > 0m",
            ));
        }

        if mix.travel {
            if !self.mixes.is_empty() {
                return Err(order_error(
                    depth,
                    "travel gas mix should be added before bottom gas mixes",
                ));
            }
            if let Some(last) = self.travel.last() {
                if depth <= last.depth {
                    return Err(order_error(
                        depth,
                        format!(
                            "travel gas mix switch depth should be deeper than last one ({}m)",
                            last.depth
                        ),
                    ));
                }
            }
            self.travel.push(mix);
            return Ok(());
        }

        match (self.mixes.last(), self.travel.last()) {
            (None, Some(travel)) if depth <= travel.depth => {
                return Err(order_error(
                    depth,
                    format!(
                        "first bottom gas mix switch depth should be deeper than last travel gas mix ({}m)",
                        travel.depth
                    ),
                ));
            }
            (Some(last), _) if self.mixes.len() > 1 && last.depth < depth => {
                return Err(order_error(
                    depth,
                    format!(
                        "gas mix switch depth should be shallower than last one ({}m)",
                        last.depth
                    ),
                ));
            }
            _ => {}
        }
        self.mixes.push(mix);
        Ok(())
    }

    /// Bottom and decompression gas mixes, travel gas mixes excluded.
    pub fn mixes(&self) -> &[GasMix] {
        &self.mixes
    }

    pub fn travel_mixes(&self) -> &[GasMix] {
        &self.travel
    }

    /// Number of gas mixes, travel gas mixes included.
    pub fn len(&self) -> usize {
        self.travel.len() + self.mixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.travel.is_empty() && self.mixes.is_empty()
    }

    /// Descent stages to `depth` as (destination depth, gas used to reach
    /// it).
    ///
    /// Travel gas mixes are used in order, followed by the first bottom gas
    /// mix. Gas mixes with switch depth not shallower than `depth` are not
    /// used.
    pub fn descent_stages(&self, depth: f64) -> Vec<(f64, GasMix)> {
        let gases: Vec<GasMix> = self
            .travel
            .iter()
            .chain(self.mixes.first())
            .copied()
            .collect();

        let mut stages = Vec::new();
        for (i, gas) in gases.iter().enumerate() {
            if i > 0 && gas.depth >= depth {
                break;
            }
            let end = gases.get(i + 1).map_or(depth, |next| next.depth.min(depth));
            stages.push((end, *gas));
        }
        stages
    }

    /// Ascent segments as (destination depth, gas used to reach it).
    ///
    /// `(0m, 21%), (22m, 50%), (6m, 100%)` becomes
    /// `(22m, 21%), (6m, 50%), (0m, 100%)`. Travel gas mixes are not used
    /// on ascent.
    pub fn segments(&self) -> Vec<(f64, GasMix)> {
        let mut segments: Vec<(f64, GasMix)> = self
            .mixes
            .windows(2)
            .map(|w| (w[1].depth, w[0]))
            .collect();
        if let Some(last) = self.mixes.last() {
            segments.push((0.0, *last));
        }
        segments
    }
}

impl TryFrom<Vec<GasMix>> for GasList {
    type Error = EngineError;

    fn try_from(mixes: Vec<GasMix>) -> Result<Self, Self::Error> {
        let mut list = GasList::new();
        for mix in mixes {
            list.push(mix)?;
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_mix_nitrogen_remainder() {
        let mix = GasMix::new(0.0, 21.0, 35.0).unwrap();
        assert_eq!(mix.n2, 44.0);
        assert_eq!(GasMix::air().n2, 79.0);
    }

    #[test]
    fn test_invalid_gas_fractions() {
        assert!(matches!(
            GasMix::new(0.0, 60.0, 50.0),
            Err(EngineError::InvalidGasMix { .. })
        ));
        assert!(matches!(
            GasMix::new(0.0, 120.0, 0.0),
            Err(EngineError::InvalidGasMix { .. })
        ));
    }

    #[test]
    fn test_first_gas_at_surface() {
        let mut gases = GasList::new();
        let err = gases.add_gas(22.0, 50.0).unwrap_err();
        assert!(matches!(err, EngineError::GasOrder { depth, .. } if depth == 22.0));
        assert!(gases.is_empty());
    }

    #[test]
    fn test_second_gas_not_at_surface() {
        let mut gases = GasList::new();
        gases.add_gas(0.0, 21.0).unwrap();
        assert!(gases.add_gas(0.0, 50.0).is_err());
    }

    #[test]
    fn test_gas_order() {
        let mut gases = GasList::new();
        gases.add_gas(0.0, 21.0).unwrap();
        gases.add_gas(22.0, 50.0).unwrap();
        assert!(gases.add_gas(24.0, 80.0).is_err());
        gases.add_gas(6.0, 100.0).unwrap();
        assert_eq!(gases.len(), 3);
    }

    #[test]
    fn test_segments() {
        let mut gases = GasList::new();
        gases.add_gas(0.0, 21.0).unwrap();
        gases.add_gas(22.0, 50.0).unwrap();
        gases.add_gas(6.0, 100.0).unwrap();

        let segments = gases.segments();
        let depths: Vec<f64> = segments.iter().map(|(d, _)| *d).collect();
        let o2: Vec<f64> = segments.iter().map(|(_, g)| g.o2).collect();
        assert_eq!(depths, vec![22.0, 6.0, 0.0]);
        assert_eq!(o2, vec![21.0, 50.0, 100.0]);
    }

    #[test]
    fn test_segments_single_gas() {
        let mut gases = GasList::new();
        gases.add_gas(0.0, 32.0).unwrap();
        let segments = gases.segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].0, 0.0);
        assert_eq!(segments[0].1.o2, 32.0);
    }

    fn travel_list() -> GasList {
        let mut gases = GasList::new();
        gases.add_travel(0.0, 36.0, 0.0).unwrap();
        gases.add_mix(33.0, 13.0, 50.0).unwrap();
        gases.add_gas(33.0, 36.0).unwrap();
        gases.add_gas(21.0, 50.0).unwrap();
        gases.add_gas(9.0, 80.0).unwrap();
        gases
    }

    #[test]
    fn test_travel_gas_rules() {
        let gases = travel_list();
        assert_eq!(gases.len(), 5);
        assert_eq!(gases.travel_mixes().len(), 1);
        assert!(gases.travel_mixes()[0].travel);
        assert_eq!(gases.mixes()[0].he, 50.0);

        let mut gases = GasList::new();
        gases.add_travel(0.0, 36.0, 0.0).unwrap();
        assert!(gases.add_gas(0.0, 21.0).is_err());
        assert!(gases.add_travel(0.0, 32.0, 0.0).is_err());
        gases.add_travel(20.0, 32.0, 0.0).unwrap();
        assert!(gases.add_mix(15.0, 18.0, 45.0).is_err());
        gases.add_mix(30.0, 18.0, 45.0).unwrap();
        assert!(gases.add_travel(40.0, 21.0, 0.0).is_err());

        let mut gases = GasList::new();
        assert!(gases.add_travel(10.0, 36.0, 0.0).is_err());
    }

    #[test]
    fn test_travel_gas_not_used_on_ascent() {
        let segments = travel_list().segments();
        let depths: Vec<f64> = segments.iter().map(|(d, _)| *d).collect();
        let o2: Vec<f64> = segments.iter().map(|(_, g)| g.o2).collect();
        assert_eq!(depths, vec![33.0, 21.0, 9.0, 0.0]);
        assert_eq!(o2, vec![13.0, 36.0, 50.0, 80.0]);
        assert!(segments.iter().all(|(_, g)| !g.travel));
    }

    #[test]
    fn test_descent_stages() {
        let stages = travel_list().descent_stages(90.0);
        assert_eq!(stages.len(), 2);
        assert_eq!((stages[0].0, stages[0].1.o2, stages[0].1.travel), (33.0, 36.0, true));
        assert_eq!((stages[1].0, stages[1].1.o2), (90.0, 13.0));

        // dive shallower than bottom gas switch depth stays on travel gas
        let stages = travel_list().descent_stages(30.0);
        assert_eq!(stages.len(), 1);
        assert_eq!((stages[0].0, stages[0].1.o2), (30.0, 36.0));

        let mut gases = GasList::new();
        gases.add_gas(0.0, 21.0).unwrap();
        gases.add_gas(22.0, 50.0).unwrap();
        let stages = gases.descent_stages(40.0);
        assert_eq!(stages.len(), 1);
        assert_eq!((stages[0].0, stages[0].1.o2), (40.0, 21.0));
    }
}
