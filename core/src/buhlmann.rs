//! Bühlmann ZH-L16 tissue model with gradient factors.
//!
//! Implements a 16-compartment tissue model using the Schreiner equation to
//! calculate inert gas (nitrogen and helium) loading over an exposure
//! interval with a linearly changing ambient pressure, and the gradient
//! factor scaled tolerated ambient pressure (Erik Baker's formula) used as
//! the ascent ceiling.
//!
//! The per-compartment equation is evaluated by a [`TissueCalculator`], so
//! the exact calculator can be swapped for the tabular one in
//! [`crate::tab`] without touching the model.

use crate::error::EngineError;
use crate::gas::GasMix;
use crate::numeric::Real;

// ============================================================================
// Physical Constants
// ============================================================================

/// Water vapour pressure in the lungs (bar), at 37°C.
pub const WATER_VAPOUR_PRESSURE: f64 = 0.0627;

/// Pressure increase per metre of sea water (bar/m).
pub const METER_TO_BAR: f64 = 0.09985;

/// Default surface atmospheric pressure (bar) at sea level.
pub const DEFAULT_SURFACE_PRESSURE: f64 = 1.01325;

/// Fraction of N2 in air.
const AIR_FN2: f64 = 0.7902;

/// Natural logarithm of 2.
pub const LOG_2: f64 = std::f64::consts::LN_2;

// ============================================================================
// ZH-L16 Compartment Constants (Bühlmann / Baker)
// ============================================================================

/// Number of tissue compartments.
pub const NUM_COMPARTMENTS: usize = 16;

/// N2 half-times in minutes for compartments 1–16.
const N2_HALF_TIMES: [f64; NUM_COMPARTMENTS] = [
    5.0, 8.0, 12.5, 18.5, 27.0, 38.3, 54.3, 77.0, 109.0, 146.0, 187.0, 239.0, 305.0, 390.0, 498.0,
    635.0,
];

/// He half-times in minutes for compartments 1–16.
const HE_HALF_TIMES: [f64; NUM_COMPARTMENTS] = [
    1.88, 3.02, 4.72, 6.99, 10.21, 14.48, 20.53, 29.11, 41.20, 55.19, 70.69, 90.34, 115.29, 147.42,
    188.24, 240.03,
];

/// N2 'a' coefficients (bar) for ZH-L16B.
const A_N2_B: [f64; NUM_COMPARTMENTS] = [
    1.1696, 1.0000, 0.8618, 0.7562, 0.6667, 0.5600, 0.4947, 0.4500, 0.4187, 0.3798, 0.3497, 0.3223,
    0.2850, 0.2737, 0.2523, 0.2327,
];

/// N2 'a' coefficients (bar) for ZH-L16C.
const A_N2_C: [f64; NUM_COMPARTMENTS] = [
    1.1696, 1.0000, 0.8618, 0.7562, 0.6200, 0.5043, 0.4410, 0.4000, 0.3750, 0.3500, 0.3295, 0.3065,
    0.2835, 0.2610, 0.2480, 0.2327,
];

/// N2 'b' coefficients (dimensionless).
const B_N2: [f64; NUM_COMPARTMENTS] = [
    0.5578, 0.6514, 0.7222, 0.7825, 0.8126, 0.8434, 0.8693, 0.8910, 0.9092, 0.9222, 0.9319, 0.9403,
    0.9477, 0.9544, 0.9602, 0.9653,
];

/// He 'a' coefficients (bar).
const A_HE: [f64; NUM_COMPARTMENTS] = [
    1.6189, 1.3830, 1.1919, 1.0458, 0.9220, 0.8205, 0.7305, 0.6502, 0.5950, 0.5545, 0.5333, 0.5189,
    0.5181, 0.5176, 0.5172, 0.5119,
];

/// He 'b' coefficients (dimensionless).
const B_HE: [f64; NUM_COMPARTMENTS] = [
    0.4770, 0.5747, 0.6527, 0.7223, 0.7582, 0.7957, 0.8279, 0.8553, 0.8757, 0.8903, 0.8997, 0.9073,
    0.9122, 0.9171, 0.9217, 0.9267,
];

/// ZH-L16 coefficient set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ModelVariant {
    #[default]
    ZhL16B,
    ZhL16C,
}

impl ModelVariant {
    fn n2_a(&self) -> &'static [f64; NUM_COMPARTMENTS] {
        match self {
            ModelVariant::ZhL16B => &A_N2_B,
            ModelVariant::ZhL16C => &A_N2_C,
        }
    }
}

// ============================================================================
// Tissue State
// ============================================================================

/// Inert gas pressure of the 16 tissue compartments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tissues<T> {
    /// N2 partial pressure in each compartment (bar).
    pub n2: [T; NUM_COMPARTMENTS],
    /// He partial pressure in each compartment (bar).
    pub he: [T; NUM_COMPARTMENTS],
}

impl<T: Real> Tissues<T> {
    /// Total inert gas pressure of a compartment.
    pub fn total(&self, i: usize) -> T {
        self.n2[i] + self.he[i]
    }

    /// Largest absolute difference between two tissue states.
    pub fn max_diff(&self, other: &Tissues<T>) -> f64 {
        (0..NUM_COMPARTMENTS)
            .map(|i| {
                let dn2 = (self.n2[i] - other.n2[i]).to_f64().abs();
                let dhe = (self.he[i] - other.he[i]).to_f64().abs();
                dn2.max(dhe)
            })
            .fold(0.0, f64::max)
    }
}

// ============================================================================
// Tissue Calculators
// ============================================================================

/// Schreiner equation.
///
/// - `abs_p`: absolute pressure at the start of exposure (bar)
/// - `time`: exposure time (s)
/// - `gas`: inert gas fraction (0–1)
/// - `rate`: pressure rate change (bar/min)
/// - `pressure`: initial tissue pressure (bar)
/// - `half_life`: compartment half-life (min)
pub fn eq_schreiner<T: Real>(abs_p: T, time: f64, gas: T, rate: T, pressure: T, half_life: T) -> T {
    let k = T::from_f64(LOG_2) / half_life;
    let texp = (-k * T::from_f64(time / 60.0)).exp();
    eq_schreiner_t(abs_p, time, gas, rate, pressure, half_life, texp)
}

/// Schreiner equation with the value of `exp(-k * t)` supplied by the
/// caller.
pub fn eq_schreiner_t<T: Real>(
    abs_p: T,
    time: f64,
    gas: T,
    rate: T,
    pressure: T,
    half_life: T,
    texp: T,
) -> T {
    let palv = gas * (abs_p - T::from_f64(WATER_VAPOUR_PRESSURE));
    let t = T::from_f64(time / 60.0);
    let k = T::from_f64(LOG_2) / half_life;
    let r = gas * rate;
    palv + r * (t - T::one() / k) - (palv - pressure - r / k) * texp
}

/// Calculator of gas loading of a single tissue compartment.
pub trait TissueCalculator<T: Real> {
    /// Calculate N2 and He loading of compartment `tissue_no` after
    /// exposure of `time` seconds.
    #[allow(clippy::too_many_arguments)]
    fn load_tissue(
        &self,
        abs_p: T,
        time: f64,
        gas: &GasMix,
        rate: T,
        p_n2: T,
        p_he: T,
        tissue_no: usize,
    ) -> Result<(T, T), EngineError>;

    /// Split exposure time into times accepted by [`Self::load_tissue`],
    /// `None` when the time cannot be expressed that way.
    fn partition(&self, time: f64) -> Option<Vec<f64>> {
        Some(vec![time])
    }
}

/// Exact calculator, evaluates `exp` on every call.
#[derive(Debug, Clone)]
pub struct SchreinerCalculator<T> {
    n2_half_life: [T; NUM_COMPARTMENTS],
    he_half_life: [T; NUM_COMPARTMENTS],
}

impl<T: Real> SchreinerCalculator<T> {
    pub fn new() -> Self {
        SchreinerCalculator {
            n2_half_life: N2_HALF_TIMES.map(T::from_f64),
            he_half_life: HE_HALF_TIMES.map(T::from_f64),
        }
    }
}

impl<T: Real> Default for SchreinerCalculator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> TissueCalculator<T> for SchreinerCalculator<T> {
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
        let fn2 = T::from_f64(gas.n2 / 100.0);
        let fhe = T::from_f64(gas.he / 100.0);
        let p_n2 = eq_schreiner(abs_p, time, fn2, rate, p_n2, self.n2_half_life[tissue_no]);
        let p_he = eq_schreiner(abs_p, time, fhe, rate, p_he, self.he_half_life[tissue_no]);
        Ok((p_n2, p_he))
    }
}

/// Compartment half-lives, N2 and He (minutes).
pub fn half_lives() -> (&'static [f64; NUM_COMPARTMENTS], &'static [f64; NUM_COMPARTMENTS]) {
    (&N2_HALF_TIMES, &HE_HALF_TIMES)
}

// ============================================================================
// Model
// ============================================================================

/// ZH-L16 decompression model with gradient factors.
pub struct ZhL16Gf<T: Real> {
    variant: ModelVariant,
    n2_a: [T; NUM_COMPARTMENTS],
    n2_b: [T; NUM_COMPARTMENTS],
    he_a: [T; NUM_COMPARTMENTS],
    he_b: [T; NUM_COMPARTMENTS],
    calc: Box<dyn TissueCalculator<T>>,
}

impl<T: Real + 'static> ZhL16Gf<T> {
    /// Model using the exact Schreiner calculator.
    pub fn new(variant: ModelVariant) -> Self {
        Self::with_calculator(variant, Box::new(SchreinerCalculator::new()))
    }
}

impl<T: Real> ZhL16Gf<T> {
    pub fn with_calculator(variant: ModelVariant, calc: Box<dyn TissueCalculator<T>>) -> Self {
        ZhL16Gf {
            variant,
            n2_a: variant.n2_a().map(T::from_f64),
            n2_b: B_N2.map(T::from_f64),
            he_a: A_HE.map(T::from_f64),
            he_b: B_HE.map(T::from_f64),
            calc,
        }
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn calculator(&self) -> &dyn TissueCalculator<T> {
        self.calc.as_ref()
    }

    /// Tissues at surface equilibrium (breathing air).
    pub fn init(&self, surface_pressure: T) -> Tissues<T> {
        let p_n2 = T::from_f64(AIR_FN2) * (surface_pressure - T::from_f64(WATER_VAPOUR_PRESSURE));
        Tissues {
            n2: [p_n2; NUM_COMPARTMENTS],
            he: [T::zero(); NUM_COMPARTMENTS],
        }
    }

    /// Calculate gas loading of all compartments.
    ///
    /// - `abs_p`: absolute pressure at the start of exposure (bar)
    /// - `time`: exposure time (s)
    /// - `rate`: pressure rate change (bar/min), negative on ascent
    pub fn load(
        &self,
        abs_p: T,
        time: f64,
        gas: &GasMix,
        rate: T,
        tissues: &Tissues<T>,
    ) -> Result<Tissues<T>, EngineError> {
        let mut result = *tissues;
        for i in 0..NUM_COMPARTMENTS {
            let (p_n2, p_he) =
                self.calc
                    .load_tissue(abs_p, time, gas, rate, tissues.n2[i], tissues.he[i], i)?;
            result.n2[i] = p_n2;
            result.he[i] = p_he;
        }
        Ok(result)
    }

    /// Tolerated ambient pressure of each compartment for gradient factor
    /// `gf`.
    pub fn gf_limit(&self, gf: T, tissues: &Tissues<T>) -> [T; NUM_COMPARTMENTS] {
        let mut limits = [T::zero(); NUM_COMPARTMENTS];
        for (i, limit) in limits.iter_mut().enumerate() {
            let p = tissues.total(i);

            // Weighted a, b using Workman/Baker method, fallback to N2-only
            let (a, b) = if p.to_f64() > 1e-10 {
                let a = (self.n2_a[i] * tissues.n2[i] + self.he_a[i] * tissues.he[i]) / p;
                let b = (self.n2_b[i] * tissues.n2[i] + self.he_b[i] * tissues.he[i]) / p;
                (a, b)
            } else {
                (self.n2_a[i], self.n2_b[i])
            };

            *limit = (p - a * gf) / (gf / b + T::one() - gf);
        }
        limits
    }

    /// Maximum of tolerated ambient pressures, the ascent ceiling (bar).
    pub fn ceiling(&self, gf: T, tissues: &Tissues<T>) -> T {
        self.gf_limit(gf, tissues)
            .into_iter()
            .fold(T::zero(), |acc, v| acc.max(v))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn air() -> GasMix {
        GasMix::air()
    }

    fn model() -> ZhL16Gf<f64> {
        ZhL16Gf::new(ModelVariant::ZhL16B)
    }

    #[test]
    fn test_surface_equilibrium() {
        let tissues = model().init(DEFAULT_SURFACE_PRESSURE);
        let expected = 0.7902 * (DEFAULT_SURFACE_PRESSURE - WATER_VAPOUR_PRESSURE);
        for i in 0..NUM_COMPARTMENTS {
            assert!((tissues.n2[i] - expected).abs() < 1e-12);
            assert_eq!(tissues.he[i], 0.0);
        }
    }

    #[test]
    fn test_zero_time_leaves_tissues_unchanged() {
        let m = model();
        let start = m.init(DEFAULT_SURFACE_PRESSURE);
        let abs_p = DEFAULT_SURFACE_PRESSURE + 30.0 * METER_TO_BAR;
        for rate in [0.0, 2.0, -1.0] {
            let tissues = m.load(abs_p, 0.0, &air(), rate, &start).unwrap();
            assert!(
                tissues.max_diff(&start) < 1e-12,
                "zero exposure changed tissues at rate {rate}"
            );
        }
    }

    #[test]
    fn test_constant_depth_is_exponential_equilibration() {
        // one half-life of compartment 1 (5 min) closes half the gap
        let gas = air();
        let p0 = 0.75;
        let abs_p = 4.0;
        let palv = 0.79 * (abs_p - WATER_VAPOUR_PRESSURE);
        let p = eq_schreiner(abs_p, 300.0, 0.79, 0.0, p0, 5.0);
        assert!((p - (palv + (p0 - palv) * 0.5)).abs() < 1e-12);

        let m = model();
        let start = m.init(DEFAULT_SURFACE_PRESSURE);
        let tissues = m.load(abs_p, 300.0, &gas, 0.0, &start).unwrap();
        assert!((tissues.n2[0] - (palv + (start.n2[0] - palv) * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_descent_loads_tissues() {
        let m = model();
        let start = m.init(DEFAULT_SURFACE_PRESSURE);
        // descent 0m -> 30m at 20m/min
        let rate = 20.0 * METER_TO_BAR;
        let tissues = m
            .load(DEFAULT_SURFACE_PRESSURE, 90.0, &air(), rate, &start)
            .unwrap();
        for i in 0..NUM_COMPARTMENTS {
            assert!(tissues.n2[i] > start.n2[i], "compartment {i} not loaded");
        }
        // faster compartments load more
        assert!(tissues.n2[0] - start.n2[0] > tissues.n2[15] - start.n2[15]);
    }

    #[test]
    fn test_split_exposure_matches_single_exposure() {
        let m = model();
        let start = m.init(DEFAULT_SURFACE_PRESSURE);
        let abs_p = DEFAULT_SURFACE_PRESSURE + 40.0 * METER_TO_BAR;
        let rate = -10.0 * METER_TO_BAR;

        let single = m.load(abs_p, 120.0, &air(), rate, &start).unwrap();
        let half = m.load(abs_p, 60.0, &air(), rate, &start).unwrap();
        let split = m
            .load(abs_p + rate, 60.0, &air(), rate, &half)
            .unwrap();
        assert!(single.max_diff(&split) < 1e-12);
    }

    #[test]
    fn test_helium_loading() {
        let m = model();
        let start = m.init(DEFAULT_SURFACE_PRESSURE);
        let trimix = GasMix::new(0.0, 21.0, 35.0).unwrap();
        let abs_p = DEFAULT_SURFACE_PRESSURE + 60.0 * METER_TO_BAR;
        let tissues = m.load(abs_p, 1200.0, &trimix, 0.0, &start).unwrap();
        for i in 0..NUM_COMPARTMENTS {
            assert!(tissues.he[i] > 0.0);
        }
        // He loads faster than N2 in the fastest compartment
        assert!(tissues.he[0] > tissues.he[15]);
    }

    #[test]
    fn test_gf_limit_at_surface_equilibrium() {
        let m = model();
        let tissues = m.init(DEFAULT_SURFACE_PRESSURE);
        // saturated at the surface, the diver can be at the surface
        let ceiling = m.ceiling(0.3, &tissues);
        assert!(ceiling < DEFAULT_SURFACE_PRESSURE, "ceiling {ceiling}");
    }

    #[test]
    fn test_gf_limit_decreases_with_gf() {
        let m = model();
        let start = m.init(DEFAULT_SURFACE_PRESSURE);
        let abs_p = DEFAULT_SURFACE_PRESSURE + 40.0 * METER_TO_BAR;
        let tissues = m.load(abs_p, 1800.0, &air(), 0.0, &start).unwrap();

        let low = m.ceiling(0.3, &tissues);
        let high = m.ceiling(0.85, &tissues);
        assert!(low > high, "gf low ceiling {low} should be deeper than {high}");
        assert!(low > DEFAULT_SURFACE_PRESSURE, "40m/30min needs deco");
    }

    #[test]
    fn test_gf_one_is_raw_m_value() {
        // gf = 1: tolerated pressure = (p - a) * b
        let m = model();
        let mut tissues = m.init(DEFAULT_SURFACE_PRESSURE);
        tissues.n2 = [2.5; NUM_COMPARTMENTS];
        let limits = m.gf_limit(1.0, &tissues);
        for i in 0..NUM_COMPARTMENTS {
            let expected = (2.5 - A_N2_B[i]) * B_N2[i];
            assert!((limits[i] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zhl16c_is_more_conservative() {
        let b = ZhL16Gf::<f64>::new(ModelVariant::ZhL16B);
        let c = ZhL16Gf::<f64>::new(ModelVariant::ZhL16C);
        let start = b.init(DEFAULT_SURFACE_PRESSURE);
        let abs_p = DEFAULT_SURFACE_PRESSURE + 40.0 * METER_TO_BAR;
        let tissues = b.load(abs_p, 1800.0, &air(), 0.0, &start).unwrap();
        assert!(c.ceiling(0.85, &tissues) >= b.ceiling(0.85, &tissues));
        assert_eq!(c.variant(), ModelVariant::ZhL16C);
    }

    #[test]
    fn test_decimal_model_matches_f64() {
        let mf = model();
        let md: ZhL16Gf<Decimal> = ZhL16Gf::new(ModelVariant::ZhL16B);
        let trimix = GasMix::new(0.0, 18.0, 45.0).unwrap();

        let abs_p = DEFAULT_SURFACE_PRESSURE + 50.0 * METER_TO_BAR;
        let rate = -10.0 * METER_TO_BAR;

        let tf = mf
            .load(abs_p, 600.0, &trimix, 0.0, &mf.init(DEFAULT_SURFACE_PRESSURE))
            .and_then(|t| mf.load(abs_p, 180.0, &trimix, rate, &t))
            .unwrap();

        let surface = Decimal::from_f64(DEFAULT_SURFACE_PRESSURE);
        let td = md
            .load(
                Decimal::from_f64(abs_p),
                600.0,
                &trimix,
                Decimal::zero(),
                &md.init(surface),
            )
            .and_then(|t| {
                md.load(Decimal::from_f64(abs_p), 180.0, &trimix, Decimal::from_f64(rate), &t)
            })
            .unwrap();

        for i in 0..NUM_COMPARTMENTS {
            assert!((tf.n2[i] - td.n2[i].to_f64()).abs() < 1e-9, "n2 compartment {i}");
            assert!((tf.he[i] - td.he[i].to_f64()).abs() < 1e-9, "he compartment {i}");
        }

        let lf = mf.ceiling(0.3, &tf);
        let ld = md.ceiling(Decimal::from_f64(0.3), &td).to_f64();
        assert!((lf - ld).abs() < 1e-9);
    }
}
