//! Dive planning entry point of the mobile bindings.

use tracing::debug;

use crate::config::{Calculator, EngineConfig};
use crate::engine::Engine;
use crate::models::{DecoStopRecord, PlanError, PlanRequest, PlanResult};
use crate::sink::{DecoTable, DiveSummary};

/// Calculate decompression plan of a dive.
#[uniffi::export]
pub fn plan_dive(request: PlanRequest) -> Result<PlanResult, PlanError> {
    let config = EngineConfig {
        gf_low: request.gf_low,
        gf_high: request.gf_high,
        last_stop_6m: request.last_stop_6m,
        calculator: if request.tabular {
            Calculator::Tabular
        } else {
            Calculator::Exact
        },
        ..EngineConfig::default()
    };

    let mut engine = Engine::new(config)?;
    for mix in &request.gas_mixes {
        if mix.travel {
            engine.add_travel(mix.switch_depth_m, mix.o2_percent, mix.he_percent)?;
        } else {
            engine.add_mix(mix.switch_depth_m, mix.o2_percent, mix.he_percent)?;
        }
    }

    let mut table = DecoTable::default();
    let mut summary = DiveSummary::default();
    for step in engine
        .calculate(request.depth_m, request.bottom_time_min)?
        .with_sink(&mut table)
        .with_sink(&mut summary)
    {
        step?;
    }
    debug!(runtime = summary.runtime, stops = table.stops().len(), "dive planned");

    Ok(PlanResult {
        stops: table
            .stops()
            .into_iter()
            .map(|s| DecoStopRecord {
                depth_m: s.depth,
                duration_min: s.time,
            })
            .collect(),
        total_deco_min: table.total(),
        runtime_min: summary.runtime / 60.0,
        max_depth_m: summary.max_depth,
        surface_gf: summary.surface_gf,
        gas_switch_count: summary.gas_switch_count,
        step_count: summary.step_count as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GasMixInput;

    fn mix(switch_depth_m: f64, o2_percent: f64, he_percent: f64) -> GasMixInput {
        GasMixInput {
            switch_depth_m,
            o2_percent,
            he_percent,
            travel: false,
        }
    }

    fn request(depth_m: f64, bottom_time_min: f64) -> PlanRequest {
        PlanRequest {
            depth_m,
            bottom_time_min,
            gas_mixes: vec![mix(0.0, 21.0, 0.0)],
            gf_low: 0.3,
            gf_high: 0.85,
            last_stop_6m: false,
            tabular: false,
        }
    }

    #[test]
    fn test_plan_no_deco() {
        let result = plan_dive(request(20.0, 20.0)).unwrap();
        assert!(result.stops.is_empty());
        assert_eq!(result.total_deco_min, 0.0);
        assert!((result.max_depth_m - 20.0).abs() < 1e-9);
        // bottom time 20min with descent, ascent 2min
        assert!((result.runtime_min - 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_deco() {
        let result = plan_dive(request(40.0, 30.0)).unwrap();
        assert!(!result.stops.is_empty());
        let total: f64 = result.stops.iter().map(|s| s.duration_min).sum();
        assert_eq!(total, result.total_deco_min);
        assert_eq!(result.stops.last().map(|s| s.depth_m), Some(3.0));
        assert!((result.surface_gf - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_plan_invalid_gas() {
        let mut req = request(30.0, 20.0);
        req.gas_mixes[0].switch_depth_m = 10.0;
        assert!(matches!(
            plan_dive(req),
            Err(PlanError::InvalidPlan { .. })
        ));
    }

    #[test]
    fn test_plan_no_gas() {
        let mut req = request(30.0, 20.0);
        req.gas_mixes.clear();
        assert!(matches!(
            plan_dive(req),
            Err(PlanError::InvalidPlan { .. })
        ));
    }

    #[test]
    fn test_plan_tabular_matches_exact() {
        let exact = plan_dive(request(45.0, 25.0)).unwrap();
        let mut req = request(45.0, 25.0);
        req.tabular = true;
        let tabular = plan_dive(req).unwrap();
        assert_eq!(tabular.stops, exact.stops);
        assert_eq!(tabular.total_deco_min, exact.total_deco_min);
        assert!((tabular.runtime_min - exact.runtime_min).abs() < 1e-9);
    }

    #[test]
    fn test_plan_travel_gas() {
        let mut req = request(90.0, 20.0);
        req.gf_low = 0.2;
        req.gf_high = 0.75;
        req.gas_mixes = vec![
            GasMixInput {
                travel: true,
                ..mix(0.0, 36.0, 0.0)
            },
            mix(33.0, 13.0, 50.0),
            mix(33.0, 36.0, 0.0),
            mix(21.0, 50.0, 0.0),
            mix(9.0, 80.0, 0.0),
        ];
        let result = plan_dive(req).unwrap();
        assert_eq!(result.total_deco_min, 74.0);
        // 36% -> 13/50 -> 36% -> 50% -> 80%
        assert_eq!(result.gas_switch_count, 4);
    }
}
