//! Terrain conditioning before flooding: nodata fill → smoothing →
//! depression fill. Each step is optional and logged.
pub mod depressions;
pub mod nodata;
pub mod smooth;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dem::Dem;
pub use depressions::fill_depressions;
pub use nodata::fill_nodata;
pub use smooth::smooth;

/// Which conditioning steps to run, and how hard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditioningParams {
    /// Interpolate nodata holes from their valid neighbours.
    pub fill_nodata: bool,
    /// Upper bound on nodata fill passes; each pass grows fills by one cell.
    pub max_fill_passes: u32,
    /// 3×3 mean filter passes; 0 disables smoothing.
    pub smooth_passes: u32,
    /// Raise closed depressions to their spill elevation.
    pub fill_depressions: bool,
    /// Per-cell gradient imposed across filled flats; 0.0 leaves them flat.
    pub depression_epsilon: f32,
}

impl Default for ConditioningParams {
    fn default() -> Self {
        Self {
            fill_nodata: true,
            max_fill_passes: 64,
            smooth_passes: 0,
            fill_depressions: false,
            depression_epsilon: 0.0,
        }
    }
}

/// What one conditioning pass changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConditioningReport {
    pub nodata_filled: usize,
    pub nodata_remaining: usize,
    pub smooth_passes: u32,
    pub depression_cells_raised: usize,
}

/// Run the enabled conditioning steps on `dem` in place.
pub fn condition(dem: &mut Dem, params: &ConditioningParams) -> ConditioningReport {
    let mut report = ConditioningReport::default();

    if params.fill_nodata {
        report.nodata_filled = fill_nodata(dem, params.max_fill_passes);
        info!(filled = report.nodata_filled, "filled nodata cells");
    }

    if params.smooth_passes > 0 {
        smooth(dem, params.smooth_passes);
        report.smooth_passes = params.smooth_passes;
        info!(passes = params.smooth_passes, "smoothed terrain");
    }

    if params.fill_depressions {
        report.depression_cells_raised = fill_depressions(dem, params.depression_epsilon);
        info!(raised = report.depression_cells_raised, "filled depressions");
    }

    report.nodata_remaining = dem.data.len() - dem.valid_count();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::GeoTransform;

    fn pitted_dem() -> Dem {
        let mut dem = Dem::new(6, 6, GeoTransform::north_up(0.0, 300.0, 50.0), 20.0);
        dem.set(2, 2, 5.0);
        dem.set(4, 4, f32::NAN);
        dem
    }

    #[test]
    fn default_params_fill_nodata_only() {
        let mut dem = pitted_dem();
        let report = condition(&mut dem, &ConditioningParams::default());
        assert_eq!(report.nodata_filled, 1);
        assert_eq!(report.nodata_remaining, 0);
        assert_eq!(report.depression_cells_raised, 0);
        assert_eq!(dem.get(2, 2), 5.0, "pit must survive without depression fill");
        assert_eq!(dem.get(4, 4), 20.0);
    }

    #[test]
    fn all_steps_run_in_order() {
        let mut dem = pitted_dem();
        let params = ConditioningParams {
            smooth_passes: 1,
            fill_depressions: true,
            ..ConditioningParams::default()
        };
        let report = condition(&mut dem, &params);
        assert_eq!(report.smooth_passes, 1);
        assert!(report.depression_cells_raised > 0);
        // After depression fill no interior cell sits below all of its neighbours.
        for r in 1..5 {
            for c in 1..5 {
                let z = dem.get(r, c);
                let lowest = crate::dem::D8_OFFSETS
                    .iter()
                    .map(|&(dr, dc)| dem.get((r as isize + dr) as usize, (c as isize + dc) as usize))
                    .fold(f32::INFINITY, f32::min);
                assert!(z >= lowest, "pit remains at ({r}, {c})");
            }
        }
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let p: ConditioningParams = serde_json::from_str(r#"{"smooth_passes": 2}"#).unwrap();
        assert_eq!(p.smooth_passes, 2);
        assert!(p.fill_nodata);
        assert_eq!(p.max_fill_passes, 64);
    }
}
