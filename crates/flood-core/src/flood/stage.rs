//! Stage curve: flood extent as a function of water level for a fixed seed.
use serde::Serialize;

use crate::dem::Dem;
use crate::error::Result;

use super::{flood_from_cell, Connectivity, FloodStats};

#[derive(Debug, Clone, Serialize)]
pub struct StagePoint {
    pub water_level: f32,
    #[serde(flatten)]
    pub stats: FloodStats,
}

/// Flood statistics from `seed` = `(col, row)` at each of `levels`, in
/// ascending level order. Levels are evaluated in parallel with the
/// `threading` feature.
pub fn stage_curve(
    dem: &Dem,
    seed: (usize, usize),
    levels: &[f32],
    connectivity: Connectivity,
) -> Result<Vec<StagePoint>> {
    let mut levels = levels.to_vec();
    levels.sort_by(f32::total_cmp);

    let point = |&level: &f32| -> Result<StagePoint> {
        let extent = flood_from_cell(dem, seed, level, connectivity)?;
        Ok(StagePoint { water_level: level, stats: extent.stats })
    };

    #[cfg(feature = "threading")]
    let points = {
        use rayon::prelude::*;
        levels.par_iter().map(point).collect()
    };
    #[cfg(not(feature = "threading"))]
    let points = levels.iter().map(point).collect();

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::GeoTransform;

    /// Stepped valley: column c sits at 10 + 2c metres.
    fn valley() -> Dem {
        let mut dem = Dem::new(8, 4, GeoTransform::north_up(0.0, 40.0, 10.0), 0.0);
        for r in 0..4 {
            for c in 0..8 {
                dem.set(r, c, 10.0 + 2.0 * c as f32);
            }
        }
        dem
    }

    #[test]
    fn levels_come_back_sorted() {
        let dem = valley();
        let curve = stage_curve(&dem, (0, 1), &[20.0, 12.0, 16.0], Connectivity::Four).unwrap();
        let levels: Vec<f32> = curve.iter().map(|p| p.water_level).collect();
        assert_eq!(levels, vec![12.0, 16.0, 20.0]);
    }

    #[test]
    fn area_and_volume_grow_with_level() {
        let dem = valley();
        let levels: Vec<f32> = (0..12).map(|i| 10.5 + i as f32 * 1.5).collect();
        let curve = stage_curve(&dem, (0, 0), &levels, Connectivity::Four).unwrap();
        for pair in curve.windows(2) {
            assert!(pair[1].stats.area >= pair[0].stats.area);
            assert!(pair[1].stats.volume >= pair[0].stats.volume);
        }
        // 10.5 m wets only column 0; 26.5 m wets all eight columns.
        assert_eq!(curve[0].stats.cells, 4);
        assert_eq!(curve.last().unwrap().stats.cells, 32);
    }

    #[test]
    fn stage_point_flattens_stats() {
        let dem = valley();
        let curve = stage_curve(&dem, (0, 0), &[11.0], Connectivity::Four).unwrap();
        let json = serde_json::to_value(&curve[0]).unwrap();
        assert_eq!(json["water_level"], 11.0);
        assert_eq!(json["cells"], 4);
    }
}
