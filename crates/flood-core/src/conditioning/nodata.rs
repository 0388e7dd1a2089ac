//! Nodata interpolation by iterative neighbour averaging.
use tracing::debug;

use crate::dem::{neighbour, Dem, D8_OFFSETS};

/// Replace nodata cells with the mean of their valid 8-neighbours.
///
/// Each pass reads the grid as it was at the start of the pass, so a hole
/// closes inward one ring per pass. Stops when no nodata remains, a pass
/// changes nothing (a fully nodata grid), or `max_passes` is reached.
/// Returns the number of cells filled.
pub fn fill_nodata(dem: &mut Dem, max_passes: u32) -> usize {
    let (w, h) = (dem.width, dem.height);
    let mut filled = 0usize;

    for pass in 0..max_passes {
        let snapshot = dem.data.clone();
        let mut changed = 0usize;
        for r in 0..h {
            for c in 0..w {
                if !snapshot[r * w + c].is_nan() {
                    continue;
                }
                let (sum, n) = D8_OFFSETS
                    .iter()
                    .filter_map(|&off| neighbour(w, h, r, c, off))
                    .map(|(nr, nc)| snapshot[nr * w + nc])
                    .filter(|v| !v.is_nan())
                    .fold((0.0f64, 0u32), |(s, n), v| (s + v as f64, n + 1));
                if n > 0 {
                    dem.set(r, c, (sum / n as f64) as f32);
                    changed += 1;
                }
            }
        }
        filled += changed;
        debug!(pass, changed, "nodata fill pass");
        if changed == 0 || dem.valid_count() == dem.data.len() {
            break;
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::GeoTransform;
    use approx::assert_relative_eq;

    fn grid(w: usize, h: usize, fill: f32) -> Dem {
        Dem::new(w, h, GeoTransform::north_up(0.0, h as f64, 1.0), fill)
    }

    #[test]
    fn single_hole_takes_neighbour_mean() {
        let mut dem = grid(3, 3, 10.0);
        dem.set(0, 0, 2.0);
        dem.set(1, 1, f32::NAN);
        assert_eq!(fill_nodata(&mut dem, 8), 1);
        assert_relative_eq!(dem.get(1, 1), (2.0 + 7.0 * 10.0) / 8.0);
    }

    #[test]
    fn large_hole_closes_over_several_passes() {
        let mut dem = grid(7, 7, 4.0);
        for r in 1..6 {
            for c in 1..6 {
                dem.set(r, c, f32::NAN);
            }
        }
        // Ring 1 fills on pass 1, ring 2 on pass 2, the centre on pass 3.
        let mut partial = dem.clone();
        assert_eq!(fill_nodata(&mut partial, 1), 16);
        assert!(partial.get(3, 3).is_nan());

        assert_eq!(fill_nodata(&mut dem, 10), 25);
        assert_eq!(dem.valid_count(), 49);
        assert_relative_eq!(dem.get(3, 3), 4.0);
    }

    #[test]
    fn all_nodata_grid_is_left_alone() {
        let mut dem = grid(4, 4, f32::NAN);
        assert_eq!(fill_nodata(&mut dem, 5), 0);
        assert_eq!(dem.valid_count(), 0);
    }
}
