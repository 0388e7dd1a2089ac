//! 3×3 mean filter over valid cells.
//!
//! Rows are independent given the previous pass, so with the `threading`
//! feature each pass runs row-parallel through rayon. Results are identical
//! either way.
use crate::dem::{neighbour, Dem, D8_OFFSETS};

/// New value for cell `(r, c)`: mean of itself and its valid 8-neighbours.
/// Nodata cells stay nodata.
#[inline]
fn smoothed(src: &[f32], w: usize, h: usize, r: usize, c: usize) -> f32 {
    let centre = src[r * w + c];
    if centre.is_nan() {
        return f32::NAN;
    }
    let (sum, n) = D8_OFFSETS
        .iter()
        .filter_map(|&off| neighbour(w, h, r, c, off))
        .map(|(nr, nc)| src[nr * w + nc])
        .filter(|v| !v.is_nan())
        .fold((centre as f64, 1u32), |(s, n), v| (s + v as f64, n + 1));
    (sum / n as f64) as f32
}

/// Apply `passes` rounds of 3×3 mean smoothing to `dem` in place.
pub fn smooth(dem: &mut Dem, passes: u32) {
    let (w, h) = (dem.width, dem.height);
    if w == 0 || h == 0 {
        return;
    }
    for _ in 0..passes {
        let src = dem.data.clone();
        let fill_row = |(r, row): (usize, &mut [f32])| {
            for (c, v) in row.iter_mut().enumerate() {
                *v = smoothed(&src, w, h, r, c);
            }
        };

        #[cfg(feature = "threading")]
        {
            use rayon::prelude::*;
            dem.data.par_chunks_mut(w).enumerate().for_each(fill_row);
        }
        #[cfg(not(feature = "threading"))]
        dem.data.chunks_mut(w).enumerate().for_each(fill_row);
    }
}
