//! Threshold masking and seeded connected-component fill.
use tracing::warn;

use crate::dem::{neighbour, Dem, Mask, D4_OFFSETS, D8_OFFSETS};
use crate::error::{Error, Result};

use super::Connectivity;

/// Cells that are valid and strictly below `level`. Nodata never floods.
pub fn threshold_mask(dem: &Dem, level: f32) -> Mask {
    Mask {
        data: dem.data.iter().map(|&z| z < level).collect(),
        width: dem.width,
        height: dem.height,
        transform: dem.transform,
    }
}

/// All set cells of `mask` connected to `seed` = `(col, row)`.
///
/// Iterative with an explicit stack, so grid size is bounded by memory, not
/// recursion depth. A seed on an unset cell yields an empty mask.
pub fn flood_fill(mask: &Mask, seed: (usize, usize), connectivity: Connectivity) -> Result<Mask> {
    let (w, h) = (mask.width, mask.height);
    let (col, row) = seed;
    if col >= w || row >= h {
        return Err(Error::SeedCellOutOfBounds { col, row });
    }

    let mut filled = Mask::new(w, h, mask.transform);
    if !mask.get(row, col) {
        warn!(col, row, "seed cell is above the water level; nothing floods");
        return Ok(filled);
    }

    let offsets: &[(isize, isize)] = match connectivity {
        Connectivity::Four => &D4_OFFSETS,
        Connectivity::Eight => &D8_OFFSETS,
    };

    filled.set(row, col, true);
    let mut stack = vec![(row, col)];
    while let Some((r, c)) = stack.pop() {
        for &off in offsets {
            let Some((nr, nc)) = neighbour(w, h, r, c, off) else {
                continue;
            };
            if mask.get(nr, nc) && !filled.get(nr, nc) {
                filled.set(nr, nc, true);
                stack.push((nr, nc));
            }
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::GeoTransform;

    fn mask_from(rows: &[&str]) -> Mask {
        let h = rows.len();
        let w = rows[0].len();
        Mask {
            data: rows.iter().flat_map(|r| r.chars().map(|ch| ch == '#')).collect(),
            width: w,
            height: h,
            transform: GeoTransform::north_up(0.0, h as f64, 1.0),
        }
    }

    fn render(mask: &Mask) -> Vec<String> {
        (0..mask.height)
            .map(|r| (0..mask.width).map(|c| if mask.get(r, c) { '#' } else { '.' }).collect())
            .collect()
    }

    #[test]
    fn threshold_is_strict_and_skips_nodata() {
        let dem = Dem::from_vec(
            vec![69.9, 70.0, 70.1, f32::NAN],
            4,
            1,
            GeoTransform::default(),
        )
        .unwrap();
        let m = threshold_mask(&dem, 70.0);
        assert_eq!(m.data, vec![true, false, false, false]);
    }

    #[test]
    fn fill_reaches_last_row_and_column() {
        let mask = mask_from(&["####", "####", "####"]);
        let out = flood_fill(&mask, (0, 0), Connectivity::Four).unwrap();
        assert_eq!(out.count(), 12);
        assert!(out.get(2, 3));
    }

    #[test]
    fn fill_does_not_cross_dry_cells() {
        let mask = mask_from(&[
            "##.##", //
            "##.##",
            ".....",
            "##.##",
        ]);
        let out = flood_fill(&mask, (0, 0), Connectivity::Eight).unwrap();
        assert_eq!(render(&out), vec!["##...", "##...", ".....", "....."]);
    }

    #[test]
    fn diagonal_links_need_eight_connectivity() {
        let mask = mask_from(&[
            "#..", //
            ".#.",
            "..#",
        ]);
        let four = flood_fill(&mask, (0, 0), Connectivity::Four).unwrap();
        assert_eq!(four.count(), 1);
        let eight = flood_fill(&mask, (0, 0), Connectivity::Eight).unwrap();
        assert_eq!(eight.count(), 3);
    }

    #[test]
    fn winding_channel_is_followed() {
        let mask = mask_from(&[
            "#.####", //
            "#.#..#",
            "#.#.#.",
            "###.#.",
        ]);
        // The pocket at column 4 touches the channel only diagonally.
        let out = flood_fill(&mask, (0, 0), Connectivity::Four).unwrap();
        assert_eq!(render(&out), vec!["#.####", "#.#..#", "#.#...", "###..."]);
    }

    #[test]
    fn dry_seed_gives_empty_mask() {
        let mask = mask_from(&["#.", "##"]);
        let out = flood_fill(&mask, (1, 0), Connectivity::Four).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn seed_outside_grid_is_an_error() {
        let mask = mask_from(&["##", "##"]);
        assert!(matches!(
            flood_fill(&mask, (2, 0), Connectivity::Four),
            Err(Error::SeedCellOutOfBounds { col: 2, row: 0 })
        ));
    }
}
