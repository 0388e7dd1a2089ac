//! Tile mosaicking: merge adjacent raster tiles into one grid.
//!
//! Terrain50 and LiDAR products ship as many small tiles (one `.asc` per
//! 10 km square). A flood spills across tile borders, so tiles are merged
//! onto a single lattice before flooding.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::dem::Dem;
use crate::error::{Error, Result};
use crate::transform::GeoTransform;

/// Relative tolerance for matching cell sizes between tiles.
const CELL_TOLERANCE: f64 = 1e-6;
/// Largest fraction of a cell two tile origins may be off the common lattice.
const ALIGN_TOLERANCE: f64 = 1e-3;

/// Files in `dir` (non-recursive) whose extension matches `extension`,
/// case-insensitively, sorted by path.
pub fn collect_tiles(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut tiles = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches {
            tiles.push(path);
        }
    }
    tiles.sort();
    Ok(tiles)
}

/// Load every tile with `extension` in `dir` and mosaic them.
pub fn load_dir(dir: &Path, extension: &str) -> Result<Dem> {
    let paths = collect_tiles(dir, extension)?;
    if paths.is_empty() {
        return Err(Error::EmptyInput);
    }
    info!(dir = %dir.display(), tiles = paths.len(), "loading tiles");
    let tiles = paths
        .iter()
        .map(|p| super::load(p))
        .collect::<Result<Vec<_>>>()?;
    mosaic(&tiles)
}

fn near_integer(v: f64) -> bool {
    (v - v.round()).abs() <= ALIGN_TOLERANCE
}

/// Merge `tiles` into one grid covering the union of their extents.
///
/// Tiles must be north-up with equal cell sizes and share a cell lattice.
/// Later tiles overwrite earlier ones where the later value is valid; cells
/// no tile covers are nodata.
pub fn mosaic(tiles: &[Dem]) -> Result<Dem> {
    let first = tiles.first().ok_or(Error::EmptyInput)?;
    let cell_w = first.transform.pixel_width;
    let cell_h = -first.transform.pixel_height;

    for (i, tile) in tiles.iter().enumerate() {
        let gt = &tile.transform;
        if !gt.is_north_up() {
            return Err(Error::IncompatibleTiles(format!("tile {i} is rotated or south-up")));
        }
        let dw = (gt.pixel_width - cell_w).abs() / cell_w;
        let dh = (-gt.pixel_height - cell_h).abs() / cell_h;
        if dw > CELL_TOLERANCE || dh > CELL_TOLERANCE {
            return Err(Error::IncompatibleTiles(format!(
                "tile {i} has {}x{} cells, expected {cell_w}x{cell_h}",
                gt.pixel_width, -gt.pixel_height
            )));
        }
        let off_x = (gt.origin_x - first.transform.origin_x) / cell_w;
        let off_y = (first.transform.origin_y - gt.origin_y) / cell_h;
        if !near_integer(off_x) || !near_integer(off_y) {
            return Err(Error::IncompatibleTiles(format!(
                "tile {i} is not aligned to the cell lattice of tile 0"
            )));
        }
    }

    let (mut west, mut north) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut east, mut south) = (f64::NEG_INFINITY, f64::INFINITY);
    for tile in tiles {
        let (x0, y0, x1, y1) = tile.transform.bounds(tile.width, tile.height);
        west = west.min(x0);
        south = south.min(y0);
        east = east.max(x1);
        north = north.max(y1);
    }
    let width = ((east - west) / cell_w).round() as usize;
    let height = ((north - south) / cell_h).round() as usize;
    let transform = GeoTransform::from_gdal([west, cell_w, 0.0, north, 0.0, -cell_h]);
    let mut out = Dem::new(width, height, transform, f32::NAN);

    for tile in tiles {
        let col_off = ((tile.transform.origin_x - west) / cell_w).round() as usize;
        let row_off = ((north - tile.transform.origin_y) / cell_h).round() as usize;
        for r in 0..tile.height {
            for c in 0..tile.width {
                let v = tile.get(r, c);
                if !v.is_nan() {
                    out.set(row_off + r, col_off + c, v);
                }
            }
        }
    }

    out.crs = common_crs(tiles);
    info!(tiles = tiles.len(), width, height, "mosaicked tiles");
    Ok(out)
}

fn common_crs(tiles: &[Dem]) -> Option<String> {
    let first = tiles.first()?.crs.clone();
    if tiles.iter().all(|t| t.crs == first) {
        first
    } else {
        warn!("tiles disagree on CRS; mosaic CRS left unset");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(west: f64, north: f64, w: usize, h: usize, fill: f32) -> Dem {
        Dem::new(w, h, GeoTransform::north_up(west, north, 50.0), fill)
    }

    #[test]
    fn side_by_side_tiles_merge() {
        let a = tile(0.0, 100.0, 2, 2, 1.0);
        let b = tile(100.0, 100.0, 2, 2, 2.0);
        let m = mosaic(&[a, b]).unwrap();
        assert_eq!((m.width, m.height), (4, 2));
        assert_eq!(m.transform, GeoTransform::north_up(0.0, 100.0, 50.0));
        assert_eq!(m.get(0, 1), 1.0);
        assert_eq!(m.get(1, 2), 2.0);
        assert_eq!(m.valid_count(), 8);
    }

    #[test]
    fn uncovered_cells_are_nodata() {
        // Diagonal arrangement leaves two empty quadrants.
        let a = tile(0.0, 100.0, 2, 2, 1.0);
        let b = tile(100.0, 0.0, 2, 2, 2.0);
        let m = mosaic(&[a, b]).unwrap();
        assert_eq!((m.width, m.height), (4, 4));
        assert!(m.get(0, 3).is_nan());
        assert!(m.get(3, 0).is_nan());
        assert_eq!(m.get(3, 3), 2.0);
    }

    #[test]
    fn later_valid_values_overwrite_earlier() {
        let a = tile(0.0, 100.0, 2, 2, 1.0);
        let mut b = tile(50.0, 100.0, 2, 2, 5.0);
        b.set(0, 0, f32::NAN);
        let m = mosaic(&[a, b]).unwrap();
        assert_eq!(m.width, 3);
        // Overlap column 1: row 0 keeps the earlier value, row 1 takes the later.
        assert_eq!(m.get(0, 1), 1.0);
        assert_eq!(m.get(1, 1), 5.0);
    }

    #[test]
    fn misaligned_or_mismatched_tiles_are_rejected() {
        let a = tile(0.0, 100.0, 2, 2, 1.0);
        let shifted = tile(120.0, 100.0, 2, 2, 1.0);
        assert!(matches!(mosaic(&[a.clone(), shifted]), Err(Error::IncompatibleTiles(_))));

        let coarse = Dem::new(2, 2, GeoTransform::north_up(100.0, 100.0, 25.0), 1.0);
        assert!(matches!(mosaic(&[a, coarse]), Err(Error::IncompatibleTiles(_))));
        assert!(matches!(mosaic(&[]), Err(Error::EmptyInput)));
    }

    #[test]
    fn crs_kept_only_when_tiles_agree() {
        let a = tile(0.0, 100.0, 1, 1, 1.0).with_crs("EPSG:27700");
        let b = tile(50.0, 100.0, 1, 1, 1.0).with_crs("EPSG:27700");
        let c = tile(100.0, 100.0, 1, 1, 1.0);
        assert_eq!(mosaic(&[a.clone(), b]).unwrap().crs.as_deref(), Some("EPSG:27700"));
        assert_eq!(mosaic(&[a, c]).unwrap().crs, None);
    }

    #[test]
    fn load_dir_reads_matching_tiles_only() {
        let dir = tempfile::tempdir().unwrap();
        let header = |x: u32| format!("ncols 2\nnrows 1\nxllcorner {x}\nyllcorner 0\ncellsize 50\n");
        fs::write(dir.path().join("su00.asc"), header(0) + "1 2\n").unwrap();
        fs::write(dir.path().join("su01.ASC"), header(100) + "3 4\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let tiles = collect_tiles(dir.path(), "asc").unwrap();
        assert_eq!(tiles.len(), 2);
        let m = load_dir(dir.path(), "asc").unwrap();
        assert_eq!((m.width, m.height), (4, 1));
        assert_eq!(m.data, vec![1.0, 2.0, 3.0, 4.0]);

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(load_dir(empty.path(), "asc"), Err(Error::EmptyInput)));
    }
}
