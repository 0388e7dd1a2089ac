//! Pipeline orchestrator: runs one flood scenario end to end.
//!
//! Pipeline order:
//!   1. Load (single raster or mosaicked tile directory)
//!   2. Conditioning
//!   3. Flood fill from the seed point
//!   4. Vectorization
//!   5. Output writing
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Map};
use tracing::info;

use crate::conditioning::{condition, ConditioningReport};
use crate::config::FloodConfig;
use crate::dem::{Dem, DemSummary};
use crate::error::Result;
use crate::flood::{depth_grid, flood_from_point, FloodStats};
use crate::io::{self, mosaic};
use crate::vectorize::{polygons, to_geojson};

/// Summary of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct FloodRun {
    pub dem: DemSummary,
    pub conditioning: ConditioningReport,
    pub water_level: f32,
    /// Seed cell as `(col, row)`.
    pub seed_cell: (usize, usize),
    pub stats: FloodStats,
    pub polygons: usize,
    /// Files written, in the order they were produced.
    pub outputs: Vec<PathBuf>,
    pub elapsed_ms: u64,
}

/// Load the configured input: a raster file, or a directory of tiles.
/// The configured CRS, when present, replaces whatever the input carried.
pub fn load_input(cfg: &FloodConfig) -> Result<Dem> {
    let mut dem = if cfg.input.is_dir() {
        mosaic::load_dir(&cfg.input, &cfg.tile_extension)?
    } else {
        io::load(&cfg.input)?
    };
    if let Some(crs) = &cfg.crs {
        dem.crs = Some(crs.clone());
    }
    Ok(dem)
}

/// Run the full pipeline described by `cfg`.
pub fn run(cfg: &FloodConfig) -> Result<FloodRun> {
    cfg.validate()?;
    let start = Instant::now();
    let dem = load_input(cfg)?;
    let mut run = run_on_dem(cfg, dem)?;
    run.elapsed_ms = start.elapsed().as_millis() as u64;
    Ok(run)
}

/// Run every stage after loading on a DEM the caller already holds.
/// `cfg.input` and `cfg.tile_extension` are ignored.
pub fn run_on_dem(cfg: &FloodConfig, mut dem: Dem) -> Result<FloodRun> {
    cfg.validate()?;
    let start = Instant::now();
    if let Some(crs) = &cfg.crs {
        dem.crs = Some(crs.clone());
    }

    // ── 1. Conditioning ──────────────────────────────────────────────────────
    let conditioning = condition(&mut dem, &cfg.conditioning);

    // ── 2. Flood fill ───────────────────────────────────────────────────────
    let extent = flood_from_point(&dem, cfg.seed.x, cfg.seed.y, cfg.water_level, cfg.connectivity)?;

    // ── 3. Vectorization ─────────────────────────────────────────────────────
    let shapes = polygons(&extent.mask);

    // ── 4. Outputs ──────────────────────────────────────────────────────────
    let mut outputs = Vec::new();
    if let Some(path) = &cfg.output.geojson {
        let mut props = Map::new();
        props.insert("water_level".into(), json!(extent.water_level));
        props.insert("seed".into(), json!([cfg.seed.x, cfg.seed.y]));
        let collection = to_geojson(&shapes, &props, dem.crs.as_deref());
        ensure_parent(path)?;
        fs::write(path, serde_json::to_string_pretty(&collection)?)?;
        outputs.push(path.clone());
    }
    if let Some(path) = &cfg.output.mask {
        let mut mask = extent.mask.to_dem();
        mask.crs = dem.crs.clone();
        ensure_parent(path)?;
        io::save(path, &mask)?;
        outputs.push(path.clone());
    }
    if let Some(path) = &cfg.output.depth {
        ensure_parent(path)?;
        io::save(path, &depth_grid(&dem, &extent))?;
        outputs.push(path.clone());
    }

    let run = FloodRun {
        dem: dem.summary(),
        conditioning,
        water_level: extent.water_level,
        seed_cell: extent.seed,
        stats: extent.stats,
        polygons: shapes.0.len(),
        outputs,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        cells = run.stats.cells,
        area = run.stats.area,
        polygons = run.polygons,
        outputs = run.outputs.len(),
        "flood run complete"
    );
    Ok(run)
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(fs::create_dir_all(dir)?),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedPoint;
    use crate::error::Error;
    use crate::io::ascii;
    use crate::synthetic::{generate, SyntheticParams};
    use crate::transform::GeoTransform;
    use approx::assert_relative_eq;

    /// 64×48 valley, 50 m cells, no noise: the floor drops from 60 m in the
    /// north to 50 m in the south and the flanks rise 40 m.
    fn valley() -> Dem {
        generate(&SyntheticParams { width: 64, height: 48, relief: 0.0, ..SyntheticParams::default() })
    }

    /// World coordinate of the centre of cell `(col, row)`.
    fn centre(dem: &Dem, col: usize, row: usize) -> SeedPoint {
        let (x, y) = dem.transform.cell_center(col, row);
        SeedPoint { x, y }
    }

    #[test]
    fn valley_run_writes_every_output() {
        let dir = tempfile::tempdir().unwrap();
        let dem = valley();
        let input = dir.path().join("valley.asc");
        ascii::write(&input, &dem, ascii::DEFAULT_NODATA).unwrap();

        let mut cfg = FloodConfig::new(&input, centre(&dem, 32, 24), 58.0);
        cfg.crs = Some("EPSG:27700".into());
        cfg.output.geojson = Some(dir.path().join("out/flood.geojson"));
        cfg.output.mask = Some(dir.path().join("out/mask.asc"));
        cfg.output.depth = Some(dir.path().join("out/depth.json"));

        let run = run(&cfg).unwrap();
        assert_eq!(run.seed_cell, (32, 24));
        assert!(run.stats.cells > 0);
        // The floor keeps falling southward, so the flood runs off the grid.
        assert!(run.stats.touches_edge);
        assert_eq!(run.polygons, 1);
        assert_eq!(run.outputs.len(), 3);
        assert_eq!(run.dem.crs.as_deref(), Some("EPSG:27700"));

        let text = fs::read_to_string(cfg.output.geojson.as_ref().unwrap()).unwrap();
        let gj: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(gj["features"].as_array().unwrap().len(), 1);
        assert_relative_eq!(
            gj["features"][0]["properties"]["area"].as_f64().unwrap(),
            run.stats.area,
            epsilon = 1e-6
        );

        let mask = io::load(cfg.output.mask.as_ref().unwrap()).unwrap();
        let wet = mask.data.iter().filter(|&&v| v == 1.0).count();
        assert_eq!(wet, run.stats.cells);

        let depth = io::load(cfg.output.depth.as_ref().unwrap()).unwrap();
        assert_eq!(depth.valid_count(), run.stats.cells);
    }

    #[test]
    fn tile_directory_is_mosaicked() {
        let dir = tempfile::tempdir().unwrap();
        // Two 4×4 tiles side by side: a low western tile and a high eastern one.
        let west = Dem::new(4, 4, GeoTransform::north_up(1000.0, 2000.0, 10.0), 50.0);
        let east = Dem::new(4, 4, GeoTransform::north_up(1040.0, 2000.0, 10.0), 80.0);
        ascii::write(&dir.path().join("a.asc"), &west, ascii::DEFAULT_NODATA).unwrap();
        ascii::write(&dir.path().join("b.asc"), &east, ascii::DEFAULT_NODATA).unwrap();

        let cfg = FloodConfig::new(dir.path(), SeedPoint { x: 1015.0, y: 1985.0 }, 60.0);
        let run = run(&cfg).unwrap();
        assert_eq!((run.dem.width, run.dem.height), (8, 4));
        assert_eq!(run.stats.cells, 16);
        assert_relative_eq!(run.stats.area, 1600.0);
        assert!(run.outputs.is_empty());
    }

    #[test]
    fn conditioning_runs_before_flooding() {
        let params = SyntheticParams {
            width: 64,
            height: 48,
            relief: 0.0,
            nodata_holes: 4,
            ..SyntheticParams::default()
        };
        let dem = generate(&params);
        assert!(dem.valid_count() < dem.data.len());

        let cfg = FloodConfig::new("unused.asc", centre(&dem, 32, 24), 58.0);
        let run = run_on_dem(&cfg, dem).unwrap();
        assert!(run.conditioning.nodata_filled > 0);
        assert_eq!(run.conditioning.nodata_remaining, 0);
        assert_relative_eq!(run.dem.valid_fraction, 1.0);
    }

    #[test]
    fn seed_outside_the_grid_fails() {
        let dem = valley();
        let cfg = FloodConfig::new("unused.asc", SeedPoint { x: 0.0, y: 0.0 }, 58.0);
        assert!(matches!(run_on_dem(&cfg, dem), Err(Error::SeedOutOfBounds { .. })));
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = FloodConfig::new(dir.path().join("absent.asc"), SeedPoint { x: 0.0, y: 0.0 }, 1.0);
        assert!(matches!(run(&cfg), Err(Error::Io(_))));
    }
}
