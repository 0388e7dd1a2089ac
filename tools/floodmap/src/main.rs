/// Flood-extent mapping CLI: inspect rasters, condition terrain, flood from a
/// seed point and export polygons. Results go to stdout as JSON; logs go to
/// stderr (`RUST_LOG` filters them, default `info`).
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use flood_core::conditioning::{condition, ConditioningParams};
use flood_core::config::{FloodConfig, SeedPoint};
use flood_core::flood::stage_curve;
use flood_core::io::{self, mosaic};
use flood_core::pipeline;
use flood_core::synthetic::{self, SyntheticParams};
use flood_core::{Connectivity, Dem};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "floodmap", about = "Flood-extent mapping over LiDAR / DEM rasters")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print grid size, extent and elevation range of a raster.
    Info {
        raster: PathBuf,
    },
    /// Find the cell containing a world coordinate.
    Locate {
        raster: PathBuf,
        #[command(flatten)]
        point: Point,
    },
    /// Merge a directory of tiles into one raster.
    Mosaic {
        dir: PathBuf,
        /// Tile file extension.
        #[arg(long, default_value = "asc")]
        extension: String,
        /// Output raster (.asc or .json).
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Fill nodata, smooth and optionally fill depressions.
    Condition {
        raster: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        conditioning: ConditioningArgs,
    },
    /// Flood from a seed point and write the requested products.
    Flood(FloodArgs),
    /// Flooded area and volume over a range of water levels.
    Curve {
        raster: PathBuf,
        #[command(flatten)]
        point: Point,
        #[arg(long)]
        from: f32,
        #[arg(long)]
        to: f32,
        #[arg(long, default_value = "0.5")]
        step: f32,
        /// Use 8-connectivity instead of 4.
        #[arg(long)]
        eight: bool,
        #[command(flatten)]
        conditioning: ConditioningArgs,
    },
    /// Write a synthetic river-valley DEM.
    Synth {
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value = "200")]
        width: usize,
        #[arg(long, default_value = "200")]
        height: usize,
        #[arg(long, default_value = "50")]
        cell_size: f64,
        #[arg(long, default_value = "42")]
        seed: u32,
        /// Random single-cell pits to carve.
        #[arg(long, default_value = "0")]
        pits: usize,
        /// Random nodata holes to punch.
        #[arg(long, default_value = "0")]
        holes: usize,
    },
}

#[derive(Args, Debug)]
struct Point {
    /// Easting / x in the raster's CRS.
    #[arg(long, allow_negative_numbers = true)]
    x: f64,
    /// Northing / y in the raster's CRS.
    #[arg(long, allow_negative_numbers = true)]
    y: f64,
}

#[derive(Args, Debug)]
struct ConditioningArgs {
    /// Leave nodata holes unfilled.
    #[arg(long)]
    keep_nodata: bool,
    /// 3×3 mean smoothing passes.
    #[arg(long, default_value = "0")]
    smooth: u32,
    /// Raise closed depressions to their spill level.
    #[arg(long)]
    fill_depressions: bool,
    /// Gradient imposed across filled flats.
    #[arg(long, default_value = "0")]
    epsilon: f32,
}

impl ConditioningArgs {
    fn params(&self) -> ConditioningParams {
        ConditioningParams {
            fill_nodata: !self.keep_nodata,
            smooth_passes: self.smooth,
            fill_depressions: self.fill_depressions,
            depression_epsilon: self.epsilon,
            ..ConditioningParams::default()
        }
    }
}

#[derive(Args, Debug)]
struct FloodArgs {
    /// JSON run configuration; replaces every other flood option.
    #[arg(long, conflicts_with_all = ["raster", "x", "y", "level"])]
    config: Option<PathBuf>,
    /// Raster file or tile directory.
    raster: Option<PathBuf>,
    #[arg(long, allow_negative_numbers = true)]
    x: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    y: Option<f64>,
    /// Water-surface elevation.
    #[arg(long, allow_negative_numbers = true)]
    level: Option<f32>,
    /// Use 8-connectivity instead of 4.
    #[arg(long)]
    eight: bool,
    /// CRS label for outputs, e.g. EPSG:27700.
    #[arg(long)]
    crs: Option<String>,
    #[arg(long)]
    geojson: Option<PathBuf>,
    #[arg(long)]
    mask: Option<PathBuf>,
    #[arg(long)]
    depth: Option<PathBuf>,
    #[command(flatten)]
    conditioning: ConditioningArgs,
}

impl FloodArgs {
    fn into_config(self) -> Result<FloodConfig> {
        if let Some(path) = &self.config {
            return FloodConfig::load(path).with_context(|| format!("Cannot load config {}", path.display()));
        }
        let (Some(raster), Some(x), Some(y), Some(level)) = (self.raster, self.x, self.y, self.level) else {
            bail!("flood needs --config, or a raster with --x, --y and --level");
        };
        let mut cfg = FloodConfig::new(raster, SeedPoint { x, y }, level);
        cfg.connectivity = connectivity(self.eight);
        cfg.conditioning = self.conditioning.params();
        cfg.crs = self.crs;
        cfg.output.geojson = self.geojson;
        cfg.output.mask = self.mask;
        cfg.output.depth = self.depth;
        Ok(cfg)
    }
}

fn connectivity(eight: bool) -> Connectivity {
    if eight {
        Connectivity::Eight
    } else {
        Connectivity::Four
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn load(path: &Path) -> Result<Dem> {
    io::load(path).with_context(|| format!("Cannot read raster {}", path.display()))
}

fn save(path: &Path, dem: &Dem) -> Result<()> {
    io::save(path, dem).with_context(|| format!("Write failed: {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Water levels `from, from + step, …` up to and including `to`.
fn level_range(from: f32, to: f32, step: f32) -> Result<Vec<f32>> {
    if step.is_nan() || step <= 0.0 || !from.is_finite() || !to.is_finite() {
        bail!("level range needs finite bounds and a positive step");
    }
    if to < from {
        bail!("--to ({to}) is below --from ({from})");
    }
    // Small slack so that `to` survives float rounding.
    let n = ((to - from) / step + 1e-4).floor() as usize;
    Ok((0..=n).map(|i| from + i as f32 * step).collect())
}

#[derive(Serialize)]
struct CellReport {
    col: usize,
    row: usize,
    center: (f64, f64),
    elevation: Option<f32>,
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        Command::Info { raster } => {
            let dem = load(&raster)?;
            print_json(&dem.summary())?;
        }

        Command::Locate { raster, point } => {
            let dem = load(&raster)?;
            let Some((col, row)) = dem.transform.locate(point.x, point.y, dem.width, dem.height) else {
                bail!("({}, {}) lies outside {}", point.x, point.y, raster.display());
            };
            let elevation = dem.is_valid(row, col).then(|| dem.get(row, col));
            print_json(&CellReport { col, row, center: dem.transform.cell_center(col, row), elevation })?;
        }

        Command::Mosaic { dir, extension, output } => {
            let dem = mosaic::load_dir(&dir, &extension)
                .with_context(|| format!("Mosaic of {} failed", dir.display()))?;
            save(&output, &dem)?;
            info!(output = %output.display(), width = dem.width, height = dem.height, "wrote mosaic");
            print_json(&dem.summary())?;
        }

        Command::Condition { raster, output, conditioning } => {
            let mut dem = load(&raster)?;
            let report = condition(&mut dem, &conditioning.params());
            save(&output, &dem)?;
            print_json(&report)?;
        }

        Command::Flood(args) => {
            let cfg = args.into_config()?;
            let run = pipeline::run(&cfg).context("Flood run failed")?;
            print_json(&run)?;
        }

        Command::Curve { raster, point, from, to, step, eight, conditioning } => {
            let levels = level_range(from, to, step)?;
            let mut dem = load(&raster)?;
            condition(&mut dem, &conditioning.params());
            let Some(seed) = dem.transform.locate(point.x, point.y, dem.width, dem.height) else {
                bail!("({}, {}) lies outside {}", point.x, point.y, raster.display());
            };
            let curve = stage_curve(&dem, seed, &levels, connectivity(eight))?;
            print_json(&curve)?;
        }

        Command::Synth { output, width, height, cell_size, seed, pits, holes } => {
            let params = SyntheticParams {
                width,
                height,
                cell_size,
                seed,
                pits,
                nodata_holes: holes,
                ..SyntheticParams::default()
            };
            let dem = synthetic::generate(&params).with_crs("EPSG:27700");
            save(&output, &dem)?;
            info!(output = %output.display(), width, height, "wrote synthetic DEM");
            print_json(&dem.summary())?;
        }
    }

    Ok(())
}
