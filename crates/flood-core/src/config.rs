//! Run configuration, read from JSON.
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::conditioning::ConditioningParams;
use crate::error::{Error, Result};
use crate::flood::Connectivity;

/// A world coordinate in the raster's CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedPoint {
    pub x: f64,
    pub y: f64,
}

/// Where to write run products. Every output is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputPaths {
    /// Flood polygons as a GeoJSON FeatureCollection.
    pub geojson: Option<PathBuf>,
    /// 1/0 flood mask raster (`.asc` or `.json`).
    pub mask: Option<PathBuf>,
    /// Water depth raster (`.asc` or `.json`).
    pub depth: Option<PathBuf>,
}

fn default_tile_extension() -> String {
    "asc".to_string()
}

/// Everything one flood run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloodConfig {
    /// A raster file, or a directory of tiles to mosaic.
    pub input: PathBuf,
    /// Extension of the tiles picked up when `input` is a directory.
    #[serde(default = "default_tile_extension")]
    pub tile_extension: String,
    pub seed: SeedPoint,
    /// Water-surface elevation, in the DEM's vertical units.
    pub water_level: f32,
    #[serde(default)]
    pub connectivity: Connectivity,
    #[serde(default)]
    pub conditioning: ConditioningParams,
    /// Overrides the CRS label read from the input.
    #[serde(default)]
    pub crs: Option<String>,
    #[serde(default)]
    pub output: OutputPaths,
}

impl FloodConfig {
    /// Minimal configuration with default conditioning and no outputs.
    pub fn new(input: impl Into<PathBuf>, seed: SeedPoint, water_level: f32) -> Self {
        Self {
            input: input.into(),
            tile_extension: default_tile_extension(),
            seed,
            water_level,
            connectivity: Connectivity::default(),
            conditioning: ConditioningParams::default(),
            crs: None,
            output: OutputPaths::default(),
        }
    }

    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let cfg: FloodConfig = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.water_level.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "water_level must be finite, got {}",
                self.water_level
            )));
        }
        if !self.seed.x.is_finite() || !self.seed.y.is_finite() {
            return Err(Error::InvalidConfig("seed coordinates must be finite".into()));
        }
        if self.tile_extension.is_empty() {
            return Err(Error::InvalidConfig("tile_extension must not be empty".into()));
        }
        let c = &self.conditioning;
        if c.fill_nodata && c.max_fill_passes == 0 {
            return Err(Error::InvalidConfig(
                "max_fill_passes must be positive when fill_nodata is on".into(),
            ));
        }
        if !c.depression_epsilon.is_finite() || c.depression_epsilon < 0.0 {
            return Err(Error::InvalidConfig(
                "depression_epsilon must be a finite, non-negative number".into(),
            ));
        }
        Ok(())
    }
}
