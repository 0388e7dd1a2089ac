//! Synthetic DEMs for demos and tests.
//!
//! A river valley running north → south: elevation rises away from the
//! valley axis, falls toward the southern edge, and carries fBm relief.
//! Optional random pits and nodata holes mimic raw LiDAR artefacts so the
//! conditioning steps have something to repair.
use noise::{NoiseFn, Perlin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::dem::Dem;
use crate::transform::GeoTransform;

/// Fractional Brownian Motion: sum of Perlin octaves with amplitude
/// gain^i and frequency lacunarity^i, where gain = lacunarity^(−H).
struct Fbm {
    h: f32,
    octaves: u32,
    lacunarity: f32,
    noise: Perlin,
}

impl Fbm {
    /// `lacunarity` is fixed at 2.0; gain is derived from H.
    fn new(seed: u32, h: f32, octaves: u32) -> Self {
        Self { h, octaves, lacunarity: 2.0, noise: Perlin::new(seed) }
    }

    #[inline]
    fn gain(&self) -> f64 {
        (self.lacunarity as f64).powf(-(self.h as f64))
    }

    /// Unscaled value, typically ≈ ±1 for H≈0.75.
    fn sample(&self, x: f64, y: f64) -> f64 {
        let gain = self.gain();
        let mut value = 0.0f64;
        let mut amp = 1.0f64;
        let mut freq = 1.0f64;
        for _ in 0..self.octaves {
            value += amp * self.noise.get([x * freq, y * freq]);
            amp *= gain;
            freq *= self.lacunarity as f64;
        }
        value
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticParams {
    pub width: usize,
    pub height: usize,
    /// Cell size in metres.
    pub cell_size: f64,
    /// North-west corner of the grid.
    pub west: f64,
    pub north: f64,
    pub seed: u32,
    /// Elevation of the valley floor at the northern edge.
    pub base_elevation: f32,
    /// Rise from the valley axis to the east/west edges.
    pub valley_depth: f32,
    /// Drop of the valley floor from the northern to the southern edge.
    pub downstream_drop: f32,
    /// Amplitude of fBm relief.
    pub relief: f32,
    pub hurst: f32,
    pub octaves: u32,
    pub pits: usize,
    pub pit_depth: f32,
    pub nodata_holes: usize,
    /// Radius of each nodata hole, in cells.
    pub hole_radius: usize,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        // A Terrain50-sized (10 km, 50 m cells) tile in the SU square.
        Self {
            width: 200,
            height: 200,
            cell_size: 50.0,
            west: 500_000.0,
            north: 150_000.0,
            seed: 42,
            base_elevation: 60.0,
            valley_depth: 40.0,
            downstream_drop: 10.0,
            relief: 3.0,
            hurst: 0.75,
            octaves: 6,
            pits: 0,
            pit_depth: 5.0,
            nodata_holes: 0,
            hole_radius: 2,
        }
    }
}

/// Generate a synthetic valley DEM. Deterministic for a given `params.seed`.
pub fn generate(params: &SyntheticParams) -> Dem {
    let (w, h) = (params.width, params.height);
    let transform = GeoTransform::north_up(params.west, params.north, params.cell_size);
    let mut dem = Dem::new(w, h, transform, 0.0);
    if w == 0 || h == 0 {
        return dem;
    }

    let fbm = Fbm::new(params.seed, params.hurst, params.octaves);
    // Base frequency: 4 cycles across the tile.
    let base_freq = 4.0 / w.max(h) as f64;
    let axis = (w - 1) as f32 / 2.0;
    let half_width = axis.max(1.0);
    let rows = (h - 1).max(1) as f32;

    for r in 0..h {
        let floor = params.base_elevation - params.downstream_drop * r as f32 / rows;
        for c in 0..w {
            let t = ((c as f32 - axis).abs() / half_width).min(1.0);
            let valley = params.valley_depth * t.powf(1.5);
            let noise = params.relief * fbm.sample(c as f64 * base_freq, r as f64 * base_freq) as f32;
            dem.set(r, c, floor + valley + noise);
        }
    }

    let mut rng = StdRng::seed_from_u64(params.seed as u64);
    if w > 2 && h > 2 {
        for _ in 0..params.pits {
            let r = rng.gen_range(1..h - 1);
            let c = rng.gen_range(1..w - 1);
            let z = dem.get(r, c);
            dem.set(r, c, z - params.pit_depth);
        }
    }
    let radius = params.hole_radius as isize;
    for _ in 0..params.nodata_holes {
        let cr = rng.gen_range(0..h) as isize;
        let cc = rng.gen_range(0..w) as isize;
        for dr in -radius..=radius {
            for dc in -radius..=radius {
                if dr * dr + dc * dc > radius * radius {
                    continue;
                }
                let (r, c) = (cr + dr, cc + dc);
                if r >= 0 && c >= 0 && (r as usize) < h && (c as usize) < w {
                    dem.set(r as usize, c as usize, f32::NAN);
                }
            }
        }
    }
    dem
}
