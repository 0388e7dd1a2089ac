use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transform::{GeoTransform, GridExtent};

/// Row/column offsets of the eight neighbours, clockwise from north.
pub(crate) const D8_OFFSETS: [(isize, isize); 8] = [
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
];

/// Row/column offsets of the four edge neighbours.
pub(crate) const D4_OFFSETS: [(isize, isize); 4] = [(-1, 0), (0, 1), (1, 0), (0, -1)];

/// In-bounds neighbour of `(row, col)` at offset `(dr, dc)` in a
/// `width`×`height` grid.
#[inline]
pub(crate) fn neighbour(
    width: usize,
    height: usize,
    row: usize,
    col: usize,
    (dr, dc): (isize, isize),
) -> Option<(usize, usize)> {
    let nr = row as isize + dr;
    let nc = col as isize + dc;
    if nr < 0 || nc < 0 || nr >= height as isize || nc >= width as isize {
        return None;
    }
    Some((nr as usize, nc as usize))
}

/// A digital elevation model storing elevation data as f32 in metres, row-major.
/// Row 0 is the northernmost row (raster order). Nodata cells hold NaN.
/// Coordinate math uses f64; elevation values use f32.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dem {
    /// Row-major elevation values in metres; NaN marks nodata.
    #[serde(deserialize_with = "null_as_nan_vec")]
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    /// Coordinate reference system label, e.g. "EPSG:27700". Metadata only.
    #[serde(default)]
    pub crs: Option<String>,
}

/// serde_json writes non-finite floats as `null`; read them back as NaN.
fn null_as_nan_vec<'de, D: serde::Deserializer<'de>>(
    d: D,
) -> std::result::Result<Vec<f32>, D::Error> {
    let v: Vec<Option<f32>> = Vec::deserialize(d)?;
    Ok(v.into_iter().map(|x| x.unwrap_or(f32::NAN)).collect())
}

/// Serializable overview of a DEM, reported by `floodmap info` and in run reports.
#[derive(Debug, Clone, Serialize)]
pub struct DemSummary {
    pub width: usize,
    pub height: usize,
    pub crs: Option<String>,
    pub geotransform: [f64; 6],
    pub extent: GridExtent,
    pub min_elevation: Option<f32>,
    pub max_elevation: Option<f32>,
    pub valid_fraction: f64,
}

impl Dem {
    /// Create a new DEM filled with the given value.
    pub fn new(width: usize, height: usize, transform: GeoTransform, fill: f32) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            transform,
            crs: None,
        }
    }

    /// Wrap an existing row-major buffer.
    pub fn from_vec(data: Vec<f32>, width: usize, height: usize, transform: GeoTransform) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::ShapeMismatch { width, height, len: data.len() });
        }
        Ok(Self { data, width, height, transform, crs: None })
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[self.index(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        let i = self.index(row, col);
        self.data[i] = val;
    }

    #[inline]
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        !self.get(row, col).is_nan()
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    pub fn valid_fraction(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.valid_count() as f64 / self.data.len() as f64
    }

    /// Sample the DEM at world coordinate `(x, y)` using bilinear interpolation
    /// between cell centres.
    /// Returns None outside the grid of centres or when a neighbour is nodata.
    pub fn sample(&self, x: f64, y: f64) -> Option<f32> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let (col, row) = self.transform.world_to_pixel(x, y).ok()?;
        let fx = col - 0.5;
        let fy = row - 0.5;
        if fx < 0.0 || fy < 0.0 || fx > (self.width - 1) as f64 || fy > (self.height - 1) as f64 {
            return None;
        }

        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let tx = (fx - x0 as f64) as f32;
        let ty = (fy - y0 as f64) as f32;

        let v00 = self.get(y0, x0);
        let v10 = self.get(y0, x1);
        let v01 = self.get(y1, x0);
        let v11 = self.get(y1, x1);

        let v = v00 * (1.0 - tx) * (1.0 - ty)
            + v10 * tx * (1.0 - ty)
            + v01 * (1.0 - tx) * ty
            + v11 * tx * ty;

        if v.is_nan() {
            None
        } else {
            Some(v)
        }
    }

    pub fn min_elevation(&self) -> Option<f32> {
        self.data.iter().cloned().filter(|v| !v.is_nan()).reduce(f32::min)
    }

    pub fn max_elevation(&self) -> Option<f32> {
        self.data.iter().cloned().filter(|v| !v.is_nan()).reduce(f32::max)
    }

    pub fn extent(&self) -> GridExtent {
        self.transform.extent(self.width, self.height)
    }

    /// Rows reversed so that row 0 is the southernmost row. The transform is
    /// rewritten so every cell keeps its world position.
    pub fn flipped(&self) -> Dem {
        let mut data = Vec::with_capacity(self.data.len());
        for row in (0..self.height).rev() {
            let start = row * self.width;
            data.extend_from_slice(&self.data[start..start + self.width]);
        }
        let gt = self.transform;
        let (origin_x, origin_y) = gt.pixel_to_world(0.0, self.height as f64);
        Dem {
            data,
            width: self.width,
            height: self.height,
            transform: GeoTransform {
                origin_x,
                origin_y,
                row_rotation: -gt.row_rotation,
                pixel_height: -gt.pixel_height,
                ..gt
            },
            crs: self.crs.clone(),
        }
    }

    pub fn summary(&self) -> DemSummary {
        DemSummary {
            width: self.width,
            height: self.height,
            crs: self.crs.clone(),
            geotransform: self.transform.to_gdal(),
            extent: self.extent(),
            min_elevation: self.min_elevation(),
            max_elevation: self.max_elevation(),
            valid_fraction: self.valid_fraction(),
        }
    }
}

/// Boolean grid aligned with a [`Dem`]; `true` marks a set cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub data: Vec<bool>,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
}

impl Mask {
    pub fn new(width: usize, height: usize, transform: GeoTransform) -> Self {
        Self { data: vec![false; width * height], width, height, transform }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: bool) {
        self.data[row * self.width + col] = val;
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&b| b).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&b| b)
    }

    /// `(row, col)` of every set cell, in row-major order.
    pub fn iter_set(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let w = self.width;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &b)| b)
            .map(move |(i, _)| (i / w, i % w))
    }

    /// Cell-wise intersection of two masks of the same shape.
    pub fn and(&self, other: &Mask) -> Result<Mask> {
        if (self.width, self.height) != (other.width, other.height) {
            return Err(Error::ShapeMismatch {
                width: self.width,
                height: self.height,
                len: other.data.len(),
            });
        }
        Ok(Mask {
            data: self.data.iter().zip(&other.data).map(|(&a, &b)| a && b).collect(),
            width: self.width,
            height: self.height,
            transform: self.transform,
        })
    }

    /// 1.0 for set cells, 0.0 otherwise.
    pub fn to_dem(&self) -> Dem {
        Dem {
            data: self.data.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
            width: self.width,
            height: self.height,
            transform: self.transform,
            crs: None,
        }
    }
}
