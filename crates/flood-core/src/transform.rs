/// Affine georeferencing for raster grids.
/// All coordinate math uses f64 for precision.
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// GDAL-style six-coefficient affine transform.
///
/// ```text
///   x = origin_x + col * pixel_width + row * row_rotation
///   y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// `(origin_x, origin_y)` is the outer north-west corner of cell (0, 0).
/// `pixel_height` is negative for north-up rasters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

/// Cell-centre summary of a grid: cell sizes, the centres of the
/// south-west and north-east cells, and the centre of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridExtent {
    pub cell_width: f64,
    pub cell_height: f64,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::north_up(0.0, 0.0, 1.0)
    }
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            origin_x: gt[0],
            pixel_width: gt[1],
            row_rotation: gt[2],
            origin_y: gt[3],
            col_rotation: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Unrotated transform with square cells; `north` is the top edge.
    pub fn north_up(west: f64, north: f64, cell_size: f64) -> Self {
        Self::from_gdal([west, cell_size, 0.0, north, 0.0, -cell_size])
    }

    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0 && self.pixel_height < 0.0
    }

    pub fn cell_width(&self) -> f64 {
        self.pixel_width.hypot(self.col_rotation)
    }

    pub fn cell_height(&self) -> f64 {
        self.pixel_height.hypot(self.row_rotation)
    }

    /// Ground area of one cell (absolute determinant of the linear part).
    pub fn cell_area(&self) -> f64 {
        self.determinant().abs()
    }

    fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }

    /// World coordinate of fractional pixel position `(col, row)`.
    /// Integer positions land on cell corners.
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Fractional `(col, row)` of a world coordinate.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(Error::DegenerateTransform);
        }
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let col = (dx * self.pixel_height - dy * self.row_rotation) / det;
        let row = (dy * self.pixel_width - dx * self.col_rotation) / det;
        Ok((col, row))
    }

    /// Cell containing `(x, y)` in a `width`×`height` grid, or `None` when the
    /// point falls outside it (or the transform is degenerate).
    pub fn locate(&self, x: f64, y: f64, width: usize, height: usize) -> Option<(usize, usize)> {
        let (col, row) = self.world_to_pixel(x, y).ok()?;
        let (col, row) = (col.floor(), row.floor());
        // Written as positive range checks so NaN falls outside.
        if !(col >= 0.0 && col < width as f64 && row >= 0.0 && row < height as f64) {
            return None;
        }
        Some((col as usize, row as usize))
    }

    /// Outer bounds `(min_x, min_y, max_x, max_y)` of a `width`×`height` grid.
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.pixel_to_world(0.0, 0.0),
            self.pixel_to_world(width as f64, 0.0),
            self.pixel_to_world(0.0, height as f64),
            self.pixel_to_world(width as f64, height as f64),
        ];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }

    /// Centres of the extreme cells of a `width`×`height` grid.
    pub fn extent(&self, width: usize, height: usize) -> GridExtent {
        let (min_x, min_y, max_x, max_y) = self.bounds(width, height);
        let half_w = self.cell_width() * 0.5;
        let half_h = self.cell_height() * 0.5;
        let (min_x, max_x) = (min_x + half_w, max_x - half_w);
        let (min_y, max_y) = (min_y + half_h, max_y - half_h);
        GridExtent {
            cell_width: self.cell_width(),
            cell_height: self.cell_height(),
            min_x,
            min_y,
            max_x,
            max_y,
            center_x: (min_x + max_x) / 2.0,
            center_y: (min_y + max_y) / 2.0,
        }
    }
}
