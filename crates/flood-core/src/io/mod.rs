//! Raster readers and writers: ESRI ASCII grids, GeoTIFF, serialized JSON,
//! plus tile mosaicking.
pub mod ascii;
pub mod geotiff;
pub mod json;
pub mod mosaic;

use std::path::Path;

use crate::dem::Dem;
use crate::error::{Error, Result};

/// Load a single raster, choosing the reader from the file extension.
pub fn load(path: &Path) -> Result<Dem> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "asc" => ascii::read(path),
        "tif" | "tiff" => geotiff::read(path),
        "json" => json::read(path),
        _ => Err(Error::Unsupported(format!(
            "raster format of {} (expected .asc, .tif or .json)",
            path.display()
        ))),
    }
}

/// Write a raster, choosing the writer from the file extension.
/// GeoTIFF output is not supported.
pub fn save(path: &Path, dem: &Dem) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "asc" => ascii::write(path, dem, ascii::DEFAULT_NODATA),
        "json" => json::write(path, dem),
        _ => Err(Error::Unsupported(format!(
            "output format of {} (expected .asc or .json)",
            path.display()
        ))),
    }
}
