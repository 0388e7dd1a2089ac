//! `Dem` serialized as JSON. Nodata cells round-trip through `null`.
use std::fs;
use std::path::Path;

use crate::dem::Dem;
use crate::error::Result;

pub fn read(path: &Path) -> Result<Dem> {
    let text = fs::read_to_string(path)?;
    let dem: Dem = serde_json::from_str(&text)?;
    if dem.data.len() != dem.width * dem.height {
        return Err(crate::error::Error::ShapeMismatch {
            width: dem.width,
            height: dem.height,
            len: dem.data.len(),
        });
    }
    Ok(dem)
}

pub fn write(path: &Path, dem: &Dem) -> Result<()> {
    fs::write(path, serde_json::to_string(dem)?)?;
    Ok(())
}
