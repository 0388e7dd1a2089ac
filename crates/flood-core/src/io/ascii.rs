//! ESRI ASCII grid (`.asc`) reader and writer.
//!
//! This is the distribution format of Ordnance Survey Terrain50 tiles:
//!
//! ```text
//! ncols        200
//! nrows        200
//! xllcorner    500000
//! yllcorner    140000
//! cellsize     50
//! NODATA_value -9999
//! 66.3 66.1 ...          <- northernmost row first
//! ```
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::dem::Dem;
use crate::error::{Error, Result};
use crate::transform::GeoTransform;

/// Sentinel used when a header carries no `NODATA_value`, and for output.
pub const DEFAULT_NODATA: f64 = -9999.0;

#[derive(Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<(f64, bool)>,
    yll: Option<(f64, bool)>,
    cellsize: Option<f64>,
    dx: Option<f64>,
    dy: Option<f64>,
    nodata: Option<f64>,
}

fn parse_err(line: usize, message: impl Into<String>) -> Error {
    Error::Parse { line, message: message.into() }
}

pub fn read(path: &Path) -> Result<Dem> {
    let text = fs::read_to_string(path)?;
    let dem = parse(&text)?;
    debug!(path = %path.display(), width = dem.width, height = dem.height, "read ASCII grid");
    Ok(dem)
}

/// `ncols`/`nrows` must be positive whole numbers.
fn grid_count(num: f64, line: usize, key: &str) -> Result<usize> {
    if num.is_finite() && num >= 1.0 && num.fract() == 0.0 && num <= usize::MAX as f64 {
        Ok(num as usize)
    } else {
        Err(parse_err(line, format!("`{key}` must be a positive whole number, got {num}")))
    }
}

/// Parse the text of an ASCII grid.
pub fn parse(text: &str) -> Result<Dem> {
    let mut header = Header::default();
    let mut lines = text.lines().enumerate().peekable();

    // Header: `key value` pairs until the first line that starts with a number.
    while let Some(&(i, line)) = lines.peek() {
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            lines.next();
            continue;
        };
        if key.parse::<f64>().is_ok() {
            break;
        }
        let value = tokens
            .next()
            .ok_or_else(|| parse_err(i + 1, format!("header key `{key}` has no value")))?;
        let num: f64 = value
            .parse()
            .map_err(|_| parse_err(i + 1, format!("bad value `{value}` for `{key}`")))?;
        match key.to_ascii_lowercase().as_str() {
            "ncols" => header.ncols = Some(grid_count(num, i + 1, key)?),
            "nrows" => header.nrows = Some(grid_count(num, i + 1, key)?),
            "xllcorner" => header.xll = Some((num, false)),
            "xllcenter" => header.xll = Some((num, true)),
            "yllcorner" => header.yll = Some((num, false)),
            "yllcenter" => header.yll = Some((num, true)),
            "cellsize" => header.cellsize = Some(num),
            "dx" => header.dx = Some(num),
            "dy" => header.dy = Some(num),
            "nodata_value" => header.nodata = Some(num),
            other => return Err(parse_err(i + 1, format!("unknown header key `{other}`"))),
        }
        lines.next();
    }

    let ncols = header.ncols.ok_or_else(|| parse_err(0, "missing ncols"))?;
    let nrows = header.nrows.ok_or_else(|| parse_err(0, "missing nrows"))?;
    let (xll, x_center) = header.xll.ok_or_else(|| parse_err(0, "missing xllcorner/xllcenter"))?;
    let (yll, y_center) = header.yll.ok_or_else(|| parse_err(0, "missing yllcorner/yllcenter"))?;
    let dx = header
        .dx
        .or(header.cellsize)
        .ok_or_else(|| parse_err(0, "missing cellsize"))?;
    let dy = header
        .dy
        .or(header.cellsize)
        .ok_or_else(|| parse_err(0, "missing cellsize"))?;
    if !dx.is_finite() || !dy.is_finite() || dx <= 0.0 || dy <= 0.0 {
        return Err(parse_err(0, "cell size must be positive"));
    }
    let nodata = header.nodata.unwrap_or(DEFAULT_NODATA);

    let west = if x_center { xll - dx / 2.0 } else { xll };
    let south = if y_center { yll - dy / 2.0 } else { yll };
    let north = south + nrows as f64 * dy;
    let transform = GeoTransform::from_gdal([west, dx, 0.0, north, 0.0, -dy]);

    let expected = ncols
        .checked_mul(nrows)
        .ok_or_else(|| parse_err(0, format!("{ncols} x {nrows} cells overflows")))?;
    // The header is untrusted; reserve no more than the body could hold.
    let mut data = Vec::with_capacity(expected.min(text.len() / 2));
    for (i, line) in lines {
        for token in line.split_whitespace() {
            let v: f64 = token
                .parse()
                .map_err(|_| parse_err(i + 1, format!("bad elevation `{token}`")))?;
            if data.len() == expected {
                return Err(parse_err(i + 1, format!("more than {expected} values")));
            }
            data.push(if v == nodata { f32::NAN } else { v as f32 });
        }
    }
    if data.len() != expected {
        return Err(parse_err(
            text.lines().count(),
            format!("expected {expected} values, found {}", data.len()),
        ));
    }

    Dem::from_vec(data, ncols, nrows, transform)
}

/// Write `dem` as an ASCII grid with NaN cells replaced by `nodata`.
/// The grid must be north-up, unrotated, with square cells.
pub fn write(path: &Path, dem: &Dem, nodata: f64) -> Result<()> {
    let gt = &dem.transform;
    if !gt.is_north_up() {
        return Err(Error::Unsupported("ASCII grids must be north-up and unrotated".into()));
    }
    let cell = gt.pixel_width;
    if (cell + gt.pixel_height).abs() > 1e-9 * cell.abs() {
        return Err(Error::Unsupported(format!(
            "ASCII grids need square cells, got {} x {}",
            gt.pixel_width, -gt.pixel_height
        )));
    }

    let file = fs::File::create(path)?;
    let mut out = BufWriter::new(file);
    let south = gt.origin_y + dem.height as f64 * gt.pixel_height;
    writeln!(out, "ncols        {}", dem.width)?;
    writeln!(out, "nrows        {}", dem.height)?;
    writeln!(out, "xllcorner    {}", gt.origin_x)?;
    writeln!(out, "yllcorner    {}", south)?;
    writeln!(out, "cellsize     {}", cell)?;
    writeln!(out, "NODATA_value {}", nodata)?;
    for row in 0..dem.height {
        let line: Vec<String> = (0..dem.width)
            .map(|col| {
                let v = dem.get(row, col);
                if v.is_nan() {
                    nodata.to_string()
                } else {
                    v.to_string()
                }
            })
            .collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    out.flush()?;
    debug!(path = %path.display(), "wrote ASCII grid");
    Ok(())
}
