/// Single-band GeoTIFF reader built on the pure-Rust `tiff` decoder.
///
/// Georeferencing comes from `ModelTransformationTag`, or from
/// `ModelPixelScaleTag` + `ModelTiepointTag`. Nodata is read from the
/// `GDAL_NODATA` ASCII tag. TIFF storage order (row 0 = north) already
/// matches `Dem`, so no row reversal is needed.
use std::fs;
use std::io::BufReader;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tracing::{debug, warn};

use crate::dem::Dem;
use crate::error::{Error, Result};
use crate::transform::GeoTransform;

// GeoKey ids (GeoTIFF 1.0).
const GT_RASTER_TYPE_GEOKEY: u32 = 1025;
const GEOGRAPHIC_TYPE_GEOKEY: u32 = 2048;
const PROJECTED_CS_TYPE_GEOKEY: u32 = 3072;
const RASTER_PIXEL_IS_POINT: u32 = 2;
/// 32767 means "user-defined" in GeoTIFF; not an EPSG code.
const USER_DEFINED: u32 = 32767;

#[derive(Debug, Default, PartialEq)]
struct GeoKeys {
    epsg: Option<u32>,
    pixel_is_point: bool,
}

/// Decode the GeoKeyDirectory: a 4-short header followed by
/// `(key_id, tag_location, count, value)` entries. Only inline values
/// (tag_location == 0) are needed here.
fn parse_geokeys(dir: &[u32]) -> GeoKeys {
    let mut keys = GeoKeys::default();
    if dir.len() < 4 {
        return keys;
    }
    let n = dir[3] as usize;
    for entry in dir[4..].chunks_exact(4).take(n) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 {
            continue;
        }
        match key {
            GT_RASTER_TYPE_GEOKEY => keys.pixel_is_point = value == RASTER_PIXEL_IS_POINT,
            PROJECTED_CS_TYPE_GEOKEY if value != USER_DEFINED => keys.epsg = Some(value),
            GEOGRAPHIC_TYPE_GEOKEY if value != USER_DEFINED && keys.epsg.is_none() => {
                keys.epsg = Some(value)
            }
            _ => {}
        }
    }
    keys
}

/// Affine transform from the model tags, if the file carries any.
fn transform_from_tags(
    transformation: Option<Vec<f64>>,
    scale: Option<Vec<f64>>,
    tiepoint: Option<Vec<f64>>,
    pixel_is_point: bool,
) -> Option<GeoTransform> {
    let mut gt = if let Some(m) = transformation.filter(|m| m.len() >= 8) {
        // Row-major 4×4: x = m0·col + m1·row + m3, y = m4·col + m5·row + m7.
        GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]])
    } else {
        let scale = scale.filter(|s| s.len() >= 2)?;
        let tp = tiepoint.filter(|t| t.len() >= 6)?;
        let (sx, sy) = (scale[0], scale[1]);
        let origin_x = tp[3] - tp[0] * sx;
        let origin_y = tp[4] + tp[1] * sy;
        GeoTransform::from_gdal([origin_x, sx, 0.0, origin_y, 0.0, -sy])
    };
    if pixel_is_point {
        // Tie points refer to cell centres; move the origin to the outer corner.
        let (x, y) = gt.pixel_to_world(-0.5, -0.5);
        gt.origin_x = x;
        gt.origin_y = y;
    }
    Some(gt)
}

fn widen(img: DecodingResult) -> Result<Vec<f32>> {
    Ok(match img {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => return Err(Error::Unsupported("64-bit integer TIFF samples".into())),
    })
}

pub fn read(path: &Path) -> Result<Dem> {
    let file = fs::File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);

    let transformation = decoder
        .find_tag(Tag::ModelTransformationTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let scale = decoder
        .find_tag(Tag::ModelPixelScaleTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let tiepoint = decoder
        .find_tag(Tag::ModelTiepointTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let geokeys = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)?
        .map(|v| v.into_u32_vec())
        .transpose()?
        .map(|dir| parse_geokeys(&dir))
        .unwrap_or_default();
    let nodata: Option<f64> = decoder
        .find_tag(Tag::GdalNodata)?
        .map(|v| v.into_string())
        .transpose()?
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse().ok());

    let transform = match transform_from_tags(transformation, scale, tiepoint, geokeys.pixel_is_point) {
        Some(gt) => gt,
        None => {
            warn!(path = %path.display(), "GeoTIFF has no georeferencing tags; using pixel coordinates");
            GeoTransform::north_up(0.0, 0.0, 1.0)
        }
    };

    let mut data = widen(decoder.read_image()?)?;
    if data.len() != width * height {
        // Multi-band or palette images decode to more than one sample per pixel.
        return Err(Error::Unsupported(format!(
            "{}: expected a single band, decoded {} samples for {}x{} pixels",
            path.display(),
            data.len(),
            width,
            height
        )));
    }
    if let Some(nd) = nodata {
        let nd = nd as f32;
        for v in data.iter_mut().filter(|v| **v == nd) {
            *v = f32::NAN;
        }
    }

    let mut dem = Dem::from_vec(data, width, height, transform)?;
    dem.crs = geokeys.epsg.map(|code| format!("EPSG:{code}"));
    debug!(
        path = %path.display(),
        width,
        height,
        crs = dem.crs.as_deref().unwrap_or("unknown"),
        "read GeoTIFF"
    );
    Ok(dem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::encoder::{colortype, TiffEncoder};

    fn write_tiff(path: &Path, width: u32, height: u32, data: &[f32], nodata: Option<&str>) {
        let file = fs::File::create(path).unwrap();
        let mut tiff = TiffEncoder::new(file).unwrap();
        let mut image = tiff.new_image::<colortype::Gray32Float>(width, height).unwrap();
        {
            let dir = image.encoder();
            dir.write_tag(Tag::ModelPixelScaleTag, &[50.0f64, 50.0, 0.0][..]).unwrap();
            dir.write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 500_000.0, 150_000.0, 0.0][..])
                .unwrap();
            // Version 1.1.0, three keys: PixelIsArea, ProjectedCRS 27700, linear units.
            dir.write_tag(
                Tag::GeoKeyDirectoryTag,
                &[1u16, 1, 0, 3, 1025, 0, 1, 1, 3072, 0, 1, 27700, 3076, 0, 1, 9001][..],
            )
            .unwrap();
            if let Some(nd) = nodata {
                dir.write_tag(Tag::GdalNodata, nd).unwrap();
            }
        }
        image.write_data(data).unwrap();
    }

    #[test]
    fn reads_values_georeferencing_and_crs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dtm.tif");
        let data: Vec<f32> = (0..12).map(|i| 60.0 + i as f32).collect();
        write_tiff(&path, 4, 3, &data, None);

        let dem = read(&path).unwrap();
        assert_eq!((dem.width, dem.height), (4, 3));
        assert_eq!(dem.transform, GeoTransform::north_up(500_000.0, 150_000.0, 50.0));
        assert_eq!(dem.crs.as_deref(), Some("EPSG:27700"));
        assert_eq!(dem.get(0, 0), 60.0);
        assert_eq!(dem.get(2, 3), 71.0);
    }

    #[test]
    fn gdal_nodata_becomes_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holes.tif");
        let data = [1.0f32, -9999.0, 3.0, 4.0];
        write_tiff(&path, 2, 2, &data, Some("-9999"));

        let dem = read(&path).unwrap();
        assert!(dem.get(0, 1).is_nan());
        assert_eq!(dem.valid_count(), 3);
    }

    #[test]
    fn geokeys_pick_projected_code_over_geographic() {
        let dir = [1, 1, 0, 3, 2048, 0, 1, 4326, 3072, 0, 1, 27700, 1025, 0, 1, 2];
        let keys = parse_geokeys(&dir);
        assert_eq!(keys, GeoKeys { epsg: Some(27700), pixel_is_point: true });
    }

    #[test]
    fn pixel_is_point_moves_origin_to_corner() {
        let gt = transform_from_tags(
            None,
            Some(vec![10.0, 10.0, 0.0]),
            Some(vec![0.0, 0.0, 0.0, 1005.0, 2995.0, 0.0]),
            true,
        )
        .unwrap();
        assert_eq!(gt, GeoTransform::north_up(1000.0, 3000.0, 10.0));
    }

    #[test]
    fn model_transformation_wins_over_tiepoints() {
        let m = vec![
            2.0, 0.0, 0.0, 100.0, //
            0.0, -2.0, 0.0, 200.0, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let gt = transform_from_tags(Some(m), None, None, false).unwrap();
        assert_eq!(gt.to_gdal(), [100.0, 2.0, 0.0, 200.0, 0.0, -2.0]);
        assert!(transform_from_tags(None, None, None, false).is_none());
    }
}
