//! GeoJSON export of traced flood polygons.
use geo::{Area, LineString, MultiPolygon, Polygon};
use serde_json::{json, Map, Value};

fn ring_coords(ring: &LineString<f64>) -> Value {
    Value::Array(ring.coords().map(|c| json!([c.x, c.y])).collect())
}

fn polygon_coords(poly: &Polygon<f64>) -> Value {
    let mut rings = vec![ring_coords(poly.exterior())];
    rings.extend(poly.interiors().iter().map(ring_coords));
    Value::Array(rings)
}

/// Build a `FeatureCollection` with one `Polygon` feature per polygon.
///
/// Every feature carries `properties` plus its own `area`. When `crs` is an
/// `EPSG:<code>` label a legacy named-CRS member is attached, since projected
/// grids such as British National Grid are not WGS84.
pub fn to_geojson(polygons: &MultiPolygon<f64>, properties: &Map<String, Value>, crs: Option<&str>) -> Value {
    let features: Vec<Value> = polygons
        .0
        .iter()
        .map(|poly| {
            let mut props = properties.clone();
            props.insert("area".into(), json!(poly.unsigned_area()));
            json!({
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": polygon_coords(poly) },
                "properties": Value::Object(props),
            })
        })
        .collect();

    let mut collection = json!({ "type": "FeatureCollection", "features": features });
    if let Some(code) = crs.and_then(|c| c.strip_prefix("EPSG:")) {
        collection["crs"] = json!({
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{code}") },
        });
    }
    collection
}
