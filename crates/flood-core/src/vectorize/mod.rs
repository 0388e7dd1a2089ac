//! Mask → polygon tracing.
//!
//! Every set cell contributes the sides it shares with unset cells (or the
//! raster border). Sides are directed so that, in map orientation, the wet
//! region lies on the left; chaining them yields counter-clockwise exterior
//! rings and clockwise holes. Where two cells touch only at a corner the
//! chain always takes the left-most turn, which keeps diagonal neighbours in
//! separate rings (4-connected boundary semantics).
pub mod geojson;

use std::collections::HashMap;

use geo::{LineString, MultiPolygon, Polygon};
use tracing::debug;

use crate::dem::{neighbour, Mask, D4_OFFSETS};
pub use geojson::to_geojson;

/// Lattice vertex `(col, row)`; cell `(r, c)` spans `(c, r)`–`(c + 1, r + 1)`.
type Vertex = (i64, i64);

struct Side {
    start: Vertex,
    end: Vertex,
    /// 4-connected component of the cell that owns this side.
    component: usize,
}

/// Label 4-connected components of set cells; unset cells get `usize::MAX`.
fn label_components(mask: &Mask) -> (Vec<usize>, usize) {
    let (w, h) = (mask.width, mask.height);
    let mut labels = vec![usize::MAX; w * h];
    let mut next = 0usize;
    let mut stack = Vec::new();
    for start in 0..w * h {
        if !mask.data[start] || labels[start] != usize::MAX {
            continue;
        }
        labels[start] = next;
        stack.push(start);
        while let Some(i) = stack.pop() {
            for &off in &D4_OFFSETS {
                if let Some((nr, nc)) = neighbour(w, h, i / w, i % w, off) {
                    let j = nr * w + nc;
                    if mask.data[j] && labels[j] == usize::MAX {
                        labels[j] = next;
                        stack.push(j);
                    }
                }
            }
        }
        next += 1;
    }
    (labels, next)
}

/// Directed boundary sides of every set cell.
fn boundary_sides(mask: &Mask, labels: &[usize]) -> Vec<Side> {
    let (w, h) = (mask.width, mask.height);
    let is_set = |r: usize, c: usize, off: (isize, isize)| {
        neighbour(w, h, r, c, off).is_some_and(|(nr, nc)| mask.get(nr, nc))
    };
    let mut sides = Vec::new();
    for (r, c) in mask.iter_set() {
        let component = labels[r * w + c];
        let (x0, y0) = (c as i64, r as i64);
        let (x1, y1) = (x0 + 1, y0 + 1);
        // South side runs west → east, east side south → north,
        // north side east → west, west side north → south.
        if !is_set(r, c, (1, 0)) {
            sides.push(Side { start: (x0, y1), end: (x1, y1), component });
        }
        if !is_set(r, c, (0, 1)) {
            sides.push(Side { start: (x1, y1), end: (x1, y0), component });
        }
        if !is_set(r, c, (-1, 0)) {
            sides.push(Side { start: (x1, y0), end: (x0, y0), component });
        }
        if !is_set(r, c, (0, -1)) {
            sides.push(Side { start: (x0, y0), end: (x0, y1), component });
        }
    }
    sides
}

/// Direction of a side in map orientation (x east, y north).
fn direction(side: &Side) -> (i64, i64) {
    (side.end.0 - side.start.0, side.start.1 - side.end.1)
}

/// Preference for leaving along `out` after arriving along `inc`:
/// left turn 2, straight 1, right turn 0.
fn turn_rank(inc: (i64, i64), out: (i64, i64)) -> u8 {
    let cross = inc.0 * out.1 - inc.1 * out.0;
    match cross.signum() {
        1 => 2,
        0 => 1,
        _ => 0,
    }
}

/// Chain sides into closed rings of lattice vertices, each tagged with its
/// component.
fn trace_rings(sides: &[Side]) -> Vec<(usize, Vec<Vertex>)> {
    let mut by_start: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, s) in sides.iter().enumerate() {
        by_start.entry(s.start).or_default().push(i);
    }

    let mut used = vec![false; sides.len()];
    let mut rings = Vec::new();
    for first in 0..sides.len() {
        if used[first] {
            continue;
        }
        let mut ring = Vec::new();
        let mut cur = first;
        loop {
            used[cur] = true;
            ring.push(sides[cur].start);
            let inc = direction(&sides[cur]);
            let next = by_start
                .get(&sides[cur].end)
                .into_iter()
                .flatten()
                .copied()
                .filter(|&j| !used[j] || j == first)
                .max_by_key(|&j| turn_rank(inc, direction(&sides[j])));
            match next {
                Some(j) if j != first => cur = j,
                _ => break,
            }
        }
        rings.push((sides[first].component, ring));
    }
    rings
}

/// Drop vertices where the ring continues straight on.
fn drop_collinear(ring: &[Vertex]) -> Vec<Vertex> {
    let n = ring.len();
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let cur = ring[i];
            let next = ring[(i + 1) % n];
            let a = (cur.0 - prev.0, cur.1 - prev.1);
            let b = (next.0 - cur.0, next.1 - cur.1);
            a.0 * b.1 - a.1 * b.0 != 0
        })
        .map(|i| ring[i])
        .collect()
}

/// Twice the signed area in map orientation; positive for exterior rings.
fn doubled_area(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (x0, r0) = ring[i];
            let (x1, r1) = ring[(i + 1) % n];
            // Map y is -row.
            x0 * -r1 - x1 * -r0
        })
        .sum()
}

/// Trace the set cells of `mask` into polygons in world coordinates.
///
/// One polygon per 4-connected region, in raster scan order of each
/// region's first cell. Exterior rings are counter-clockwise and holes
/// clockwise in world coordinates.
pub fn polygons(mask: &Mask) -> MultiPolygon<f64> {
    let (labels, n_components) = label_components(mask);
    let sides = boundary_sides(mask, &labels);
    let rings = trace_rings(&sides);

    // Rotated or south-up transforms mirror the lattice; undo it so that
    // exteriors stay counter-clockwise in world space.
    let gt = &mask.transform;
    let mirrored = gt.pixel_width * gt.pixel_height - gt.row_rotation * gt.col_rotation > 0.0;
    let to_world = |ring: &[Vertex]| -> LineString<f64> {
        let mut coords: Vec<(f64, f64)> = ring
            .iter()
            .map(|&(c, r)| gt.pixel_to_world(c as f64, r as f64))
            .collect();
        if mirrored {
            coords.reverse();
        }
        LineString::from(coords)
    };

    let mut exteriors: Vec<Option<LineString<f64>>> = vec![None; n_components];
    let mut holes: Vec<Vec<LineString<f64>>> = vec![Vec::new(); n_components];
    for (component, ring) in rings {
        let ring = drop_collinear(&ring);
        if ring.len() < 4 {
            continue;
        }
        if doubled_area(&ring) > 0 {
            exteriors[component] = Some(to_world(&ring));
        } else {
            holes[component].push(to_world(&ring));
        }
    }

    let polys: Vec<Polygon<f64>> = exteriors
        .into_iter()
        .zip(holes)
        .filter_map(|(ext, holes)| ext.map(|e| Polygon::new(e, holes)))
        .collect();
    debug!(polygons = polys.len(), sides = sides.len(), "vectorized mask");
    MultiPolygon::new(polys)
}
