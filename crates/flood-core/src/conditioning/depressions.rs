//! Priority-flood depression filling (Barnes, Lehman & Mulla 2014).
//!
//! Cells are processed lowest-first from a min-heap seeded with every valid
//! cell on the raster border or next to nodata (both drain off the grid).
//! Each newly reached neighbour is raised to at least the elevation of the
//! cell it was reached from, so no closed depression survives.
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::dem::{neighbour, Dem, D8_OFFSETS};

#[derive(Clone, Copy)]
struct Open {
    z: f32,
    idx: usize,
}

impl PartialEq for Open {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Open {}

impl PartialOrd for Open {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Open {
    // Reversed so BinaryHeap pops the lowest cell; ties pop in index order.
    fn cmp(&self, other: &Self) -> Ordering {
        other.z.total_cmp(&self.z).then_with(|| other.idx.cmp(&self.idx))
    }
}

/// Fill closed depressions in `dem`.
///
/// With `epsilon > 0` every raised cell sits `epsilon` above the cell that
/// reached it, leaving a drainable gradient across filled flats.
/// Nodata cells are untouched. Returns the number of cells raised.
pub fn fill_depressions(dem: &mut Dem, epsilon: f32) -> usize {
    let (w, h) = (dem.width, dem.height);
    let mut closed = vec![false; w * h];
    let mut heap = BinaryHeap::new();

    for r in 0..h {
        for c in 0..w {
            let i = r * w + c;
            if dem.data[i].is_nan() {
                continue;
            }
            let on_border = r == 0 || c == 0 || r == h - 1 || c == w - 1;
            let beside_nodata = D8_OFFSETS
                .iter()
                .filter_map(|&off| neighbour(w, h, r, c, off))
                .any(|(nr, nc)| dem.data[nr * w + nc].is_nan());
            if on_border || beside_nodata {
                closed[i] = true;
                heap.push(Open { z: dem.data[i], idx: i });
            }
        }
    }

    let mut raised = 0usize;
    while let Some(Open { z, idx }) = heap.pop() {
        let (r, c) = (idx / w, idx % w);
        for &off in &D8_OFFSETS {
            let Some((nr, nc)) = neighbour(w, h, r, c, off) else {
                continue;
            };
            let ni = nr * w + nc;
            if closed[ni] || dem.data[ni].is_nan() {
                continue;
            }
            closed[ni] = true;
            let floor = if epsilon > 0.0 { z + epsilon } else { z };
            let needs_raise = if epsilon > 0.0 { dem.data[ni] <= z } else { dem.data[ni] < z };
            if needs_raise {
                dem.data[ni] = floor;
                raised += 1;
            }
            heap.push(Open { z: dem.data[ni], idx: ni });
        }
    }

    debug!(raised, "priority-flood complete");
    raised
}
