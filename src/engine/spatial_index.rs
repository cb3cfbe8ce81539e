//! Nearest-neighbor index over projected crash coordinates.
//!
//! Built once per analysis run from the full crash set and never mutated
//! afterwards — crashes do not move. Queries operate on NZTM meters, so
//! index distances are straight euclidean distances.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use super::crash_store::CrashStore;

/// A crash's grid coordinates with its position in the crash store.
#[derive(Debug, Clone, Copy)]
pub struct IndexedCrash {
    pub idx: usize,
    pub easting: f64,
    pub northing: f64,
}

impl RTreeObject for IndexedCrash {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.easting, self.northing])
    }
}

impl PointDistance for IndexedCrash {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let de = self.easting - point[0];
        let dn = self.northing - point[1];
        de * de + dn * dn
    }
}

/// R-tree over the crash set, queried point-by-point or in batches.
#[derive(Debug)]
pub struct CrashIndex {
    tree: RTree<IndexedCrash>,
}

impl CrashIndex {
    /// Bulk-load the index from a crash store. O(n log n).
    pub fn build(store: &CrashStore) -> Self {
        let indexed: Vec<IndexedCrash> = store
            .iter()
            .enumerate()
            .map(|(idx, crash)| IndexedCrash {
                idx,
                easting: crash.easting,
                northing: crash.northing,
            })
            .collect();

        Self {
            tree: RTree::bulk_load(indexed),
        }
    }

    /// Nearest crash within `max_distance` meters of a projected point.
    ///
    /// Returns the crash's store position and its distance in meters, or
    /// `None` when no crash lies within the bound.
    pub fn nearest_within(&self, point: [f64; 2], max_distance: f64) -> Option<(usize, f64)> {
        let max_distance_2 = max_distance * max_distance;
        self.tree
            .nearest_neighbor_iter_with_distance_2(&point)
            .next()
            .filter(|(_, distance_2)| *distance_2 <= max_distance_2)
            .map(|(crash, distance_2)| (crash.idx, distance_2.sqrt()))
    }

    /// Up to `k` nearest crashes within `max_distance` meters, closest first.
    pub fn nearest_k_within(
        &self,
        point: [f64; 2],
        max_distance: f64,
        k: usize,
    ) -> Vec<(usize, f64)> {
        let max_distance_2 = max_distance * max_distance;
        self.tree
            .nearest_neighbor_iter_with_distance_2(&point)
            .take_while(|(_, distance_2)| *distance_2 <= max_distance_2)
            .take(k)
            .map(|(crash, distance_2)| (crash.idx, distance_2.sqrt()))
            .collect()
    }

    /// Nearest crash per query point, batched over a whole trip.
    ///
    /// One entry per input point: `None` where no crash lies within the
    /// bound. Amortizes tree traversal over thousands of points.
    pub fn query_batch(
        &self,
        points: &[[f64; 2]],
        max_distance: f64,
    ) -> Vec<Option<(usize, f64)>> {
        points
            .iter()
            .map(|&p| self.nearest_within(p, max_distance))
            .collect()
    }

    /// Number of indexed crashes.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
