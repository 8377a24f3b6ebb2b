use rstar::primitives::{GeomWithData, Line};
use rstar::{PointDistance, RTree};

use crate::Pt2D;

type Segment<K> = GeomWithData<Line<[f64; 2]>, K>;

/// A spatial index over line segments, each tagged with a key. Answers "which segment is nearest
/// to this point?"
pub struct FindClosest<K> {
    tree: RTree<Segment<K>>,
}

impl<K> FindClosest<K>
where
    K: Clone + Ord,
{
    pub fn new() -> FindClosest<K> {
        FindClosest { tree: RTree::new() }
    }

    /// Indexes the segment from `pt1` to `pt2`. The endpoints may be equal.
    pub fn add_segment(&mut self, key: K, pt1: Pt2D, pt2: Pt2D) {
        self.tree.insert(GeomWithData::new(
            Line::new([pt1.x(), pt1.y()], [pt2.x(), pt2.y()]),
            key,
        ));
    }

    /// Returns the key of the segment nearest to the query point, along with the distance in
    /// meters. When several segments are equally near, the smallest key wins.
    pub fn closest(&self, query: Pt2D) -> Option<(K, f64)> {
        let query = [query.x(), query.y()];
        let mut iter = self.tree.nearest_neighbor_iter(&query);
        let first = iter.next()?;
        let best_dist = first.geom().distance_2(&query);
        let mut best = &first.data;
        for seg in iter {
            if seg.geom().distance_2(&query) > best_dist {
                break;
            }
            if seg.data < *best {
                best = &seg.data;
            }
        }
        Some((best.clone(), best_dist.sqrt()))
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl<K: Clone + Ord> Default for FindClosest<K> {
    fn default() -> FindClosest<K> {
        FindClosest::new()
    }
}
