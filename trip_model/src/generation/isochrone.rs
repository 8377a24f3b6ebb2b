use std::collections::{BTreeSet, BinaryHeap, HashSet};

use abstutil::PriorityQueueItem;
use geom::Duration;
use map_model::{IntersectionID, RoadNetwork};

/// Everything reachable from one intersection within a time limit.
#[derive(Clone, Debug, PartialEq)]
pub struct Isochrone {
    pub start: IntersectionID,
    /// Reachable within the hull radius, in the order they were reached
    pub hull: Vec<IntersectionID>,
    /// Reachable within the coverage radius. Always includes the start.
    pub coverage: BTreeSet<IntersectionID>,
}

impl Isochrone {
    /// Dijkstra's algorithm from `start`, never queueing anything at or past the coverage radius.
    /// Ties are explored in the order the map lists neighbors.
    pub fn new<M: RoadNetwork + ?Sized>(
        map: &M,
        start: IntersectionID,
        hull_radius: Duration,
        coverage_radius: Duration,
    ) -> Isochrone {
        let mut hull = Vec::new();
        let mut coverage = BTreeSet::new();
        let mut visited: HashSet<IntersectionID> = HashSet::new();

        let mut queue: BinaryHeap<PriorityQueueItem<Duration, IntersectionID>> = BinaryHeap::new();
        let mut pushed = 0;
        queue.push(PriorityQueueItem::new(Duration::ZERO, pushed, start));

        while let Some(current) = queue.pop() {
            if !visited.insert(current.value) {
                continue;
            }
            if current.cost < hull_radius {
                hull.push(current.value);
            }
            if current.cost < coverage_radius {
                coverage.insert(current.value);
            }

            for (next, dt) in map.neighbors(current.value) {
                if visited.contains(&next) {
                    continue;
                }
                let total = current.cost + dt;
                if total < coverage_radius {
                    pushed += 1;
                    queue.push(PriorityQueueItem::new(total, pushed, next));
                }
            }
        }

        Isochrone {
            start,
            hull,
            coverage,
        }
    }
}
