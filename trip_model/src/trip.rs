use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use geom::{Duration, FindClosest, Pt2D};
use map_model::{IntersectionID, RoadNetwork};

/// Trips are named after the intersection their isochrone was seeded from, so the ID is stable
/// when trips are regenerated.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TripID(pub i64);

impl fmt::Display for TripID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Trip #{}", self.0)
    }
}

impl From<IntersectionID> for TripID {
    fn from(i: IntersectionID) -> TripID {
        TripID(i.0)
    }
}

/// A loop through the road network that a taxi drives around while searching for passengers.
pub struct Trip {
    id: TripID,
    /// The loop, without repeating the first intersection at the end. The last intersection
    /// connects back to the first.
    intersections: Vec<IntersectionID>,
    duration: Duration,
    /// Each edge of the closed loop is keyed by the index of its first intersection
    closest: FindClosest<usize>,
    /// Positions of the closed loop
    points: Vec<Pt2D>,
    /// Time-bin start (seconds into the week) to normalized pickup weight. Only filled out while
    /// generating trips.
    weights: BTreeMap<u64, f64>,
}

impl Trip {
    /// Stitches together the fastest paths between consecutive hull intersections, forming a
    /// closed loop. Fails if some part of the loop is unreachable.
    pub fn new<M: RoadNetwork + ?Sized>(
        id: TripID,
        hull: &[IntersectionID],
        map: &M,
    ) -> Result<Trip> {
        if hull.is_empty() {
            bail!("{} has an empty hull", id);
        }
        let mut closed = hull.to_vec();
        if closed[0] != closed[closed.len() - 1] {
            closed.push(closed[0]);
        }

        let num_segments = closed.len() - 1;
        let mut intersections = Vec::new();
        for (idx, pair) in closed.windows(2).enumerate() {
            let path = match map.shortest_path(pair[0], pair[1]) {
                Some(path) => path,
                None => bail!("{} can't route from {} to {}", id, pair[0], pair[1]),
            };
            if idx == 0 {
                intersections.extend(path);
            } else if idx == num_segments - 1 {
                // The loop already starts with the end of this last segment
                if path.len() > 2 {
                    intersections.extend_from_slice(&path[1..path.len() - 1]);
                }
            } else {
                intersections.extend(path.into_iter().skip(1));
            }
        }
        // A hull of one intersection has no segments at all
        if intersections.is_empty() {
            intersections.push(closed[0]);
        }

        Trip::from_intersections(id, intersections, map)
    }

    /// Restores a trip from its intersections, without any routing. Used when loading saved
    /// models.
    pub fn from_intersections<M: RoadNetwork + ?Sized>(
        id: TripID,
        intersections: Vec<IntersectionID>,
        map: &M,
    ) -> Result<Trip> {
        if intersections.is_empty() {
            bail!("{} has no intersections", id);
        }

        let mut trip = Trip {
            id,
            intersections,
            duration: Duration::ZERO,
            closest: FindClosest::new(),
            points: Vec::new(),
            weights: BTreeMap::new(),
        };

        let closed = trip.closed_intersections();
        for i in &closed {
            trip.points.push(lookup_pt(map, *i, id)?);
        }
        let mut duration = Duration::ZERO;
        for (idx, pair) in closed.windows(2).enumerate() {
            trip.closest
                .add_segment(idx, trip.points[idx], trip.points[idx + 1]);

            let is_closing_edge = idx == closed.len() - 2;
            if is_closing_edge && trip.is_closed() {
                continue;
            }
            match map.travel_time(pair[0], pair[1]) {
                Some(dt) => {
                    duration += dt;
                }
                None => bail!("{} can't travel from {} to {}", id, pair[0], pair[1]),
            }
        }
        trip.duration = duration;
        Ok(trip)
    }

    pub fn id(&self) -> TripID {
        self.id
    }

    pub fn intersections(&self) -> &[IntersectionID] {
        &self.intersections
    }

    /// The loop with the first intersection repeated at the end.
    pub fn closed_intersections(&self) -> Vec<IntersectionID> {
        let mut closed = self.intersections.clone();
        if !self.is_closed() {
            closed.push(self.intersections[0]);
        }
        closed
    }

    /// True if the stored intersections already end where they start.
    fn is_closed(&self) -> bool {
        self.intersections.len() >= 2
            && self.intersections[0] == self.intersections[self.intersections.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.intersections.len()
    }

    /// A single intersection isn't really a loop.
    pub fn is_degenerate(&self) -> bool {
        self.intersections.len() < 2
    }

    /// How long it takes to drive around the whole loop once.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Where should a vehicle at `pt` join the loop? Finds the nearest edge, then whichever end
    /// of it is closer, preferring the start.
    pub fn find_closest(&self, pt: Pt2D) -> IntersectionID {
        match self.closest.closest(pt) {
            Some((idx, _)) => {
                if pt.dist_to(self.points[idx + 1]) < pt.dist_to(self.points[idx]) {
                    self.intersections[(idx + 1) % self.intersections.len()]
                } else {
                    self.intersections[idx]
                }
            }
            None => self.intersections[0],
        }
    }

    /// The first position of an intersection in the loop
    pub fn position(&self, i: IntersectionID) -> Option<usize> {
        self.intersections.iter().position(|x| *x == i)
    }

    pub fn weights(&self) -> &BTreeMap<u64, f64> {
        &self.weights
    }

    pub fn set_weight(&mut self, bin_start: u64, weight: f64) {
        self.weights.insert(bin_start, weight);
    }
}

impl fmt::Debug for Trip {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Trip")
            .field("id", &self.id)
            .field("intersections", &self.intersections)
            .field("duration", &self.duration)
            .finish()
    }
}

fn lookup_pt<M: RoadNetwork + ?Sized>(map: &M, i: IntersectionID, trip: TripID) -> Result<Pt2D> {
    match map.intersection(i) {
        Some(i) => Ok(i.point),
        None => bail!("{} passes through unknown {}", trip, i),
    }
}

#[cfg(test)]
mod tests {
    use map_model::{Intersection, Map, Road};

    use super::*;

    fn ids(raw: &[i64]) -> Vec<IntersectionID> {
        raw.iter().map(|id| IntersectionID(*id)).collect()
    }

    fn two_way(roads: &mut Vec<Road>, a: i64, b: i64, secs: f64) {
        for (src, dst) in [(a, b), (b, a)] {
            roads.push(Road {
                src_i: IntersectionID(src),
                dst_i: IntersectionID(dst),
                travel_time: Duration::seconds(secs),
            });
        }
    }

    // A(0,0), B(4,0), C(2,3), all connected directly with 1s roads
    fn triangle() -> Map {
        let mut roads = Vec::new();
        two_way(&mut roads, 1, 2, 1.0);
        two_way(&mut roads, 2, 3, 1.0);
        two_way(&mut roads, 3, 1, 1.0);
        Map::new(
            vec![
                Intersection::new(IntersectionID(1), Pt2D::new(0.0, 0.0)),
                Intersection::new(IntersectionID(2), Pt2D::new(4.0, 0.0)),
                Intersection::new(IntersectionID(3), Pt2D::new(2.0, 3.0)),
            ],
            roads,
        )
        .unwrap()
    }

    // 1 - 2 - 3 along the bottom, 6 - 5 - 4 along the top, with 10s roads everywhere
    //
    // 6 - 5 - 4
    // |   |   |
    // 1 - 2 - 3
    fn ladder() -> Map {
        let mut intersections = Vec::new();
        for (id, x, y) in [
            (1, 0.0, 0.0),
            (2, 100.0, 0.0),
            (3, 200.0, 0.0),
            (4, 200.0, 100.0),
            (5, 100.0, 100.0),
            (6, 0.0, 100.0),
        ] {
            intersections.push(Intersection::new(IntersectionID(id), Pt2D::new(x, y)));
        }
        let mut roads = Vec::new();
        for (a, b) in [(1, 2), (2, 3), (3, 4), (4, 5), (5, 6), (6, 1), (2, 5)] {
            two_way(&mut roads, a, b, 10.0);
        }
        Map::new(intersections, roads).unwrap()
    }

    #[test]
    fn triangle_loop() {
        let map = triangle();
        let trip = Trip::new(TripID(1), &ids(&[1, 2, 3]), &map).unwrap();
        assert_eq!(trip.intersections(), ids(&[1, 2, 3]).as_slice());
        assert_eq!(trip.closed_intersections(), ids(&[1, 2, 3, 1]));
        assert_eq!(trip.duration(), Duration::seconds(3.0));

        // Already closed hulls aren't closed twice
        let trip = Trip::new(TripID(1), &ids(&[1, 2, 3, 1]), &map).unwrap();
        assert_eq!(trip.closed_intersections(), ids(&[1, 2, 3, 1]));
        assert_eq!(trip.duration(), Duration::seconds(3.0));
    }

    #[test]
    fn segments_are_stitched_without_duplicates() {
        let map = ladder();
        // The corners of the ladder
        let trip = Trip::new(TripID(1), &ids(&[1, 3, 4, 6]), &map).unwrap();
        assert_eq!(trip.intersections(), ids(&[1, 2, 3, 4, 5, 6]).as_slice());
        assert_eq!(trip.duration(), Duration::seconds(60.0));

        let closed = trip.closed_intersections();
        assert_eq!(closed.first(), closed.last());
        for pair in closed.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn two_point_hull() {
        let map = ladder();
        // There and back again, without repeating 1 at the end
        let trip = Trip::new(TripID(1), &ids(&[1, 3]), &map).unwrap();
        assert_eq!(trip.intersections(), ids(&[1, 2, 3, 2]).as_slice());
        assert_eq!(trip.duration(), Duration::seconds(40.0));
    }

    #[test]
    fn single_intersection_is_degenerate() {
        let map = ladder();
        let trip = Trip::new(TripID(5), &ids(&[5]), &map).unwrap();
        assert_eq!(trip.intersections(), ids(&[5]).as_slice());
        assert!(trip.is_degenerate());
        assert_eq!(trip.duration(), Duration::ZERO);
        assert_eq!(trip.find_closest(Pt2D::new(0.0, 0.0)), IntersectionID(5));

        assert!(Trip::new(TripID(5), &[], &map).is_err());
        assert!(Trip::from_intersections(TripID(5), Vec::new(), &map).is_err());
    }

    #[test]
    fn unknown_intersections() {
        let map = ladder();
        assert!(Trip::new(TripID(1), &ids(&[1, 99]), &map).is_err());
        assert!(Trip::from_intersections(TripID(1), ids(&[1, 99]), &map).is_err());
    }

    #[test]
    fn closest_edge() {
        let map = ladder();
        let trip = Trip::new(TripID(1), &ids(&[1, 3, 4, 6]), &map).unwrap();
        // Just above the 1 -> 2 edge
        assert_eq!(trip.find_closest(Pt2D::new(50.0, 10.0)), IntersectionID(1));
        // Right of the 3 -> 4 edge
        assert_eq!(trip.find_closest(Pt2D::new(250.0, 50.0)), IntersectionID(3));
        // Left of the closing 6 -> 1 edge
        assert_eq!(trip.find_closest(Pt2D::new(-30.0, 50.0)), IntersectionID(6));
        // Closer to the end of the 4 -> 5 edge
        assert_eq!(trip.find_closest(Pt2D::new(110.0, 120.0)), IntersectionID(5));
        // Exactly on an intersection
        assert_eq!(trip.find_closest(Pt2D::new(200.0, 100.0)), IntersectionID(4));
        assert_eq!(trip.position(IntersectionID(4)), Some(3));
        assert_eq!(trip.position(IntersectionID(99)), None);
    }
}
