//! The road network that taxis drive around in. Everything else in the workspace only talks to it
//! through the `RoadNetwork` trait; `Map` is an in-memory implementation backed by petgraph.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod intersection;
mod map;
mod road;

pub use crate::intersection::{Intersection, IntersectionID};
pub use crate::map::{Map, RawIntersection, RawMap};
pub use crate::road::{DirectedRoad, LocationOnRoad, Road};

use geom::{Duration, LonLat, Pt2D};

/// What the trip model needs from a road network.
pub trait RoadNetwork {
    fn intersection(&self, id: IntersectionID) -> Option<&Intersection>;

    /// Every intersection, in ascending ID order.
    fn all_intersection_ids(&self) -> Vec<IntersectionID>;

    /// Outgoing neighbors and the travel time of the road to each, in the order the roads were
    /// added.
    fn neighbors(&self, id: IntersectionID) -> Vec<(IntersectionID, Duration)>;

    /// The fastest path, including both endpoints. A path from an intersection to itself is just
    /// that intersection.
    fn shortest_path(&self, from: IntersectionID, to: IntersectionID)
        -> Option<Vec<IntersectionID>>;

    /// The travel time along the fastest path.
    fn travel_time(&self, from: IntersectionID, to: IntersectionID) -> Option<Duration>;

    fn travel_time_between_locations(
        &self,
        from: &LocationOnRoad,
        to: &LocationOnRoad,
    ) -> Option<Duration>;

    /// The road nearest to some GPS coordinate, if the network has any roads.
    fn nearest_road(&self, gps: LonLat) -> Option<DirectedRoad>;

    /// Projects a GPS coordinate into the same plane as every `Intersection::point`.
    fn project(&self, gps: LonLat) -> Pt2D;
}
