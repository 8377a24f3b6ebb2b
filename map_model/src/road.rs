use std::fmt;

use serde::{Deserialize, Serialize};

use geom::Duration;

use crate::IntersectionID;

/// A one-way road between two intersections. A two-way street is two of these.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DirectedRoad {
    pub src_i: IntersectionID,
    pub dst_i: IntersectionID,
}

impl fmt::Display for DirectedRoad {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DirectedRoad({} -> {})", self.src_i.0, self.dst_i.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub src_i: IntersectionID,
    pub dst_i: IntersectionID,
    pub travel_time: Duration,
}

impl Road {
    pub fn id(&self) -> DirectedRoad {
        DirectedRoad {
            src_i: self.src_i,
            dst_i: self.dst_i,
        }
    }
}

/// Somewhere along a road, measured by how long it takes to drive there from the road's start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationOnRoad {
    pub road: DirectedRoad,
    pub travel_time_from_start: Duration,
}

impl LocationOnRoad {
    pub fn new(road: DirectedRoad, travel_time_from_start: Duration) -> LocationOnRoad {
        LocationOnRoad {
            road,
            travel_time_from_start,
        }
    }

    /// The intersection a vehicle here will reach next.
    pub fn upcoming_intersection(&self) -> IntersectionID {
        self.road.dst_i
    }
}

impl fmt::Display for LocationOnRoad {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at {}", self.road, self.travel_time_from_start)
    }
}
