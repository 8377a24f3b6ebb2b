use std::fmt;

use serde::{Deserialize, Serialize};

use geom::{LonLat, Pt2D};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntersectionID(pub i64);

impl fmt::Display for IntersectionID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Intersection #{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intersection {
    pub id: IntersectionID,
    /// Projected into the map's plane, in meters
    pub point: Pt2D,
    /// Only known for maps imported from GPS coordinates
    pub gps: Option<LonLat>,
}

impl Intersection {
    pub fn new(id: IntersectionID, point: Pt2D) -> Intersection {
        Intersection {
            id,
            point,
            gps: None,
        }
    }
}
