use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{GPSBounds, LonLat};

/// This represents world-space in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pt2D {
    x: f64,
    y: f64,
}

impl Pt2D {
    pub fn new(x: f64, y: f64) -> Pt2D {
        if !x.is_finite() || !y.is_finite() {
            panic!("Bad Pt2D {}, {}", x, y);
        }

        Pt2D { x, y }
    }

    /// Projects a GPS coordinate into world-space, relative to the southwest corner of the bounds.
    /// Points outside the bounds get negative or oversized coordinates, but are still valid.
    pub fn from_gps(gps: LonLat, b: &GPSBounds) -> Pt2D {
        let base = LonLat::new(b.min_lon, b.min_lat);
        let mut dx = base.gps_dist_meters(LonLat::new(gps.longitude, base.latitude));
        let mut dy = base.gps_dist_meters(LonLat::new(base.longitude, gps.latitude));
        if gps.longitude < base.longitude {
            dx = -dx;
        }
        if gps.latitude < base.latitude {
            dy = -dy;
        }
        Pt2D::new(dx, dy)
    }

    pub fn x(self) -> f64 {
        self.x
    }

    pub fn y(self) -> f64 {
        self.y
    }

    /// Euclidean distance in meters.
    pub fn dist_to(self, to: Pt2D) -> f64 {
        ((self.x - to.x).powi(2) + (self.y - to.y).powi(2)).sqrt()
    }

    /// The z component of the cross product of (b - a) and (c - a). Positive means a, b, c make a
    /// counter-clockwise turn, zero means they're collinear.
    pub fn cross(a: Pt2D, b: Pt2D, c: Pt2D) -> f64 {
        (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
    }
}

impl fmt::Display for Pt2D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pt2D({0}, {1})", self.x(), self.y())
    }
}
