//! Geometry and units for the trip model: projected points, GPS coordinates, durations, convex
//! hulls, and a nearest-segment index.

#[macro_use]
extern crate anyhow;

mod convex_hull;
mod duration;
mod find_closest;
mod gps;
mod pt;

pub use crate::convex_hull::{convex_hull, convex_hull_by_key};
pub use crate::duration::Duration;
pub use crate::find_closest::FindClosest;
pub use crate::gps::{GPSBounds, LonLat};
pub use crate::pt::Pt2D;

/// Reduce the precision of an f64. This helps ensure serialization is idempotent (everything is
/// exactly the same before and after saving/loading). Ideally we'd use some kind of proper
/// fixed-precision type instead of f64.
pub fn trim_f64(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
