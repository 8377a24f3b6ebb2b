use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use abstutil::{prettyprint_usize, Timer};
use geom::LonLat;
use map_model::{IntersectionID, RoadNetwork};

use crate::TimeBins;

/// Somebody got picked up by a taxi, at some point in history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PickupEvent {
    /// Unix timestamp, in seconds
    pub time: i64,
    pub pos: LonLat,
}

/// How many pickups happened near each intersection, per time bin.
pub struct PickupCounts {
    time_bins: TimeBins,
    counts: BTreeMap<IntersectionID, Vec<usize>>,
    /// Events that couldn't be matched to any road
    pub skipped: usize,
}

impl PickupCounts {
    /// Snaps every event to the nearer end of the nearest road.
    pub fn new<M: RoadNetwork + ?Sized>(
        map: &M,
        events: &[PickupEvent],
        time_bins: TimeBins,
        timer: &mut Timer,
    ) -> PickupCounts {
        let mut counts = PickupCounts {
            time_bins,
            counts: BTreeMap::new(),
            skipped: 0,
        };

        timer.start_iter("count pickups", events.len());
        for ev in events {
            timer.next();
            if !ev.pos.longitude.is_finite() || !ev.pos.latitude.is_finite() {
                counts.skipped += 1;
                continue;
            }
            let road = match map.nearest_road(ev.pos) {
                Some(road) => road,
                None => {
                    counts.skipped += 1;
                    continue;
                }
            };
            let (src, dst) = match (map.intersection(road.src_i), map.intersection(road.dst_i)) {
                (Some(src), Some(dst)) => (src, dst),
                _ => {
                    counts.skipped += 1;
                    continue;
                }
            };
            let pt = map.project(ev.pos);
            let closest = if src.point.dist_to(pt) < dst.point.dist_to(pt) {
                src.id
            } else {
                dst.id
            };
            counts.add(closest, ev.time);
        }

        if counts.skipped > 0 {
            warn!(
                "{} of {} pickups have no real position or aren't near any road",
                prettyprint_usize(counts.skipped),
                prettyprint_usize(events.len())
            );
        }
        counts
    }

    fn add(&mut self, i: IntersectionID, time: i64) {
        let num_bins = self.time_bins.num_bins();
        let bin = self.time_bins.index(time);
        self.counts.entry(i).or_insert_with(|| vec![0; num_bins])[bin] += 1;
    }

    /// The number of pickups at one intersection during one bin
    pub fn get(&self, i: IntersectionID, bin: usize) -> usize {
        self.counts.get(&i).map(|per_bin| per_bin[bin]).unwrap_or(0)
    }

    pub fn time_bins(&self) -> TimeBins {
        self.time_bins
    }

    pub fn total(&self) -> usize {
        self.counts.values().flatten().sum()
    }
}
