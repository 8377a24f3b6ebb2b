use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;

use geom::Duration;
use map_model::IntersectionID;

use crate::generation::PickupCounts;
use crate::{Theta, Trip, TripID};

/// Weights every trip by the pickups in its coverage, normalized per time bin so each bin sums to
/// 1 across all trips. Fails if some bin has no pickups at all.
pub fn weigh_trips(
    trips: &mut [Trip],
    coverage: &BTreeMap<TripID, BTreeSet<IntersectionID>>,
    counts: &PickupCounts,
) -> Result<()> {
    let time_bins = counts.time_bins();
    let num_bins = time_bins.num_bins();

    let mut raw: Vec<Vec<f64>> = Vec::with_capacity(trips.len());
    let mut totals = vec![0.0; num_bins];
    for trip in trips.iter() {
        let covers = match coverage.get(&trip.id()) {
            Some(covers) => covers,
            None => bail!("{} has no coverage", trip.id()),
        };
        let mut per_bin = vec![0.0; num_bins];
        for (bin, weight) in per_bin.iter_mut().enumerate() {
            *weight = covers.iter().map(|i| counts.get(*i, bin) as f64).sum();
            totals[bin] += *weight;
        }
        raw.push(per_bin);
    }

    if !trips.is_empty() {
        if let Some(bin) = totals.iter().position(|total| *total == 0.0) {
            bail!(
                "No trip covers any pickups during bin {} (starting {}s into the week)",
                bin,
                time_bins.bin_start(bin)
            );
        }
    }

    for (trip, per_bin) in trips.iter_mut().zip(raw) {
        for (bin, weight) in per_bin.into_iter().enumerate() {
            trip.set_weight(time_bins.bin_start(bin), weight / totals[bin]);
        }
    }
    Ok(())
}

/// `ln(weight + epsilon)` for every trip and bin. The trips must be sorted by ID.
pub fn initial_theta(trips: &[Trip], counts: &PickupCounts, epsilon: f64) -> Result<Theta> {
    let time_bins = counts.time_bins();
    let mut rows = Vec::with_capacity(time_bins.num_bins());
    for bin in 0..time_bins.num_bins() {
        let start = time_bins.bin_start(bin);
        let mut row = Vec::with_capacity(trips.len());
        for trip in trips {
            let weight = match trip.weights().get(&start) {
                Some(w) => *w,
                None => bail!("{} has no weight for bin {}", trip.id(), bin),
            };
            row.push((weight + epsilon).ln());
        }
        rows.push(row);
    }
    Theta::new(rows)
}

/// Summarizes how long the trips take to drive, just for reporting.
#[derive(Clone, Debug, PartialEq)]
pub struct TripStats {
    pub count: usize,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
    pub std_dev: Duration,
}

impl TripStats {
    pub fn new(trips: &[Trip]) -> Option<TripStats> {
        if trips.is_empty() {
            return None;
        }
        let secs: Vec<f64> = trips
            .iter()
            .map(|t| t.duration().inner_seconds())
            .collect();
        let n = secs.len() as f64;
        let mean = secs.iter().sum::<f64>() / n;
        let variance = secs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        Some(TripStats {
            count: trips.len(),
            mean: Duration::seconds(mean),
            min: Duration::seconds(secs.iter().cloned().fold(f64::INFINITY, f64::min)),
            max: Duration::seconds(secs.iter().cloned().fold(f64::NEG_INFINITY, f64::max)),
            std_dev: Duration::seconds(variance.sqrt()),
        })
    }

    pub fn describe(&self) -> Vec<String> {
        vec![
            format!("{} trips", abstutil::prettyprint_usize(self.count)),
            format!("Average trip duration: {}", self.mean),
            format!("Minimum trip duration: {}", self.min),
            format!("Maximum trip duration: {}", self.max),
            format!("Standard deviation of trip durations: {}", self.std_dev),
        ]
    }
}
