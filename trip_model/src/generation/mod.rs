//! Builds the whole set of trips offline from historical pickups. Every intersection seeds an
//! isochrone, whose convex hull becomes a loop. Loops covering nothing new are removed, and the
//! rest are weighted by how many pickups happen near them in each time bin.

mod isochrone;
mod minimize;
mod pickups;
mod weights;

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use structopt::StructOpt;

use abstutil::{prettyprint_usize, Timer};
use geom::{convex_hull_by_key, Duration};
use map_model::{IntersectionID, RoadNetwork};

pub use self::isochrone::Isochrone;
pub use self::minimize::find_redundant_trips;
pub use self::pickups::{PickupCounts, PickupEvent};
pub use self::weights::{initial_theta, weigh_trips, TripStats};
use crate::{SavedModel, SavedTrip, Theta, TimeBins, Trip, TripID};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct GenerationOptions {
    /// The width of each time bin, in seconds. Must evenly divide the week.
    #[structopt(long, default_value = "3600")]
    pub bin_size: i64,
    /// Intersections reachable within this time (like "5:00") form the outline of a trip.
    #[structopt(long, default_value = "5:00", parse(try_from_str = Duration::parse))]
    pub hull_radius: Duration,
    /// Pickups at intersections reachable within this time count towards a trip's weight.
    #[structopt(long, default_value = "10:00", parse(try_from_str = Duration::parse))]
    pub coverage_radius: Duration,
    /// Added to every weight before taking the logarithm, so empty bins don't produce -infinity.
    #[structopt(long, default_value = "1e-10")]
    pub theta_epsilon: f64,
}

impl Default for GenerationOptions {
    fn default() -> GenerationOptions {
        GenerationOptions {
            bin_size: 3600,
            hull_radius: Duration::minutes(5),
            coverage_radius: Duration::minutes(10),
            theta_epsilon: 1e-10,
        }
    }
}

/// The result of generation, before it's saved.
pub struct GeneratedTrips {
    /// Sorted by ID, with weights filled out
    pub trips: Vec<Trip>,
    pub coverage: BTreeMap<TripID, BTreeSet<IntersectionID>>,
    pub theta: Theta,
    pub stats: TripStats,
}

impl GeneratedTrips {
    pub fn to_saved(&self) -> Result<SavedModel> {
        SavedModel::new(
            self.trips
                .iter()
                .map(|t| SavedTrip {
                    id: t.id(),
                    intersections: t.intersections().to_vec(),
                })
                .collect(),
            self.theta.clone(),
        )
    }
}

pub fn generate<M: RoadNetwork + ?Sized>(
    map: &M,
    events: &[PickupEvent],
    opts: &GenerationOptions,
    timer: &mut Timer,
) -> Result<GeneratedTrips> {
    let time_bins = TimeBins::new(opts.bin_size)?;
    if opts.hull_radius > opts.coverage_radius {
        bail!(
            "The hull radius {} is bigger than the coverage radius {}",
            opts.hull_radius,
            opts.coverage_radius
        );
    }

    timer.start("count pickups");
    let counts = PickupCounts::new(map, events, time_bins, timer);
    timer.stop("count pickups");

    let (mut trips, mut coverage) = build_trips(map, opts, timer);

    timer.start("minimize trips");
    let redundant = find_redundant_trips(&coverage);
    trips.retain(|t| !redundant.contains(&t.id()));
    coverage.retain(|id, _| !redundant.contains(id));
    timer.note(format!(
        "After removing {} redundant trips, {} are left",
        prettyprint_usize(redundant.len()),
        prettyprint_usize(trips.len())
    ));
    timer.stop("minimize trips");

    let stats = match TripStats::new(&trips) {
        Some(stats) => stats,
        None => bail!("No trips could be built"),
    };

    timer.start("weigh trips");
    trips.sort_by_key(|t| t.id());
    weigh_trips(&mut trips, &coverage, &counts)?;
    let theta = initial_theta(&trips, &counts, opts.theta_epsilon)?;
    timer.stop("weigh trips");

    for line in stats.describe() {
        timer.note(line);
    }

    Ok(GeneratedTrips {
        trips,
        coverage,
        theta,
        stats,
    })
}

fn build_trips<M: RoadNetwork + ?Sized>(
    map: &M,
    opts: &GenerationOptions,
    timer: &mut Timer,
) -> (Vec<Trip>, BTreeMap<TripID, BTreeSet<IntersectionID>>) {
    let mut trips = Vec::new();
    let mut coverage = BTreeMap::new();
    let mut degenerate = 0;
    let mut unroutable = 0;

    let all_intersections = map.all_intersection_ids();
    timer.start_iter("build trips", all_intersections.len());
    for i in all_intersections {
        timer.next();
        let iso = Isochrone::new(map, i, opts.hull_radius, opts.coverage_radius);
        let hull = hull_around(map, &iso.hull);
        if hull.is_empty() {
            degenerate += 1;
            continue;
        }

        let id = TripID::from(i);
        match Trip::new(id, &hull, map) {
            Ok(trip) if trip.is_degenerate() => {
                degenerate += 1;
            }
            Ok(trip) => {
                coverage.insert(id, iso.coverage);
                trips.push(trip);
            }
            Err(err) => {
                debug!("Skipping {}: {}", id, err);
                unroutable += 1;
            }
        }
    }

    if degenerate > 0 {
        info!(
            "Skipped {} trips with fewer than two intersections",
            prettyprint_usize(degenerate)
        );
    }
    if unroutable > 0 {
        timer.warn(format!(
            "Skipped {} trips that couldn't be routed",
            prettyprint_usize(unroutable)
        ));
    }
    (trips, coverage)
}

fn hull_around<M: RoadNetwork + ?Sized>(
    map: &M,
    intersections: &[IntersectionID],
) -> Vec<IntersectionID> {
    let pts = intersections
        .iter()
        .filter_map(|i| map.intersection(*i).map(|x| (*i, x.point)))
        .collect();
    convex_hull_by_key(pts)
        .into_iter()
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use geom::{LonLat, Pt2D};
    use map_model::{Intersection, Map, Road};

    use super::*;

    // Two clusters far apart: 1 - 2 - 3 along the bottom, 4 alone on a two-way road to 3
    fn map() -> Map {
        let mut roads = Vec::new();
        for (a, b, mins) in [(1, 2, 1), (2, 3, 1), (3, 1, 1), (3, 4, 30)] {
            for (src, dst) in [(a, b), (b, a)] {
                roads.push(Road {
                    src_i: IntersectionID(src),
                    dst_i: IntersectionID(dst),
                    travel_time: Duration::minutes(mins),
                });
            }
        }
        Map::new(
            vec![
                Intersection::new(IntersectionID(1), Pt2D::new(0.0, 0.0)),
                Intersection::new(IntersectionID(2), Pt2D::new(400.0, 0.0)),
                Intersection::new(IntersectionID(3), Pt2D::new(200.0, 300.0)),
                Intersection::new(IntersectionID(4), Pt2D::new(5000.0, 5000.0)),
            ],
            roads,
        )
        .unwrap()
    }

    fn pickup(time: i64, x: f64, y: f64) -> PickupEvent {
        PickupEvent {
            time,
            pos: LonLat::new(x, y),
        }
    }

    fn opts() -> GenerationOptions {
        GenerationOptions {
            bin_size: 86400,
            ..Default::default()
        }
    }

    #[test]
    fn weights_per_bin() {
        let map = map();
        let time_bins = TimeBins::new(86400).unwrap();
        let mut events = Vec::new();
        // Every day has one pickup near 1
        for day in 0..7 {
            events.push(pickup(day * 86400, 1.0, 1.0));
        }
        let counts = PickupCounts::new(&map, &events, time_bins, &mut Timer::throwaway());

        let mut trips = vec![
            Trip::new(TripID(1), &[IntersectionID(1), IntersectionID(2)], &map).unwrap(),
            Trip::new(TripID(3), &[IntersectionID(3), IntersectionID(2)], &map).unwrap(),
        ];
        let mut coverage = BTreeMap::new();
        coverage.insert(TripID(1), [IntersectionID(1)].into_iter().collect());
        coverage.insert(
            TripID(3),
            [IntersectionID(1), IntersectionID(3)].into_iter().collect(),
        );
        weigh_trips(&mut trips, &coverage, &counts).unwrap();
        assert_eq!(trips[0].weights()[&0], 0.5);
        assert_eq!(trips[1].weights()[&(6 * 86400)], 0.5);

        let theta = initial_theta(&trips, &counts, 1e-10).unwrap();
        assert_eq!(theta.num_rows(), 7);
        assert!((theta.row(3)[0] - (0.5_f64 + 1e-10).ln()).abs() < 1e-12);
    }

    #[test]
    fn empty_bins_are_an_error() {
        let map = map();
        // Nothing happens on the last day
        let events: Vec<PickupEvent> = (0..6).map(|day| pickup(day * 86400, 1.0, 1.0)).collect();
        let err = generate(&map, &events, &opts(), &mut Timer::throwaway())
            .err()
            .unwrap();
        assert!(err.to_string().contains("bin 6"));
    }

    #[test]
    fn bad_options() {
        let map = map();
        let mut bad = opts();
        bad.bin_size = 7;
        assert!(generate(&map, &[], &bad, &mut Timer::throwaway()).is_err());

        let mut bad = opts();
        bad.hull_radius = Duration::minutes(20);
        assert!(generate(&map, &[], &bad, &mut Timer::throwaway()).is_err());
    }

    #[test]
    fn end_to_end() {
        let map = map();
        let events: Vec<PickupEvent> = (0..7)
            .flat_map(|day| {
                vec![
                    pickup(day * 86400, 1.0, 1.0),
                    pickup(day * 86400 + 100, 4999.0, 4999.0),
                ]
            })
            .collect();
        let generated = generate(&map, &events, &opts(), &mut Timer::throwaway()).unwrap();

        // The triangle's three trips are identical, so only one survives. 4 can't reach anything
        // within 5 minutes, so it's degenerate.
        let ids: Vec<TripID> = generated.trips.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![TripID(1)]);
        let trip = &generated.trips[0];
        assert_eq!(
            trip.closed_intersections(),
            vec![
                IntersectionID(1),
                IntersectionID(2),
                IntersectionID(3),
                IntersectionID(1)
            ]
        );
        assert_eq!(trip.duration(), Duration::minutes(3));
        assert_eq!(generated.stats.count, 1);

        // One trip takes all of the weight
        for row in generated.theta.rows() {
            assert_eq!(row.len(), 1);
            assert!(row[0].abs() < 1e-9);
        }

        let saved = generated.to_saved().unwrap();
        assert_eq!(saved.trips[0].intersections.len(), 3);
    }
}
