use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use geom::Duration;
use map_model::{LocationOnRoad, RoadNetwork};

use crate::{Trip, TripsDataModel};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BanditOptions {
    /// Start the search clock as soon as a trip is chosen, instead of when the vehicle reaches
    /// the loop.
    #[serde(default)]
    pub with_approach: bool,
    /// Count the drive to the passenger as part of the search.
    #[serde(default = "default_true")]
    pub include_pickup_travel: bool,
}

fn default_true() -> bool {
    true
}

impl Default for BanditOptions {
    fn default() -> BanditOptions {
        BanditOptions {
            with_approach: false,
            include_pickup_travel: true,
        }
    }
}

/// The step size for every learning agent in a run. Clones share the same value, so the training
/// driver can decay it between epochs.
#[derive(Clone, Debug)]
pub struct LearningRate(Arc<AtomicU64>);

impl LearningRate {
    pub const DEFAULT: f64 = 1e-7;

    pub fn new(alpha: f64) -> LearningRate {
        LearningRate(Arc::new(AtomicU64::new(alpha.to_bits())))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, alpha: f64) {
        self.0.store(alpha.to_bits(), Ordering::SeqCst);
    }

    /// Multiplies the rate by some factor, returning the new rate.
    pub fn decay(&self, factor: f64) -> f64 {
        let mut current = self.0.load(Ordering::SeqCst);
        loop {
            let next = (f64::from_bits(current) * factor).to_bits();
            match self
                .0
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return f64::from_bits(next),
                Err(actual) => {
                    current = actual;
                }
            }
        }
    }
}

impl Default for LearningRate {
    fn default() -> LearningRate {
        LearningRate::new(LearningRate::DEFAULT)
    }
}

/// What a learning agent remembers between callbacks.
///
/// With no trip, the agent is idle. With a trip and a start time, it's searching. Being assigned
/// a passenger ends the search, feeds its duration back into the model, and returns to idle.
#[derive(Clone, Debug)]
pub struct BanditState {
    pub(crate) trip: Option<Arc<Trip>>,
    pub(crate) search_start: Option<i64>,
    pub options: BanditOptions,
    pub learning_rate: LearningRate,
}

impl BanditState {
    pub fn new(options: BanditOptions, learning_rate: LearningRate) -> BanditState {
        BanditState {
            trip: None,
            search_start: None,
            options,
            learning_rate,
        }
    }

    pub fn trip(&self) -> Option<&Arc<Trip>> {
        self.trip.as_ref()
    }

    pub fn search_start(&self) -> Option<i64> {
        self.search_start
    }

    pub fn is_searching(&self) -> bool {
        self.trip.is_some() && self.search_start.is_some()
    }

    /// The trip to follow, sampling a new one if there isn't one yet.
    pub(crate) fn current_trip<M: RoadNetwork>(
        &mut self,
        model: &TripsDataModel<M>,
        now: i64,
    ) -> Result<Arc<Trip>> {
        if let Some(ref trip) = self.trip {
            return Ok(trip.clone());
        }
        let trip = model.sample_trip(now)?;
        self.trip = Some(trip.clone());
        Ok(trip)
    }

    /// Forgets the trip, along with any search around it.
    pub(crate) fn abandon_trip(&mut self) {
        self.trip = None;
        self.search_start = None;
    }

    pub(crate) fn start_search(&mut self, now: i64) {
        if self.search_start.is_none() {
            self.search_start = Some(now);
        }
    }

    /// Ends the current search, if there is one, and learns from how long it took. The state is
    /// reset even if the update fails.
    pub(crate) fn finish_search<M: RoadNetwork>(
        &mut self,
        model: &TripsDataModel<M>,
        loc: &LocationOnRoad,
        now: i64,
        pickup: &LocationOnRoad,
    ) -> Result<Option<f64>> {
        let trip = self.trip.take();
        let (trip, search_start) = match (trip, self.search_start.take()) {
            (Some(trip), Some(start)) => (trip, start),
            _ => return Ok(None),
        };

        let mut end = Duration::seconds(now as f64);
        if self.options.include_pickup_travel {
            match model.map().travel_time_between_locations(loc, pickup) {
                Some(dt) => {
                    end += dt;
                }
                None => bail!("Can't reach the pickup at {} from {}", pickup, loc),
            }
        }
        let reward = end.inner_seconds() - search_start as f64;
        model.apply_reward(search_start, trip.id(), reward, self.learning_rate.get())?;
        Ok(Some(reward))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_rate() {
        let rate = LearningRate::default();
        let other = rate.clone();
        assert_eq!(rate.get(), 1e-7);

        other.set(0.5);
        assert_eq!(rate.get(), 0.5);
        assert_eq!(rate.decay(0.5), 0.25);
        assert_eq!(other.get(), 0.25);
    }

    #[test]
    fn options_from_json() {
        let opts: BanditOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, BanditOptions::default());
        assert!(opts.include_pickup_travel);
        assert!(!opts.with_approach);
    }
}
