//! Taxis searching for passengers by driving around sampled trips. The simulator drives these
//! through `SearchStrategy`.

mod bandit;

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;

use map_model::{IntersectionID, LocationOnRoad, RoadNetwork};

pub use self::bandit::{BanditOptions, BanditState, LearningRate};
use crate::{Trip, TripsDataModel};

/// A passenger handed to a searching vehicle.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub resource_id: i64,
    pub pickup: LocationOnRoad,
    pub dropoff: LocationOnRoad,
}

/// The callbacks a simulator makes into an empty vehicle. Times are Unix timestamps in seconds.
pub trait SearchStrategy {
    /// Throws away the queued route and plans a new one from the current location.
    fn plan_search_route(&mut self, loc: &LocationOnRoad, now: i64) -> Result<()>;

    /// Where to go next. Plans a new route when the current one runs out. `None` means no route
    /// could be planned.
    fn next_intersection(&mut self, loc: &LocationOnRoad, now: i64) -> Option<IntersectionID>;

    /// The vehicle picked up a passenger, so the search is over.
    fn assigned_to(&mut self, loc: &LocationOnRoad, now: i64, assignment: &Assignment);
}

#[derive(Clone, Debug)]
pub enum Policy {
    /// Every route follows a freshly sampled trip.
    Sampling,
    /// Stick with one trip until assigned, then learn from how long the search took.
    Learning(BanditState),
}

pub struct SearchAgent<M> {
    id: i64,
    model: Arc<TripsDataModel<M>>,
    route: VecDeque<IntersectionID>,
    policy: Policy,
}

impl<M: RoadNetwork> SearchAgent<M> {
    pub fn sampling(id: i64, model: Arc<TripsDataModel<M>>) -> SearchAgent<M> {
        SearchAgent {
            id,
            model,
            route: VecDeque::new(),
            policy: Policy::Sampling,
        }
    }

    pub fn learning(
        id: i64,
        model: Arc<TripsDataModel<M>>,
        options: BanditOptions,
        learning_rate: LearningRate,
    ) -> SearchAgent<M> {
        SearchAgent {
            id,
            model,
            route: VecDeque::new(),
            policy: Policy::Learning(BanditState::new(options, learning_rate)),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn route(&self) -> &VecDeque<IntersectionID> {
        &self.route
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }
}

impl<M: RoadNetwork> SearchStrategy for SearchAgent<M> {
    fn plan_search_route(&mut self, loc: &LocationOnRoad, now: i64) -> Result<()> {
        self.route.clear();
        match self.policy {
            Policy::Sampling => {
                let trip = self.model.sample_trip(now)?;
                let (approach, around) = join_trip(&**self.model.map(), &trip, loc)?;
                debug!(
                    "Agent {} follows {} after {} intersections",
                    self.id,
                    trip.id(),
                    approach.len()
                );
                self.route.extend(approach);
                self.route.extend(around);
            }
            Policy::Learning(ref mut state) => {
                let trip = state.current_trip(&self.model, now)?;
                let (approach, around) = match join_trip(&**self.model.map(), &trip, loc) {
                    Ok(pair) => pair,
                    Err(err) => {
                        // Sample something else next time
                        state.abandon_trip();
                        return Err(err);
                    }
                };
                let on_trip = approach.is_empty();
                self.route.extend(approach);
                // Without the approach, the search only starts once the vehicle reaches the loop
                if on_trip || state.options.with_approach {
                    self.route.extend(around);
                    state.start_search(now);
                    debug!("Agent {} is searching around {} since {}", self.id, trip.id(), now);
                }
            }
        }
        Ok(())
    }

    fn next_intersection(&mut self, loc: &LocationOnRoad, now: i64) -> Option<IntersectionID> {
        if self.route.is_empty() {
            if let Err(err) = self.plan_search_route(loc, now) {
                warn!("Agent {} couldn't plan a route from {}: {}", self.id, loc, err);
                return None;
            }
        }
        self.route.pop_front()
    }

    fn assigned_to(&mut self, loc: &LocationOnRoad, now: i64, assignment: &Assignment) {
        self.route.clear();
        debug!(
            "Agent {} at {} assigned to resource {} at time {}, picking up at {} and dropping off at {}",
            self.id, loc, assignment.resource_id, now, assignment.pickup, assignment.dropoff
        );

        if let Policy::Learning(ref mut state) = self.policy {
            match state.finish_search(&self.model, loc, now, &assignment.pickup) {
                Ok(Some(reward)) => {
                    debug!("Agent {} searched for {}s", self.id, reward);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("Agent {} couldn't learn from its search: {}", self.id, err);
                }
            }
        }
    }
}

/// How a vehicle about to reach `loc`'s upcoming intersection joins a trip. Returns the path to
/// the nearest point of the loop (empty if already there), then the rest of the loop starting
/// just after that point and wrapping around.
fn join_trip<M: RoadNetwork + ?Sized>(
    map: &M,
    trip: &Trip,
    loc: &LocationOnRoad,
) -> Result<(Vec<IntersectionID>, Vec<IntersectionID>)> {
    let current = loc.upcoming_intersection();
    let pt = match map.intersection(current) {
        Some(i) => i.point,
        None => bail!("{} isn't on the map", current),
    };
    let entry = trip.find_closest(pt);

    let mut approach = Vec::new();
    if current != entry {
        match map.shortest_path(current, entry) {
            // The path starts where the vehicle already is
            Some(path) => approach.extend(path.into_iter().skip(1)),
            None => bail!("Can't reach {} from {}", trip.id(), current),
        }
    }

    let mut ids = trip.closed_intersections();
    ids.pop();
    let cut = match ids.iter().position(|i| *i == entry) {
        Some(idx) => idx,
        None => bail!("{} doesn't pass through {}", trip.id(), entry),
    };
    let mut around = ids.split_off(cut + 1);
    ids.truncate(cut);
    around.extend(ids);
    Ok((approach, around))
}
