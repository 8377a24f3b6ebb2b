//! Taxis searching for passengers drive around loops called trips. This crate builds those trips
//! from historical pickups, samples them by time of week, and learns which ones lead to shorter
//! searches.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

pub mod agents;
mod config;
pub mod generation;
mod model;
mod serialize;
mod theta;
mod time_bins;
mod training;
mod trip;

pub use crate::agents::{
    Assignment, BanditOptions, BanditState, LearningRate, Policy, SearchAgent, SearchStrategy,
};
pub use crate::config::{DataFiles, ModelConfig, TrainingOptions};
pub use crate::generation::{generate, GeneratedTrips, GenerationOptions, PickupEvent};
pub use crate::model::{Dataset, TripsDataModel};
pub use crate::serialize::{SavedModel, SavedTrip};
pub use crate::theta::{cumulative_distribution, softmax, Theta};
pub use crate::time_bins::{
    DatasetKey, TimeBins, SECONDS_IN_DAY, SECONDS_IN_HOUR, SECONDS_IN_WEEK,
};
pub use crate::training::Trainer;
pub use crate::trip::{Trip, TripID};
