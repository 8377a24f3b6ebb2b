//! Utilities shared by the trip model crates:
//!
//! - Timer (a mix of logging and profiling for long-running phases)
//! - PriorityQueueItem for Dijkstra-style searches
//! - JSON IO helpers for configuration files
//! - Logger setup and pretty-printing helpers

#[macro_use]
extern crate log;

mod io;
pub mod logger;
mod priority_queue;
mod time;
mod utils;

pub use crate::io::{read_json, write_json};
pub use crate::priority_queue::PriorityQueueItem;
pub use crate::time::{elapsed_seconds, Timer};
pub use crate::utils::{prettyprint_time, prettyprint_usize};

const PROGRESS_FREQUENCY_SECONDS: f64 = 0.2;
