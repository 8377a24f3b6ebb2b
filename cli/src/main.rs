//! Tools for building and inspecting the trips that taxis search along, bundled as a single
//! executable.

#[macro_use]
extern crate log;

mod import_pickups;

use std::sync::Arc;

use anyhow::Result;
use structopt::StructOpt;

use abstutil::{prettyprint_usize, Timer};
use map_model::Map;
use trip_model::{DataFiles, GenerationOptions, ModelConfig, SavedModel, TripsDataModel};

#[derive(StructOpt)]
#[structopt(name = "trips", about = "Builds and samples taxi search trips")]
enum Command {
    /// Builds trips from historical pickups and writes them with their initial theta
    Generate {
        /// The path to a JSON map
        #[structopt(long)]
        map: String,
        /// CSV files with `timestamp,longitude,latitude` columns. Repeat for multiple files.
        #[structopt(long, required = true)]
        pickups: Vec<String>,
        /// The path to write the binary model
        #[structopt(long)]
        output: String,
        #[structopt(flatten)]
        opts: GenerationOptions,
    },
    /// Summarizes a binary model
    Inspect {
        #[structopt()]
        path: String,
    },
    /// Writes the default model configuration, as a starting point for editing
    DefaultConfig {
        #[structopt()]
        output: String,
    },
    /// Samples trips from a model at some time
    Sample {
        /// The path to a JSON map
        #[structopt(long)]
        map: String,
        /// A JSON `ModelConfig`. Without it, the defaults are used.
        #[structopt(long)]
        config: Option<String>,
        /// Use just this model file, ignoring any monthly files from the config
        #[structopt(long)]
        data: Option<String>,
        /// A Unix timestamp in seconds. Zero or less uses the default model.
        #[structopt(long, default_value = "0")]
        time: i64,
        /// How many trips to sample
        #[structopt(long, default_value = "10")]
        count: usize,
    },
}

fn main() -> Result<()> {
    abstutil::logger::setup();

    match Command::from_args() {
        Command::Generate {
            map,
            pickups,
            output,
            opts,
        } => generate(map, pickups, output, opts)?,
        Command::Inspect { path } => inspect(path)?,
        Command::DefaultConfig { output } => {
            ModelConfig::default().save(&output)?;
            info!("Wrote {}", output);
        }
        Command::Sample {
            map,
            config,
            data,
            time,
            count,
        } => sample(map, config, data, time, count)?,
    }
    Ok(())
}

fn generate(
    map: String,
    pickups: Vec<String>,
    output: String,
    opts: GenerationOptions,
) -> Result<()> {
    let mut timer = Timer::new("generate trips");
    timer.start("load map");
    let map = Map::load_json(map)?;
    timer.stop("load map");
    let events = import_pickups::read_pickups(&pickups, &mut timer)?;

    let generated = trip_model::generate(&map, &events, &opts, &mut timer)?;
    generated.to_saved()?.save(&output)?;
    timer.done();
    info!(
        "Wrote {} trips to {}",
        prettyprint_usize(generated.trips.len()),
        output
    );
    Ok(())
}

fn inspect(path: String) -> Result<()> {
    let model = SavedModel::load(&path)?;
    let time_bins = model.theta.time_bins();
    println!("{}", path);
    println!("  {} trips", prettyprint_usize(model.trips.len()));
    println!(
        "  {} time bins of {}s each",
        time_bins.num_bins(),
        time_bins.bin_size()
    );
    let intersections: usize = model.trips.iter().map(|t| t.intersections.len()).sum();
    println!(
        "  {} intersections across all trips",
        prettyprint_usize(intersections)
    );

    for (bin, row) in model.theta.rows().iter().enumerate() {
        let dist = trip_model::softmax(row);
        let mut best = 0;
        for (idx, p) in dist.iter().enumerate() {
            if *p > dist[best] {
                best = idx;
            }
        }
        if let Some(trip) = model.trips.get(best) {
            println!(
                "  Bin {} (from {}s): most likely {} at {:.4}",
                bin,
                time_bins.bin_start(bin),
                trip.id,
                dist[best]
            );
        }
    }
    Ok(())
}

fn sample(
    map: String,
    config: Option<String>,
    data: Option<String>,
    time: i64,
    count: usize,
) -> Result<()> {
    let mut config = match config {
        Some(path) => ModelConfig::load(path)?,
        None => ModelConfig::default(),
    };
    if let Some(path) = data {
        config.data = DataFiles::single(path);
    }

    let map = Arc::new(Map::load_json(map)?);
    let model = TripsDataModel::from_config(map, &config);
    model.ensure_data_loaded(time);
    let bin = model.assign_time_index(time)?;
    println!("Time {} falls into bin {}", time, bin);
    for _ in 0..count {
        let trip = model.sample_trip(time)?;
        println!(
            "{}: {} intersections, {} around",
            trip.id(),
            trip.len(),
            trip.duration()
        );
    }
    Ok(())
}
