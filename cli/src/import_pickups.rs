use std::io::Read;

use anyhow::{Context, Result};
use serde::Deserialize;

use abstutil::{prettyprint_usize, Timer};
use geom::LonLat;
use trip_model::PickupEvent;

/// Reads historical pickups from CSV files with a `timestamp,longitude,latitude` header. The
/// result is sorted by time.
pub fn read_pickups(paths: &[String], timer: &mut Timer) -> Result<Vec<PickupEvent>> {
    let mut events = Vec::new();
    timer.start_iter("read pickups", paths.len());
    for path in paths {
        timer.next();
        let before = events.len();
        let file = fs_err::File::open(path)?;
        let skipped =
            parse_pickups(file, &mut events).with_context(|| format!("reading {}", path))?;
        timer.note(format!(
            "{} pickups from {}",
            prettyprint_usize(events.len() - before),
            path
        ));
        if skipped > 0 {
            timer.warn(format!(
                "Skipped {} pickups in {} without a real position",
                prettyprint_usize(skipped),
                path
            ));
        }
    }
    events.sort_by_key(|ev| ev.time);
    Ok(events)
}

#[derive(Deserialize)]
struct Record {
    timestamp: i64,
    longitude: f64,
    latitude: f64,
}

/// Returns the number of rows skipped because a coordinate is NaN or infinite.
fn parse_pickups<R: Read>(reader: R, events: &mut Vec<PickupEvent>) -> Result<usize> {
    let mut skipped = 0;
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        if !rec.longitude.is_finite() || !rec.latitude.is_finite() {
            skipped += 1;
            continue;
        }
        events.push(PickupEvent {
            time: rec.timestamp,
            pos: LonLat::new(rec.longitude, rec.latitude),
        });
    }
    Ok(skipped)
}
