//! The binary format that persists trips and theta between runs. Everything is big-endian:
//!
//! ```text
//! i32 number of trips
//! for each trip: i64 trip ID, i32 number of intersections, that many i64 intersection IDs
//! i32 number of theta rows, i32 number of theta columns
//! rows * columns f64, row-major
//! ```

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use map_model::IntersectionID;

use crate::{Theta, TimeBins, TripID};

#[derive(Clone, Debug, PartialEq)]
pub struct SavedTrip {
    pub id: TripID,
    pub intersections: Vec<IntersectionID>,
}

/// Trips and theta, without anything derived from the map.
#[derive(Clone, Debug, PartialEq)]
pub struct SavedModel {
    /// Sorted by ID, lining up with theta's columns
    pub trips: Vec<SavedTrip>,
    pub theta: Theta,
}

impl SavedModel {
    /// `theta`'s columns line up with `trips` as given. Both are reordered by trip ID.
    pub fn new(trips: Vec<SavedTrip>, theta: Theta) -> Result<SavedModel> {
        SavedModel { trips, theta }.into_sorted()
    }

    /// Sorts the trips by ID, moving theta's columns along with them. Duplicate IDs are an error.
    pub fn into_sorted(self) -> Result<SavedModel> {
        let SavedModel { trips, theta } = self;
        if theta.num_cols() != trips.len() {
            bail!(
                "Theta has {} columns, but there are {} trips",
                theta.num_cols(),
                trips.len()
            );
        }

        let mut columns: Vec<(usize, SavedTrip)> = trips.into_iter().enumerate().collect();
        columns.sort_by_key(|(_, t)| t.id);
        for pair in columns.windows(2) {
            if pair[0].1.id == pair[1].1.id {
                bail!("{} is defined twice", pair[0].1.id);
            }
        }

        let rows = theta
            .into_rows()
            .into_iter()
            .map(|row| columns.iter().map(|(idx, _)| row[*idx]).collect())
            .collect();
        Ok(SavedModel {
            trips: columns.into_iter().map(|(_, t)| t).collect(),
            theta: Theta::new(rows)?,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_i32::<BigEndian>(to_i32(self.trips.len(), "trips")?)?;
        for trip in &self.trips {
            w.write_i64::<BigEndian>(trip.id.0)?;
            w.write_i32::<BigEndian>(to_i32(trip.intersections.len(), "intersections")?)?;
            for i in &trip.intersections {
                w.write_i64::<BigEndian>(i.0)?;
            }
        }

        w.write_i32::<BigEndian>(to_i32(self.theta.num_rows(), "theta rows")?)?;
        w.write_i32::<BigEndian>(to_i32(self.theta.num_cols(), "theta columns")?)?;
        for row in self.theta.rows() {
            for x in row {
                w.write_f64::<BigEndian>(*x)?;
            }
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<SavedModel> {
        let num_trips = read_count(r, "trips")?;
        let mut trips = Vec::new();
        for _ in 0..num_trips {
            let id = TripID(r.read_i64::<BigEndian>()?);
            let num_intersections = read_count(r, "intersections")?;
            let mut intersections = Vec::new();
            for _ in 0..num_intersections {
                intersections.push(IntersectionID(r.read_i64::<BigEndian>()?));
            }
            trips.push(SavedTrip { id, intersections });
        }

        let num_rows = read_count(r, "theta rows")?;
        let num_cols = read_count(r, "theta columns")?;
        // Check before allocating anything
        TimeBins::from_num_bins(num_rows).context("Theta has the wrong number of rows")?;
        if num_cols != num_trips {
            bail!(
                "Theta has {} columns, but there are {} trips",
                num_cols,
                num_trips
            );
        }
        let mut rows = Vec::new();
        for _ in 0..num_rows {
            let mut row = Vec::with_capacity(num_cols);
            for _ in 0..num_cols {
                row.push(r.read_f64::<BigEndian>()?);
            }
            rows.push(row);
        }
        let theta = Theta::new(rows)?;

        // Trust the order in the file; the columns of theta line up with it
        Ok(SavedModel { trips, theta })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }
        let mut file = BufWriter::new(fs_err::File::create(path)?);
        self.write_to(&mut file)
            .with_context(|| format!("writing {}", path.display()))?;
        file.flush()?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<SavedModel> {
        let path = path.as_ref();
        let mut file = BufReader::new(fs_err::File::open(path)?);
        SavedModel::read_from(&mut file).with_context(|| format!("reading {}", path.display()))
    }
}

fn to_i32(x: usize, what: &str) -> Result<i32> {
    i32::try_from(x).with_context(|| format!("too many {} to save: {}", what, x))
}

fn read_count<R: Read>(r: &mut R, what: &str) -> Result<usize> {
    let x = r.read_i32::<BigEndian>()?;
    if x < 0 {
        bail!("Negative number of {}: {}", what, x);
    }
    Ok(x as usize)
}
