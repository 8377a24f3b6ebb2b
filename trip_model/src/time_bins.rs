use std::fmt;

use anyhow::Result;
use chrono::{Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const SECONDS_IN_HOUR: i64 = 60 * 60;
pub const SECONDS_IN_DAY: i64 = 24 * SECONDS_IN_HOUR;
pub const SECONDS_IN_WEEK: i64 = 7 * SECONDS_IN_DAY;

/// Splits the week into equally sized bins. Timestamps are Unix seconds, and every week is assumed
/// to look the same, so only the time modulo the week matters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBins {
    bin_size: i64,
}

impl TimeBins {
    /// `bin_size` is in seconds and must evenly divide the week.
    pub fn new(bin_size: i64) -> Result<TimeBins> {
        if bin_size <= 0 || SECONDS_IN_WEEK % bin_size != 0 {
            bail!(
                "A bin size of {}s doesn't evenly divide the week of {}s",
                bin_size,
                SECONDS_IN_WEEK
            );
        }
        Ok(TimeBins { bin_size })
    }

    pub fn from_num_bins(num_bins: usize) -> Result<TimeBins> {
        let num_bins = num_bins as i64;
        if num_bins <= 0 || SECONDS_IN_WEEK % num_bins != 0 {
            bail!("{} bins don't evenly divide the week", num_bins);
        }
        TimeBins::new(SECONDS_IN_WEEK / num_bins)
    }

    pub fn bin_size(self) -> i64 {
        self.bin_size
    }

    pub fn num_bins(self) -> usize {
        (SECONDS_IN_WEEK / self.bin_size) as usize
    }

    /// Which bin does a timestamp fall into? Times before the epoch wrap around.
    pub fn index(self, time: i64) -> usize {
        (time.rem_euclid(SECONDS_IN_WEEK) / self.bin_size) as usize
    }

    /// Seconds into the week where a bin starts
    pub fn bin_start(self, bin: usize) -> u64 {
        (bin as u64) * (self.bin_size as u64)
    }
}

/// Which persisted dataset backs the model at some time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatasetKey {
    /// Aggregated over the whole year
    Default,
    /// 1 through 12
    Month(u32),
}

impl DatasetKey {
    /// Non-positive times mean "no particular date" and map to the default dataset. Otherwise the
    /// calendar month is calculated in UTC.
    pub fn from_time(time: i64) -> Result<DatasetKey> {
        if time <= 0 {
            return Ok(DatasetKey::Default);
        }
        match Utc.timestamp_opt(time, 0).single() {
            Some(dt) => Ok(DatasetKey::Month(dt.month())),
            None => bail!("{} isn't a valid timestamp", time),
        }
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DatasetKey::Default => write!(f, "default dataset"),
            DatasetKey::Month(m) => write!(f, "dataset for month {:02}", m),
        }
    }
}
