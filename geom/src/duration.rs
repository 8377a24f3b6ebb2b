use std::{cmp, ops};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::trim_f64;

/// A duration, in seconds. Can be negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Duration(f64);

// By construction, Duration is a finite f64 with trimmed precision.
impl Eq for Duration {}

#[allow(clippy::derive_ord_xor_partial_ord)] // false positive
impl Ord for Duration {
    fn cmp(&self, other: &Duration) -> cmp::Ordering {
        self.partial_cmp(other).unwrap()
    }
}

impl Duration {
    pub const ZERO: Duration = Duration::const_seconds(0.0);

    /// Creates a duration in seconds.
    pub fn seconds(value: f64) -> Duration {
        if !value.is_finite() {
            panic!("Bad Duration {}", value);
        }

        Duration(trim_f64(value))
    }

    /// Creates a duration in minutes.
    pub fn minutes(mins: usize) -> Duration {
        Duration::seconds((mins as f64) * 60.0)
    }

    pub const fn const_seconds(value: f64) -> Duration {
        Duration(value)
    }

    /// Returns the duration in seconds. Prefer working in typesafe `Duration`s.
    pub fn inner_seconds(self) -> f64 {
        self.0
    }

    /// Parses a duration such as "3:00" to `Duration::minutes(3)`, or a plain "90" to 90 seconds.
    pub fn parse(string: &str) -> Result<Duration> {
        let parts: Vec<&str> = string.split(':').collect();
        let mut seconds: f64 = 0.0;
        for part in &parts {
            let value = part
                .trim()
                .parse::<f64>()
                .map_err(|err| anyhow!("Duration {}: {}", string, err))?;
            seconds = seconds * 60.0 + value;
        }
        if parts.len() > 3 {
            bail!("Duration {}: weird number of parts", string);
        }
        Ok(Duration::seconds(seconds))
    }

    /// Splits the duration into (hours, minutes, seconds, centiseconds).
    fn get_parts(self) -> (usize, usize, usize, usize) {
        // Force positive
        let mut remainder = self.inner_seconds().abs();
        let hours = (remainder / 3600.0).floor();
        remainder -= hours * 3600.0;
        let minutes = (remainder / 60.0).floor();
        remainder -= minutes * 60.0;
        let seconds = remainder.floor();
        remainder -= seconds;
        let centis = (remainder / 0.01).round();

        (
            hours as usize,
            minutes as usize,
            seconds as usize,
            centis as usize,
        )
    }
}

impl std::fmt::Display for Duration {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut s = String::new();
        if *self < Duration::ZERO {
            s = "-".to_string();
        }
        let (hours, minutes, seconds, remainder) = self.get_parts();
        if hours == 0 && minutes == 0 && seconds == 0 && remainder == 0 {
            return write!(f, "0s");
        }

        if hours != 0 {
            s = format!("{}{}hr ", s, hours);
        }
        if minutes != 0 {
            s = format!("{}{}min ", s, minutes);
        }
        if remainder != 0 {
            s = format!("{}{}.{:02}s", s, seconds, remainder);
        } else if seconds != 0 {
            s = format!("{}{}s", s, seconds);
        }
        // Trim trailing whitespace, in case we have non-zero hours/minutes, but zero seconds
        write!(f, "{}", s.trim_end())
    }
}

impl ops::Add for Duration {
    type Output = Duration;

    fn add(self, other: Duration) -> Duration {
        Duration::seconds(self.0 + other.0)
    }
}

impl ops::AddAssign for Duration {
    fn add_assign(&mut self, other: Duration) {
        *self = *self + other;
    }
}

impl ops::Sub for Duration {
    type Output = Duration;

    fn sub(self, other: Duration) -> Duration {
        Duration::seconds(self.0 - other.0)
    }
}

impl std::iter::Sum for Duration {
    fn sum<I: Iterator<Item = Duration>>(iter: I) -> Duration {
        let mut sum = Duration::ZERO;
        for x in iter {
            sum += x;
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Duration::ZERO.to_string(), "0s");
        assert_eq!(Duration::minutes(5).to_string(), "5min");
        assert_eq!(Duration::seconds(3725.5).to_string(), "1hr 2min 5.50s");
        assert_eq!(Duration::seconds(-30.0).to_string(), "-30s");
    }

    #[test]
    fn parse() {
        assert_eq!(Duration::parse("3:00").unwrap(), Duration::minutes(3));
        assert_eq!(Duration::parse("1:00:00").unwrap(), Duration::minutes(60));
        assert_eq!(Duration::parse("90").unwrap(), Duration::seconds(90.0));
        assert!(Duration::parse("five").is_err());
        assert!(Duration::parse("1:2:3:4").is_err());
    }

    #[test]
    fn ordering() {
        assert!(Duration::minutes(5) < Duration::minutes(10));
        assert_eq!(
            vec![Duration::minutes(1), Duration::seconds(30.0)]
                .into_iter()
                .sum::<Duration>(),
            Duration::seconds(90.0)
        );
    }
}
