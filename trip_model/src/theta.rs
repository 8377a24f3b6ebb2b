use anyhow::{Context, Result};

use crate::TimeBins;

/// Once the cumulative probability passes this, the remaining trips are treated as impossible.
const CUMULATIVE_CUTOFF: f64 = 1.0 - 1e-12;

/// Unnormalized log-weights of every trip, one row per time bin. Columns line up with the trips
/// sorted by ID.
#[derive(Clone, Debug, PartialEq)]
pub struct Theta {
    rows: Vec<Vec<f64>>,
    time_bins: TimeBins,
}

impl Theta {
    /// Every row must have the same length, and the number of rows must evenly divide the week.
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Theta> {
        let time_bins = TimeBins::from_num_bins(rows.len())
            .with_context(|| format!("Theta has {} rows", rows.len()))?;
        let cols = rows[0].len();
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != cols) {
            bail!(
                "Theta row {} has {} columns, but row 0 has {}",
                idx,
                row.len(),
                cols
            );
        }
        Ok(Theta { rows, time_bins })
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_cols(&self) -> usize {
        self.rows[0].len()
    }

    pub fn row(&self, bin: usize) -> &[f64] {
        &self.rows[bin]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }

    pub fn time_bins(&self) -> TimeBins {
        self.time_bins
    }
}

/// Converts log-weights into probabilities. Shifts by the maximum first, so large weights don't
/// overflow.
pub fn softmax(row: &[f64]) -> Vec<f64> {
    let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if row.is_empty() || !max.is_finite() {
        return vec![1.0 / (row.len() as f64); row.len()];
    }
    let exps: Vec<f64> = row.iter().map(|x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|x| x / sum).collect()
}

/// Partial sums of a probability distribution, for sampling by binary search. Stops early once
/// the sum gets close enough to 1.
pub fn cumulative_distribution(probs: &[f64]) -> Vec<f64> {
    let mut cumulative = Vec::with_capacity(probs.len());
    let mut sum = 0.0;
    for (idx, p) in probs.iter().enumerate() {
        sum += p;
        cumulative.push(sum);
        if sum > CUMULATIVE_CUTOFF && idx < probs.len() - 1 {
            break;
        }
    }
    cumulative
}
