use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::agents::{BanditOptions, LearningRate};
use crate::DatasetKey;

/// Where saved models live.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataFiles {
    /// The model aggregated over the whole year
    pub default_path: String,
    /// One model per month, with `{month}` replaced by a two-digit month like "03". If this is
    /// missing, every time uses the default model.
    pub monthly_template: Option<String>,
}

impl Default for DataFiles {
    fn default() -> DataFiles {
        DataFiles {
            default_path: "resources/data.bin".to_string(),
            monthly_template: Some("resources/data_{month}.bin".to_string()),
        }
    }
}

impl DataFiles {
    /// Only the default model, no monthly ones
    pub fn single<P: AsRef<Path>>(path: P) -> DataFiles {
        DataFiles {
            default_path: path.as_ref().display().to_string(),
            monthly_template: None,
        }
    }

    /// Which dataset should be used at some time?
    pub fn key_for_time(&self, time: i64) -> Result<DatasetKey> {
        if self.monthly_template.is_none() {
            return Ok(DatasetKey::Default);
        }
        DatasetKey::from_time(time)
    }

    pub fn path(&self, key: DatasetKey) -> PathBuf {
        match (key, &self.monthly_template) {
            (DatasetKey::Month(month), Some(template)) => {
                PathBuf::from(template.replace("{month}", &format!("{:02}", month)))
            }
            _ => PathBuf::from(&self.default_path),
        }
    }
}

/// How learning runs over many epochs of a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingOptions {
    /// Names the snapshots, so different runs don't overwrite each other
    #[serde(default = "default_experiment")]
    pub experiment: String,
    /// Where `theta_<experiment>_<epoch>.bin` snapshots go
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_learning_rate")]
    pub initial_learning_rate: f64,
    /// The learning rate is multiplied by this after every epoch.
    #[serde(default = "default_decay")]
    pub decay: f64,
}

fn default_experiment() -> String {
    "default".to_string()
}

fn default_output_dir() -> String {
    "out".to_string()
}

fn default_learning_rate() -> f64 {
    LearningRate::DEFAULT
}

fn default_decay() -> f64 {
    1.0
}

impl Default for TrainingOptions {
    fn default() -> TrainingOptions {
        TrainingOptions {
            experiment: default_experiment(),
            output_dir: default_output_dir(),
            initial_learning_rate: default_learning_rate(),
            decay: default_decay(),
        }
    }
}

/// Everything needed to run the sampling model and learning agents, usually read from a JSON
/// file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub data: DataFiles,
    #[serde(default)]
    pub bandit: BanditOptions,
    #[serde(default)]
    pub training: TrainingOptions,
    /// Seeds the random number generator used for sampling trips
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
}

fn default_rng_seed() -> u64 {
    42
}

impl Default for ModelConfig {
    fn default() -> ModelConfig {
        ModelConfig {
            data: DataFiles::default(),
            bandit: BanditOptions::default(),
            training: TrainingOptions::default(),
            rng_seed: default_rng_seed(),
        }
    }
}

impl ModelConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ModelConfig> {
        abstutil::read_json(path)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        abstutil::write_json(path, self)
    }
}
