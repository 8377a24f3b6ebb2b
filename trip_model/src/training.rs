use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use map_model::RoadNetwork;

use crate::{
    BanditOptions, LearningRate, ModelConfig, SearchAgent, TrainingOptions, TripsDataModel,
};

/// Drives learning across epochs. The caller runs one simulation per epoch with agents from
/// `learning_agent`, then calls `finish_epoch`, which snapshots theta and decays the shared
/// learning rate.
pub struct Trainer<M> {
    model: Arc<TripsDataModel<M>>,
    bandit: BanditOptions,
    options: TrainingOptions,
    learning_rate: LearningRate,
    epoch: usize,
}

impl<M: RoadNetwork> Trainer<M> {
    pub fn new(model: Arc<TripsDataModel<M>>, config: &ModelConfig) -> Trainer<M> {
        Trainer {
            model,
            bandit: config.bandit.clone(),
            options: config.training.clone(),
            learning_rate: LearningRate::new(config.training.initial_learning_rate),
            epoch: 0,
        }
    }

    pub fn model(&self) -> &Arc<TripsDataModel<M>> {
        &self.model
    }

    /// How many epochs have finished
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn learning_rate(&self) -> &LearningRate {
        &self.learning_rate
    }

    /// A new agent sharing this trainer's model and learning rate.
    pub fn learning_agent(&self, id: i64) -> SearchAgent<M> {
        SearchAgent::learning(
            id,
            self.model.clone(),
            self.bandit.clone(),
            self.learning_rate.clone(),
        )
    }

    pub fn save_path(&self, epoch: usize) -> PathBuf {
        PathBuf::from(&self.options.output_dir)
            .join(format!("theta_{}_{}.bin", self.options.experiment, epoch))
    }

    /// Saves what was learned during the current epoch and moves on to the next. Returns where
    /// the snapshot went.
    pub fn finish_epoch(&mut self) -> Result<PathBuf> {
        let path = self.save_path(self.epoch);
        self.model.write_data(&path)?;
        let alpha = self.learning_rate.decay(self.options.decay);
        info!(
            "Finished epoch {} of {}, saved to {}. The learning rate is now {}",
            self.epoch,
            self.options.experiment,
            path.display(),
            alpha
        );
        self.epoch += 1;
        Ok(path)
    }
}
