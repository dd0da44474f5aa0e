use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::{KiErr, Result};

/// Hyperparameters of the `Adam` optimizer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

impl AdamConfig {
    fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.) {
            return Err(KiErr::InvalidConfig(format!(
                "learning rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }

        for (name, beta) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(0. ..1.).contains(&beta) {
                return Err(KiErr::InvalidConfig(format!(
                    "{name} must be in [0, 1), got {beta}"
                )));
            }
        }

        if !(self.epsilon.is_finite() && self.epsilon > 0.) {
            return Err(KiErr::InvalidConfig(format!(
                "epsilon must be positive and finite, got {}",
                self.epsilon
            )));
        }

        Ok(())
    }
}

const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(32).unwrap();

/// Everything that can be tuned on a `KillerInstinct`, the topology itself is fixed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KillerInstinctConfig {
    /// Rows in the batch the export driver traces `learn` with.
    pub batch_size: NonZeroUsize,
    pub optimizer: AdamConfig,
    /// Seed for the parameter initialization, `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for KillerInstinctConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            optimizer: AdamConfig::default(),
            seed: None,
        }
    }
}

impl KillerInstinctConfig {
    /// Parses a configuration from json, missing fields take their default value.
    ///
    /// # Returns
    /// The parsed configuration or an error if it's malformed or invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the same configuration with a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks every hyperparameter is within its domain.
    pub fn validate(&self) -> Result<()> {
        self.optimizer.validate()
    }
}
