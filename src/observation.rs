use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::{KiErr, NUM_FEATURES, Result};

/// Names of the features, in the order they appear in a feature vector.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "price_delta",
    "liquidity1",
    "liquidity2",
    "latency1",
    "latency2",
    "volatility1",
    "volatility2",
];

/// The market state between two exchanges at a given moment, optionally labeled with whether
/// making a play was the right call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub price_delta: f32,
    pub liquidity1: f32,
    pub liquidity2: f32,
    pub latency1: f32,
    pub latency2: f32,
    pub volatility1: f32,
    pub volatility2: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<i32>,
}

impl Observation {
    /// Returns the feature vector of this observation.
    pub fn features(&self) -> [f32; NUM_FEATURES] {
        [
            self.price_delta,
            self.liquidity1,
            self.liquidity2,
            self.latency1,
            self.latency2,
            self.volatility1,
            self.volatility2,
        ]
    }

    /// Builds an unlabeled observation from a feature vector.
    pub fn from_features(features: [f32; NUM_FEATURES]) -> Self {
        let [
            price_delta,
            liquidity1,
            liquidity2,
            latency1,
            latency2,
            volatility1,
            volatility2,
        ] = features;

        Self {
            price_delta,
            liquidity1,
            liquidity2,
            latency1,
            latency2,
            volatility1,
            volatility2,
            label: None,
        }
    }

    pub fn with_label(mut self, label: i32) -> Self {
        self.label = Some(label);
        self
    }
}

/// Stacks the observations' feature vectors into a `[N, 7]` batch.
pub fn feature_batch(observations: &[Observation]) -> Array2<f32> {
    let mut batch = Array2::zeros((observations.len(), NUM_FEATURES));

    for (mut row, observation) in batch.rows_mut().into_iter().zip(observations) {
        row.assign(&ArrayView1::from(&observation.features()[..]));
    }

    batch
}

/// Collects the observations' labels into a `[N]` batch.
///
/// # Returns
/// An error if any observation is unlabeled.
pub fn label_batch(observations: &[Observation]) -> Result<Array1<i32>> {
    observations
        .iter()
        .enumerate()
        .map(|(i, observation)| {
            observation
                .label
                .ok_or_else(|| KiErr::InvalidInput(format!("observation {i} has no label")))
        })
        .collect()
}
