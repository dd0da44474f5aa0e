use ndarray::{Array2, ArrayView2, Zip};

use super::LossFn;

/// Binary cross-entropy over probabilities, averaged over every element.
///
/// Predictions are clipped to `[epsilon, 1 - epsilon]` before taking logarithms so a saturated
/// output never yields an infinite loss or gradient.
#[derive(Clone, Copy, Debug)]
pub struct BinaryCrossEntropy {
    epsilon: f32,
}

impl Default for BinaryCrossEntropy {
    fn default() -> Self {
        Self::new(Self::EPSILON)
    }
}

impl BinaryCrossEntropy {
    pub const EPSILON: f32 = 1e-7;

    /// Returns a new `BinaryCrossEntropy`.
    ///
    /// # Arguments
    /// * `epsilon` - The clipping margin applied to the predictions.
    pub fn new(epsilon: f32) -> Self {
        Self { epsilon }
    }

    fn clip(&self, p: f32) -> f32 {
        p.clamp(self.epsilon, 1. - self.epsilon)
    }
}

impl LossFn for BinaryCrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let n = y_pred.len();
        if n == 0 {
            return 0.;
        }

        let total = Zip::from(&y_pred).and(&y).fold(0., |acc, &p, &y| {
            let p = self.clip(p);
            acc - (y * p.ln() + (1. - y) * (1. - p).ln())
        });

        total / n as f32
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.len().max(1) as f32;

        Zip::from(&y_pred).and(&y).map_collect(|&p, &y| {
            let p = self.clip(p);
            (p - y) / (p * (1. - p) * n)
        })
    }
}
