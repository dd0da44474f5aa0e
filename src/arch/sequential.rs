use std::fmt::{self, Display};

use ndarray::{Array2, ArrayView2};

use super::{Model, layers::Dense, loss::LossFn};
use crate::{KiErr, Result, optimization::Optimizer};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Dense>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Dense>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// Makes a forward pass through the network, keeping what the backward pass needs.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_size("parameters", params.len())?;

        let mut rest = params;
        let mut a = x.to_owned();

        for layer in &mut self.layers {
            let (layer_params, tail) = rest.split_at(layer.size());
            a = layer.forward(layer_params, a.view())?;
            rest = tail;
        }

        Ok(a)
    }

    /// Makes a forward pass through the network without mutating it.
    pub fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_size("parameters", params.len())?;

        let mut rest = params;
        let mut a = x.to_owned();

        for layer in &self.layers {
            let (layer_params, tail) = rest.split_at(layer.size());
            a = layer.predict(layer_params, a.view())?;
            rest = tail;
        }

        Ok(a)
    }

    /// Computes the gradient of the loss with respect to every parameter over one batch.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - The buffer the gradient is written to, same layout as `params`.
    /// * `loss_fn` - The loss function.
    /// * `x` - The batch's inputs.
    /// * `y` - The batch's expected outputs.
    ///
    /// # Returns
    /// The batch loss.
    pub fn gradient<L: LossFn>(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        loss_fn: &L,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<f32> {
        self.check_size("gradient", grad.len())?;

        let y_pred = self.forward(params, x)?;
        if y_pred.dim() != y.dim() {
            return Err(KiErr::ShapeMismatch {
                what: "expected outputs",
                got: y.len(),
                expected: y_pred.len(),
            });
        }

        let loss = loss_fn.loss(y_pred.view(), y);
        let mut d = loss_fn.loss_prime(y_pred.view(), y);

        let mut end = params.len();
        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(loss)
    }

    fn check_size(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();
        if got != expected {
            return Err(KiErr::ShapeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn backprop<L, O>(
        &mut self,
        params: &mut [f32],
        grad: &mut [f32],
        loss_fn: &L,
        optimizer: &mut O,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<f32>
    where
        L: LossFn,
        O: Optimizer,
    {
        let loss = self.gradient(params, grad, loss_fn, x, y)?;

        if !loss.is_finite() {
            return Err(KiErr::InvalidInput(format!(
                "batch loss overflowed to {loss}"
            )));
        }
        if let Some(i) = grad.iter().position(|g| !g.is_finite()) {
            return Err(KiErr::InvalidInput(format!(
                "gradient of parameter {i} overflowed to {}",
                grad[i]
            )));
        }

        optimizer.update_params(grad, params)?;
        Ok(loss)
    }
}

/// Layer table in the spirit of Keras' `Model.summary()`.
impl Display for Sequential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<22}{:<16}{:>8}", "Layer (type)", "Output Shape", "Param #")?;
        writeln!(f, "{}", "=".repeat(46))?;

        for (i, layer) in self.layers.iter().enumerate() {
            let act = layer.act_fn().map_or("linear", |act_fn| act_fn.name());
            let name = format!("dense_{i} ({act})");
            let shape = format!("(None, {})", layer.dim().1);
            writeln!(f, "{name:<22}{shape:<16}{:>8}", layer.size())?;
        }

        writeln!(f, "{}", "=".repeat(46))?;
        write!(f, "Total params: {}", self.size())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use super::*;
    use crate::{
        arch::{activations::ActFn, loss::BinaryCrossEntropy},
        config::AdamConfig,
        optimization::{Adam, AdamState},
    };

    fn smooth_net() -> Sequential {
        Sequential::new([
            Dense::new((3, 2), Some(ActFn::sigmoid(1.))),
            Dense::new((2, 1), Some(ActFn::sigmoid(1.))),
        ])
    }

    fn params(n: usize) -> Vec<f32> {
        (0..n).map(|i| ((i * 7 % 11) as f32 - 5.) / 10.).collect()
    }

    #[test]
    fn size_is_sum_of_layers() {
        assert_eq!(smooth_net().size(), 8 + 3);
    }

    #[test]
    fn forward_and_predict_agree() {
        let mut net = smooth_net();
        let params = params(net.size());
        let x = array![[0.1, -0.4, 1.2], [2., 0., -1.]];

        let predicted = net.predict(&params, x.view()).unwrap();
        let forwarded = net.forward(&params, x.view()).unwrap();

        assert_eq!(predicted, forwarded);
        assert_eq!(predicted.dim(), (2, 1));
    }

    #[test]
    fn wrong_params_len() {
        let net = smooth_net();
        let x = array![[0., 0., 0.]];

        let err = net.predict(&[0.; 3], x.view()).unwrap_err();
        assert!(matches!(err, KiErr::ShapeMismatch { got: 3, expected: 11, .. }));
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let mut net = smooth_net();
        let loss_fn = BinaryCrossEntropy::default();
        let params = params(net.size());
        let x = array![[0.1, -0.4, 1.2], [2., 0., -1.], [-0.7, 0.3, 0.5]];
        let y = array![[1.], [0.], [1.]];

        let mut grad = vec![0.; net.size()];
        net.gradient(&params, &mut grad, &loss_fn, x.view(), y.view())
            .unwrap();

        let h = 1e-2;
        for i in 0..params.len() {
            let mut plus = params.clone();
            let mut minus = params.clone();
            plus[i] += h;
            minus[i] -= h;

            let loss_plus = loss_fn.loss(net.predict(&plus, x.view()).unwrap().view(), y.view());
            let loss_minus = loss_fn.loss(net.predict(&minus, x.view()).unwrap().view(), y.view());
            let numeric = (loss_plus - loss_minus) / (2. * h);

            assert_abs_diff_eq!(grad[i], numeric, epsilon = 2e-3);
        }
    }

    #[test]
    fn backprop_lowers_the_loss() {
        let mut net = smooth_net();
        let loss_fn = BinaryCrossEntropy::default();
        let config = AdamConfig {
            learning_rate: 0.05,
            ..AdamConfig::default()
        };
        let mut optimizer = Adam::new(net.size(), &config);
        let mut params = params(net.size());
        let mut grad = vec![0.; net.size()];
        let x = array![[1., 0., 0.], [0., 1., 0.], [0., 0., 1.], [1., 1., 0.]];
        let y = array![[1.], [0.], [0.], [1.]];

        let first = net
            .backprop(&mut params, &mut grad, &loss_fn, &mut optimizer, x.view(), y.view())
            .unwrap();
        let mut last = first;
        for _ in 0..200 {
            last = net
                .backprop(&mut params, &mut grad, &loss_fn, &mut optimizer, x.view(), y.view())
                .unwrap();
        }

        assert!(last < first / 2., "first: {first}, last: {last}");
    }

    #[test]
    fn overflowing_batch_leaves_the_model_untouched() {
        let mut net = smooth_net();
        let loss_fn = BinaryCrossEntropy::default();
        let mut optimizer = Adam::new(net.size(), &AdamConfig::default());
        let mut grad = vec![0.; net.size()];
        let x = array![[0.1, -0.4, 1.2]];
        let y = array![[1.]];

        // A NaN bias poisons the forward pass no matter the input.
        let mut params = params(net.size());
        params[6] = f32::NAN;
        let before: Vec<u32> = params.iter().map(|p| p.to_bits()).collect();

        let err = net
            .backprop(&mut params, &mut grad, &loss_fn, &mut optimizer, x.view(), y.view())
            .unwrap_err();

        assert!(matches!(err, KiErr::InvalidInput(_)));
        assert_eq!(params.iter().map(|p| p.to_bits()).collect::<Vec<_>>(), before);
        assert_eq!(optimizer.state(), &AdamState::new(net.size()));
    }

    #[test]
    fn summary_lists_layers() {
        let summary = smooth_net().to_string();

        assert!(summary.contains("dense_0 (sigmoid)"));
        assert!(summary.contains("(None, 1)"));
        assert!(summary.ends_with("Total params: 11"));
    }
}
