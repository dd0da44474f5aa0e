use log::{debug, info};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    KiErr, KillerInstinctConfig, Result,
    arch::{Model, Sequential, activations::ActFn, layers::Dense, loss::BinaryCrossEntropy},
    initialization::LayerInit,
    observation::{self, FEATURE_NAMES, Observation},
    optimization::{Adam, AdamState},
};

/// Amount of features in a feature vector.
pub const NUM_FEATURES: usize = 7;

/// Amount of units in the hidden layer.
pub const HIDDEN_UNITS: usize = 4;

/// Inputs and outputs of each dense layer, in order.
pub const LAYER_DIMS: [(usize, usize); 2] = [(NUM_FEATURES, HIDDEN_UNITS), (HIDDEN_UNITS, 1)];

/// What `KillerInstinct::learn` hands back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LearnOutput {
    /// Binary cross-entropy of the batch, measured before the update.
    pub loss: f32,
}

/// What `KillerInstinct::predict` hands back.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictOutput {
    /// One probability in `[0, 1]` per input row, shaped `[N, 1]`.
    pub predictions: Array2<f32>,
}

/// Grizzly's Killer Instinct: a binary classifier deciding whether to make a play.
///
/// ```text
/// Inputs                  Output
/// Price delta             Classification score [0, 1]
/// Liquidity Exch1
/// Liquidity Exch2
/// Average Latency Exch1
/// Average Latency Exch2
/// Volatility Exch1
/// Volatility Exch2
/// ```
///
/// The network is `7 -> 4 (relu) -> 1 (sigmoid)`, trained with binary cross-entropy and Adam.
/// Its shape never changes, only the parameter values and the step counter do, and only through
/// `learn`.
#[derive(Clone, Debug)]
pub struct KillerInstinct {
    config: KillerInstinctConfig,
    model: Sequential,
    params: Vec<f32>,
    grad: Vec<f32>,
    optimizer: Adam,
    loss_fn: BinaryCrossEntropy,
    step: u64,
}

impl KillerInstinct {
    /// Creates a freshly initialized model.
    ///
    /// Kernels are drawn with Glorot uniform initialization and biases start at zero.
    ///
    /// # Arguments
    /// * `config` - The model's configuration.
    ///
    /// # Returns
    /// A new `KillerInstinct` or an error if the configuration is invalid.
    pub fn new(config: KillerInstinctConfig) -> Result<Self> {
        config.validate()?;

        let model = network();
        let size = model.size();

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let params = init_params(&model, &mut rng)?;

        debug!("initialized {size} parameters, seed={:?}", config.seed);
        let optimizer = Adam::new(size, &config.optimizer);
        Ok(Self::assemble(config, model, params, optimizer, 0))
    }

    /// Rebuilds a model from previously saved state.
    ///
    /// # Arguments
    /// * `config` - The model's configuration.
    /// * `params` - The flat parameter buffer.
    /// * `optimizer_state` - The optimizer's moments and running betas.
    /// * `step` - The amount of `learn` calls made so far.
    ///
    /// # Returns
    /// The model or an error if any buffer doesn't match the network's size or holds a value
    /// `learn` could never have produced.
    pub fn from_parts(
        config: KillerInstinctConfig,
        params: Vec<f32>,
        optimizer_state: AdamState,
        step: u64,
    ) -> Result<Self> {
        config.validate()?;

        let model = network();
        let size = model.size();

        for (what, got) in [
            ("parameters", params.len()),
            ("optimizer state", optimizer_state.len()),
        ] {
            if got != size {
                return Err(KiErr::ShapeMismatch {
                    what,
                    got,
                    expected: size,
                });
            }
        }

        check_state(&params, &optimizer_state)?;

        let optimizer = Adam::with_state(optimizer_state, &config.optimizer);
        Ok(Self::assemble(config, model, params, optimizer, step))
    }

    fn assemble(
        config: KillerInstinctConfig,
        model: Sequential,
        params: Vec<f32>,
        optimizer: Adam,
        step: u64,
    ) -> Self {
        Self {
            grad: vec![0.; params.len()],
            config,
            model,
            params,
            optimizer,
            loss_fn: BinaryCrossEntropy::default(),
            step,
        }
    }

    /// Makes one optimization step over a batch.
    ///
    /// Nothing is mutated unless the whole batch is valid.
    ///
    /// # Arguments
    /// * `data` - The feature vectors, shaped `[N, 7]` with `N >= 1`.
    /// * `labels` - One label in `{0, 1}` per row of `data`.
    ///
    /// # Returns
    /// The batch loss, or an error if the batch is malformed or its loss or gradient overflows.
    pub fn learn(&mut self, data: ArrayView2<f32>, labels: ArrayView1<i32>) -> Result<LearnOutput> {
        check_features(data)?;
        if data.nrows() == 0 {
            return Err(KiErr::InvalidInput("learning needs at least one row".to_string()));
        }
        check_labels(labels, data.nrows())?;

        let y = labels.mapv(|label| label as f32).insert_axis(Axis(1));
        let loss = self.model.backprop(
            &mut self.params,
            &mut self.grad,
            &self.loss_fn,
            &mut self.optimizer,
            data,
            y.view(),
        )?;

        self.step += 1;
        info!("{}: loss: {loss}", self.step);

        Ok(LearnOutput { loss })
    }

    /// Scores a batch of feature vectors.
    ///
    /// # Arguments
    /// * `data` - The feature vectors, shaped `[N, 7]`.
    ///
    /// # Returns
    /// The probability of each row being worth a play, or an error if the batch is malformed or
    /// so large the forward pass overflows.
    pub fn predict(&self, data: ArrayView2<f32>) -> Result<PredictOutput> {
        check_features(data)?;

        let predictions = self.model.predict(&self.params, data)?;
        if let Some(i) = predictions.iter().position(|p| !p.is_finite()) {
            return Err(KiErr::InvalidInput(format!(
                "forward pass of row {i} overflowed"
            )));
        }
        debug!("predicted {} row(s)", predictions.nrows());

        Ok(PredictOutput { predictions })
    }

    /// Same as `learn` over labeled observations.
    pub fn learn_observations(&mut self, observations: &[Observation]) -> Result<f32> {
        let labels = observation::label_batch(observations)?;
        let data = observation::feature_batch(observations);

        Ok(self.learn(data.view(), labels.view())?.loss)
    }

    /// Same as `predict` over observations, one probability per observation.
    pub fn predict_observations(&self, observations: &[Observation]) -> Result<Vec<f32>> {
        let data = observation::feature_batch(observations);
        let PredictOutput { predictions } = self.predict(data.view())?;

        Ok(predictions.into_iter().collect())
    }

    /// Returns the amount of completed `learn` calls.
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn layers(&self) -> &[Dense] {
        self.model.layers()
    }

    pub fn config(&self) -> &KillerInstinctConfig {
        &self.config
    }

    pub fn optimizer_state(&self) -> &AdamState {
        self.optimizer.state()
    }

    /// Returns a printable table of the network's layers.
    pub fn summary(&self) -> String {
        self.model.to_string()
    }
}

fn network() -> Sequential {
    let [hidden, output] = LAYER_DIMS;

    Sequential::new([
        Dense::new(hidden, Some(ActFn::relu())),
        Dense::new(output, Some(ActFn::sigmoid(1.))),
    ])
}

/// Glorot-uniform kernels and zero biases, drawn layer by layer in buffer order.
fn init_params(model: &Sequential, rng: &mut StdRng) -> Result<Vec<f32>> {
    let init = LayerInit::default();
    let mut params = vec![0.; model.size()];

    let mut start = 0;
    for layer in model.layers() {
        let end = start + layer.size();
        init.fill(rng, layer.dim(), &mut params[start..end])?;
        start = end;
    }

    Ok(params)
}

fn check_state(params: &[f32], state: &AdamState) -> Result<()> {
    for (what, values) in [
        ("parameter", params),
        ("first moment", &state.m[..]),
        ("second moment", &state.v[..]),
    ] {
        if let Some(i) = values.iter().position(|x| !x.is_finite()) {
            return Err(KiErr::InvalidInput(format!(
                "{what} {i} is not finite: {}",
                values[i]
            )));
        }
    }

    if let Some(v) = state.v.iter().find(|v| **v < 0.) {
        return Err(KiErr::InvalidInput(format!(
            "second moment estimates can't be negative, got {v}"
        )));
    }

    // Running powers of betas in [0, 1), they start at 1 and may underflow to 0.
    for (name, beta_t) in [("beta1_t", state.beta1_t), ("beta2_t", state.beta2_t)] {
        if !(0. ..=1.).contains(&beta_t) {
            return Err(KiErr::InvalidInput(format!(
                "{name} must be in [0, 1], got {beta_t}"
            )));
        }
    }

    Ok(())
}

fn check_features(data: ArrayView2<f32>) -> Result<()> {
    if data.ncols() != NUM_FEATURES {
        return Err(KiErr::ShapeMismatch {
            what: "features",
            got: data.ncols(),
            expected: NUM_FEATURES,
        });
    }

    for (i, row) in data.rows().into_iter().enumerate() {
        if let Some(j) = row.iter().position(|x| !x.is_finite()) {
            return Err(KiErr::InvalidInput(format!(
                "feature `{}` of row {i} is not finite",
                FEATURE_NAMES[j]
            )));
        }
    }

    Ok(())
}

fn check_labels(labels: ArrayView1<i32>, rows: usize) -> Result<()> {
    if labels.len() != rows {
        return Err(KiErr::ShapeMismatch {
            what: "labels",
            got: labels.len(),
            expected: rows,
        });
    }

    if let Some((i, label)) = labels.iter().enumerate().find(|&(_, &l)| l != 0 && l != 1) {
        return Err(KiErr::InvalidInput(format!(
            "label {label} of row {i} must be one of {{0, 1}}"
        )));
    }

    Ok(())
}
