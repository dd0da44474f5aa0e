use super::Optimizer;
use crate::{KiErr, Result, config::AdamConfig};

/// Adam optimization algorithm with bias-corrected moment estimates.
#[derive(Clone, Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    state: AdamState,
}

/// The mutable part of `Adam`, what has to be persisted to resume an optimization.
#[derive(Clone, Debug, PartialEq)]
pub struct AdamState {
    /// First moment estimates, one per parameter.
    pub m: Box<[f32]>,
    /// Second moment estimates, one per parameter.
    pub v: Box<[f32]>,
    /// `beta1` raised to the amount of updates made so far.
    pub beta1_t: f32,
    /// `beta2` raised to the amount of updates made so far.
    pub beta2_t: f32,
}

impl AdamState {
    /// Returns the initial state for `len` parameters.
    pub fn new(len: usize) -> Self {
        Self {
            m: vec![0.; len].into_boxed_slice(),
            v: vec![0.; len].into_boxed_slice(),
            beta1_t: 1.,
            beta2_t: 1.,
        }
    }

    /// Returns the amount of parameters this state tracks.
    pub fn len(&self) -> usize {
        self.m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.m.is_empty()
    }
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `config` - The hyperparameters of the algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(len: usize, config: &AdamConfig) -> Self {
        Self::with_state(AdamState::new(len), config)
    }

    /// Creates an `Adam` optimizer resuming from a previously saved state.
    pub fn with_state(state: AdamState, config: &AdamConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            beta1: config.beta1,
            beta2: config.beta2,
            epsilon: config.epsilon,
            state,
        }
    }

    pub fn state(&self) -> &AdamState {
        &self.state
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        for (what, got) in [("gradient", grad.len()), ("parameters", params.len())] {
            if got != self.state.len() {
                return Err(KiErr::ShapeMismatch {
                    what,
                    got,
                    expected: self.state.len(),
                });
            }
        }

        // Checked up front so a rejected gradient leaves the state as it was.
        if let Some(i) = grad.iter().position(|g| !g.powi(2).is_finite()) {
            return Err(KiErr::InvalidInput(format!(
                "gradient {} of parameter {i} overflows the second moment",
                grad[i]
            )));
        }

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        let state = &mut self.state;
        state.beta1_t *= b1;
        state.beta2_t *= b2;

        let bc1 = 1. - state.beta1_t;
        let bc2 = 1. - state.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        params
            .iter_mut()
            .zip(grad)
            .zip(state.m.iter_mut())
            .zip(state.v.iter_mut())
            .for_each(|(((p, g), m), v)| {
                *m = b1 * *m + (1. - b1) * g;
                *v = b2 * *v + (1. - b2) * g.powi(2);
                *p -= step_size * *m / (v.sqrt() + eps);
            });

        Ok(())
    }
}
