use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::Result;

/// How one block of a layer's parameters, its kernel or its bias, gets its initial values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Initializer {
    /// Every value set to the same constant.
    Constant(f32),
    /// Uniform in `[-glorot_limit, glorot_limit)`, keeps the variance of the activations stable
    /// across layers.
    GlorotUniform,
}

impl Initializer {
    pub const ZEROS: Self = Self::Constant(0.);

    /// Writes the initial values of a block belonging to a `fan_in -> fan_out` layer.
    ///
    /// # Arguments
    /// * `rng` - Source of randomness, consumed one draw per value by random initializers.
    /// * `fan_in` - The layer's amount of inputs.
    /// * `fan_out` - The layer's amount of outputs.
    /// * `block` - The values to overwrite.
    ///
    /// # Returns
    /// An error if the layer's dimensions don't yield a valid distribution.
    pub fn fill<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        fan_in: usize,
        fan_out: usize,
        block: &mut [f32],
    ) -> Result<()> {
        match *self {
            Self::Constant(value) => block.fill(value),
            Self::GlorotUniform => {
                let limit = glorot_limit(fan_in, fan_out);
                let distribution = Uniform::new(-limit, limit)?;
                block
                    .iter_mut()
                    .for_each(|w| *w = distribution.sample(rng));
            }
        }

        Ok(())
    }
}

/// Half-width of the Glorot uniform range, `sqrt(6 / (fan_in + fan_out))`.
pub fn glorot_limit(fan_in: usize, fan_out: usize) -> f32 {
    (6. / (fan_in + fan_out) as f32).sqrt()
}
