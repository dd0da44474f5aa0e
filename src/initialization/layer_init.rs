use rand::Rng;

use super::Initializer;
use crate::{KiErr, Result};

/// The initializers of a dense layer's kernel and bias.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerInit {
    pub kernel: Initializer,
    pub bias: Initializer,
}

impl Default for LayerInit {
    /// Glorot uniform kernel, zero bias.
    fn default() -> Self {
        Self {
            kernel: Initializer::GlorotUniform,
            bias: Initializer::ZEROS,
        }
    }
}

impl LayerInit {
    /// Fills a layer's slice of the flat parameter buffer.
    ///
    /// # Arguments
    /// * `rng` - Source of randomness for the initializers.
    /// * `dim` - The layer's amount of inputs and outputs.
    /// * `params` - The layer's kernel (`dim.0 x dim.1`, row-major) followed by its bias.
    ///
    /// # Returns
    /// An error if `params` doesn't fit the layer or an initializer fails.
    pub fn fill<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        (fan_in, fan_out): (usize, usize),
        params: &mut [f32],
    ) -> Result<()> {
        let kernel_size = fan_in * fan_out;
        if params.len() != kernel_size + fan_out {
            return Err(KiErr::ShapeMismatch {
                what: "layer parameters",
                got: params.len(),
                expected: kernel_size + fan_out,
            });
        }

        let (kernel, bias) = params.split_at_mut(kernel_size);
        self.kernel.fill(rng, fan_in, fan_out, kernel)?;
        self.bias.fill(rng, fan_in, fan_out, bias)
    }
}
