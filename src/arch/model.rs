use ndarray::ArrayView2;

use crate::{Result, arch::loss::LossFn, optimization::Optimizer};

pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Computes the gradient of the loss function with respect to the parameters of the model
    /// over one batch and hands it to the optimizer. **`params` gets updated.**
    ///
    /// A batch whose loss or gradient isn't finite is rejected and leaves both `params` and the
    /// optimizer untouched.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - A buffer for writing the computed gradient.
    /// * `loss_fn` - The loss function.
    /// * `optimizer` - The optimizer that dictates how to update the parameters.
    /// * `x` - The batch's inputs.
    /// * `y` - The batch's expected outputs.
    ///
    /// # Returns
    /// The batch loss, computed before the update, or an error if it or the gradient overflowed.
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
        O: Optimizer;
}
