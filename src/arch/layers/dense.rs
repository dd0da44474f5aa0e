use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, linalg};

use crate::{KiErr, Result, arch::activations::ActFn};

/// A fully connected layer computing `act_fn(x · W + b)`.
///
/// The layer doesn't own its parameters, it views a slice of the model's flat parameter buffer
/// laid out as the kernel `W` (`dim.0 x dim.1`, row-major) followed by the bias `b` (`dim.1`).
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of inputs and outputs of the layer.
    /// * `act_fn` - The activation applied to the weighted sums, `None` for a linear layer.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: Array2::zeros((0, dim.0)),
            z: Array2::zeros((0, dim.1)),
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the amount of parameters in the kernel.
    pub fn kernel_size(&self) -> usize {
        self.dim.0 * self.dim.1
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn act_fn(&self) -> Option<&ActFn> {
        self.act_fn.as_ref()
    }

    /// Makes a forward pass keeping the input and the weighted sums for the backward pass.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of parameters.
    /// * `x` - The input batch, one row per sample.
    ///
    /// # Returns
    /// The activations of this layer or an error if the shapes don't line up.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.weighted_sums(params, x)?;
        let a = self.activate(&z);

        self.x = x.to_owned();
        self.z = z;
        Ok(a)
    }

    /// Makes a forward pass without touching the layer's metadata.
    pub fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.weighted_sums(params, x)?;
        Ok(self.activate(&z))
    }

    /// Propagates the deltas backwards writing this layer's gradient.
    ///
    /// Must be called after `forward`, with `d` shaped like the output of that call.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of parameters.
    /// * `grad` - This layer's slice of the gradient, gets overwritten.
    /// * `d` - The derivative of the loss with respect to this layer's activations.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if d.dim() != self.z.dim() {
            return Err(KiErr::ShapeMismatch {
                what: "dense deltas",
                got: d.len(),
                expected: self.z.len(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }

    fn weighted_sums(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(KiErr::ShapeMismatch {
                what: "dense inputs",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        Ok(x.dot(&w) + &b)
    }

    fn activate(&self, z: &Array2<f32>) -> Array2<f32> {
        match &self.act_fn {
            Some(act_fn) => z.mapv(|z| act_fn.f(z)),
            None => z.clone(),
        }
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("dense gradient", grad.len())?;

        let (dw_raw, db_raw) = grad.split_at_mut(self.kernel_size());
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw)
            .map_err(|_| self.len_err("dense gradient"))?;
        let db = ArrayViewMut1::from(db_raw);
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("dense parameters", params.len())?;

        let (w_raw, b_raw) = params.split_at(self.kernel_size());
        let w = ArrayView2::from_shape(self.dim, w_raw)
            .map_err(|_| self.len_err("dense parameters"))?;
        let b = ArrayView1::from(b_raw);
        Ok((w, b))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(KiErr::ShapeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }

    fn len_err(&self, what: &'static str) -> KiErr {
        KiErr::ShapeMismatch {
            what,
            got: 0,
            expected: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use super::*;

    // W = [[1, 2], [3, 4], [5, 6]], b = [0.5, -0.5]
    const PARAMS: [f32; 8] = [1., 2., 3., 4., 5., 6., 0.5, -0.5];

    #[test]
    fn size_counts_kernel_and_bias() {
        let dense = Dense::new((7, 4), Some(ActFn::relu()));

        assert_eq!(dense.size(), 32);
        assert_eq!(dense.kernel_size(), 28);
    }

    #[test]
    fn linear_forward() {
        let mut dense = Dense::new((3, 2), None);
        let x = array![[1., 0., -1.], [0., 1., 0.]];

        let a = dense.forward(&PARAMS, x.view()).unwrap();

        assert_eq!(a, array![[-3.5, -4.5], [3.5, 3.5]]);
        assert_eq!(dense.predict(&PARAMS, x.view()).unwrap(), a);
    }

    #[test]
    fn relu_forward() {
        let dense = Dense::new((3, 2), Some(ActFn::relu()));
        let x = array![[1., 0., -1.], [0., 1., 0.]];

        let a = dense.predict(&PARAMS, x.view()).unwrap();

        assert_eq!(a, array![[0., 0.], [3.5, 3.5]]);
    }

    #[test]
    fn rejects_wrong_input_width() {
        let dense = Dense::new((3, 2), None);
        let x = array![[1., 0.]];

        let err = dense.predict(&PARAMS, x.view()).unwrap_err();
        assert!(matches!(err, KiErr::ShapeMismatch { got: 2, expected: 3, .. }));
    }

    #[test]
    fn rejects_wrong_params_len() {
        let dense = Dense::new((3, 2), None);
        let x = array![[1., 0., 0.]];

        let err = dense.predict(&PARAMS[..7], x.view()).unwrap_err();
        assert!(matches!(err, KiErr::ShapeMismatch { got: 7, expected: 8, .. }));
    }

    #[test]
    fn linear_backward() {
        let mut dense = Dense::new((3, 2), None);
        let x = array![[1., 0., -1.], [0., 1., 0.]];
        dense.forward(&PARAMS, x.view()).unwrap();

        let mut grad = [0.; 8];
        let d = array![[1., 0.], [0., 2.]];
        let d_prev = dense.backward(&PARAMS, &mut grad, d).unwrap();

        // dW = xᵀ · d, db = column sums of d.
        assert_eq!(grad, [1., 0., 0., 2., -1., 0., 1., 2.]);
        // d · Wᵀ
        assert_eq!(d_prev, array![[1., 3., 5.], [4., 8., 12.]]);
    }

    #[test]
    fn backward_applies_activation_derivative() {
        let mut dense = Dense::new((3, 2), Some(ActFn::sigmoid(1.)));
        let x = array![[0., 0., 0.]];
        dense.forward(&[0.; 8], x.view()).unwrap();

        let mut grad = [0.; 8];
        dense.backward(&[0.; 8], &mut grad, array![[1., 1.]]).unwrap();

        assert_abs_diff_eq!(grad[6], 0.25);
        assert_abs_diff_eq!(grad[7], 0.25);
    }

    #[test]
    fn backward_rejects_mismatched_deltas() {
        let mut dense = Dense::new((3, 2), None);
        dense.forward(&PARAMS, array![[1., 0., 0.]].view()).unwrap();

        let mut grad = [0.; 8];
        let err = dense
            .backward(&PARAMS, &mut grad, array![[1., 0.], [0., 1.]])
            .unwrap_err();
        assert!(matches!(err, KiErr::ShapeMismatch { .. }));
    }
}
