use std::collections::BTreeMap;

use ndarray::{Array, ArrayD, ArrayViewD, Dimension};

use super::DType;

/// Named tensors, the inputs and outputs of an entry point.
pub type TensorMap = BTreeMap<String, Tensor>;

/// A dynamically shaped tensor of one of the supported element types.
#[derive(Clone, Debug, PartialEq)]
pub enum Tensor {
    F32(ArrayD<f32>),
    I32(ArrayD<i32>),
}

impl Tensor {
    pub fn dtype(&self) -> DType {
        match self {
            Tensor::F32(_) => DType::Float32,
            Tensor::I32(_) => DType::Int32,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Tensor::F32(a) => a.shape(),
            Tensor::I32(a) => a.shape(),
        }
    }

    pub fn as_f32(&self) -> Option<ArrayViewD<'_, f32>> {
        match self {
            Tensor::F32(a) => Some(a.view()),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<ArrayViewD<'_, i32>> {
        match self {
            Tensor::I32(a) => Some(a.view()),
            _ => None,
        }
    }
}

impl<D: Dimension> From<Array<f32, D>> for Tensor {
    fn from(a: Array<f32, D>) -> Self {
        Tensor::F32(a.into_dyn())
    }
}

impl<D: Dimension> From<Array<i32, D>> for Tensor {
    fn from(a: Array<i32, D>) -> Self {
        Tensor::I32(a.into_dyn())
    }
}
