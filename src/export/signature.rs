use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use super::{Tensor, TensorMap};
use crate::{KiErr, NUM_FEATURES, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float32,
    Int32,
}

impl Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Float32 => f.write_str("float32"),
            DType::Int32 => f.write_str("int32"),
        }
    }
}

/// The contract of a single named tensor, `None` dimensions accept any size.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name: String,
    pub dtype: DType,
    pub shape: Vec<Option<usize>>,
}

impl TensorSpec {
    pub fn new(name: &str, dtype: DType, shape: &[Option<usize>]) -> Self {
        Self {
            name: name.to_string(),
            dtype,
            shape: shape.to_vec(),
        }
    }

    /// Checks the tensor's element type and shape against this spec.
    pub fn check(&self, tensor: &Tensor) -> Result<()> {
        if tensor.dtype() != self.dtype {
            return Err(KiErr::InvalidInput(format!(
                "`{}` must be {}, got {}",
                self.name,
                self.dtype,
                tensor.dtype()
            )));
        }

        let shape = tensor.shape();
        if shape.len() != self.shape.len() {
            return Err(KiErr::InvalidInput(format!(
                "`{}` must have rank {}, got {}",
                self.name,
                self.shape.len(),
                shape.len()
            )));
        }

        for (&got, expected) in shape.iter().zip(&self.shape) {
            match *expected {
                Some(expected) if got != expected => {
                    return Err(KiErr::ShapeMismatch {
                        what: "tensor dimension",
                        got,
                        expected,
                    });
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// The inputs and outputs of an entry point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
}

impl Signature {
    /// Checks every expected input is present and fulfills its spec, and that there are no
    /// unexpected ones.
    pub fn check_inputs(&self, inputs: &TensorMap) -> Result<()> {
        for spec in &self.inputs {
            let tensor = inputs
                .get(&spec.name)
                .ok_or_else(|| KiErr::InvalidInput(format!("missing input `{}`", spec.name)))?;
            spec.check(tensor)?;
        }

        if let Some(name) = inputs
            .keys()
            .find(|name| self.inputs.iter().all(|spec| &spec.name != *name))
        {
            return Err(KiErr::InvalidInput(format!("unexpected input `{name}`")));
        }

        Ok(())
    }
}

/// The computations a bundle exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryPoint {
    Learn,
    Predict,
}

impl EntryPoint {
    pub const ALL: [EntryPoint; 2] = [EntryPoint::Learn, EntryPoint::Predict];

    pub fn name(&self) -> &'static str {
        match self {
            EntryPoint::Learn => "learn",
            EntryPoint::Predict => "predict",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|entry_point| entry_point.name() == name)
            .ok_or_else(|| KiErr::UnknownEntryPoint(name.to_string()))
    }

    pub fn signature(&self) -> Signature {
        let data = TensorSpec::new("data", DType::Float32, &[None, Some(NUM_FEATURES)]);

        match self {
            EntryPoint::Learn => Signature {
                inputs: vec![data, TensorSpec::new("labels", DType::Int32, &[None])],
                outputs: vec![TensorSpec::new("loss", DType::Float32, &[])],
            },
            EntryPoint::Predict => Signature {
                inputs: vec![data],
                outputs: vec![TensorSpec::new(
                    "predictions",
                    DType::Float32,
                    &[None, Some(1)],
                )],
            },
        }
    }
}
