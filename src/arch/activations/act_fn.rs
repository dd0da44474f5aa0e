use serde::{Deserialize, Serialize};

use super::{Relu, Sigmoid};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFn {
    Relu(Relu),
    Sigmoid(Sigmoid),
}

impl ActFn {
    pub fn relu() -> Self {
        Self::Relu(Relu)
    }

    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid(Sigmoid::new(amp))
    }

    /// Short name used by the model summary.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Relu(_) => "relu",
            Self::Sigmoid(_) => "sigmoid",
        }
    }

    pub fn f(&self, z: f32) -> f32 {
        match self {
            Self::Relu(a) => a.f(z),
            Self::Sigmoid(a) => a.f(z),
        }
    }

    pub fn df(&self, z: f32) -> f32 {
        match self {
            Self::Relu(a) => a.df(z),
            Self::Sigmoid(a) => a.df(z),
        }
    }
}
