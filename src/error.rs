use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use rand_distr::uniform::Error as UniformError;
use safetensors::SafeTensorError;

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, KiErr>;

/// The crate's error type.
#[derive(Debug)]
pub enum KiErr {
    /// A shape invariant was violated (e.g. a batch with the wrong amount of features).
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// An input is invalid for semantic or domain reasons.
    InvalidInput(String),
    /// The configuration holds an invalid hyperparameter.
    InvalidConfig(String),
    /// The requested entry point doesn't exist in the bundle.
    UnknownEntryPoint(String),
    /// A stored tensor is absent from the bundle.
    MissingTensor(String),
    /// An initializer couldn't build its distribution.
    Init(UniformError),
    Io(io::Error),
    SafeTensors(SafeTensorError),
    Json(serde_json::Error),
}

impl Display for KiErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KiErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "shape mismatch for {what}: got {got}, expected {expected}"),
            KiErr::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            KiErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            KiErr::UnknownEntryPoint(name) => write!(f, "unknown entry point `{name}`"),
            KiErr::MissingTensor(name) => write!(f, "tensor `{name}` is missing from the bundle"),
            KiErr::Init(e) => write!(f, "parameter initialization failed: {e}"),
            KiErr::Io(e) => write!(f, "io error: {e}"),
            KiErr::SafeTensors(e) => write!(f, "safetensors error: {e}"),
            KiErr::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl Error for KiErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            KiErr::Init(e) => Some(e),
            KiErr::Io(e) => Some(e),
            KiErr::SafeTensors(e) => Some(e),
            KiErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<UniformError> for KiErr {
    fn from(e: UniformError) -> Self {
        Self::Init(e)
    }
}

impl From<io::Error> for KiErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<SafeTensorError> for KiErr {
    fn from(e: SafeTensorError) -> Self {
        Self::SafeTensors(e)
    }
}

impl From<serde_json::Error> for KiErr {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
