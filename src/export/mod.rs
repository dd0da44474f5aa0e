//! The exported bundle: a directory holding the model's variables next to a manifest describing
//! its two entry points, `learn` and `predict`.
//!
//! ```text
//! KillerInstinct/
//! ├── saved_model.json        configuration + signatures
//! └── variables.safetensors   parameters, optimizer state, step counter
//! ```

mod saved_model;
mod signature;
mod tensor;
mod variables;

pub use saved_model::{SAVED_MODEL_FILE, SavedModel, VARIABLES_FILE, export};
pub use signature::{DType, EntryPoint, Signature, TensorSpec};
pub use tensor::{Tensor, TensorMap};
