//! Initial values of the dense layers' parameters.

mod initializer;
mod layer_init;

pub use initializer::{Initializer, glorot_limit};
pub use layer_init::LayerInit;
