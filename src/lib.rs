pub mod arch;
pub mod config;
pub mod error;
pub mod export;
pub mod initialization;
mod killer_instinct;
pub mod observation;
pub mod optimization;

pub use config::{AdamConfig, KillerInstinctConfig};
pub use error::{KiErr, Result};
pub use export::{SavedModel, export};
pub use killer_instinct::{
    HIDDEN_UNITS, KillerInstinct, LAYER_DIMS, LearnOutput, NUM_FEATURES, PredictOutput,
};
pub use observation::Observation;
