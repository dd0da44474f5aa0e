use anyhow::Context;
use env_logger::Env;
use log::info;
use ndarray::{Array1, Array2};

use killer_instinct::{KillerInstinct, KillerInstinctConfig, NUM_FEATURES, export};

/// Directory the bundle is written to, relative to the working directory.
const EXPORT_DIR: &str = "KillerInstinct";

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = KillerInstinctConfig::default();
    let batch_size = config.batch_size.get();
    let mut ki = KillerInstinct::new(config).context("failed to build the model")?;

    // Dummy invocation of both entry points.
    ki.learn(
        Array2::<f32>::zeros((batch_size, NUM_FEATURES)).view(),
        Array1::<i32>::zeros(batch_size).view(),
    )
    .context("dummy learn failed")?;
    ki.predict(Array2::<f32>::zeros((1, NUM_FEATURES)).view())
        .context("dummy predict failed")?;

    info!("model summary:\n{}", ki.summary());

    export(&ki, EXPORT_DIR).with_context(|| format!("failed to export to {EXPORT_DIR}"))?;
    Ok(())
}
