use std::{collections::BTreeMap, fs, path::Path};

use log::{debug, info};
use ndarray::{ArrayView2, Ix1, Ix2, arr0};
use serde::{Deserialize, Serialize};

use super::{EntryPoint, Signature, Tensor, TensorMap, variables};
use crate::{KiErr, KillerInstinct, KillerInstinctConfig, Result};

/// Name of the manifest inside a bundle.
pub const SAVED_MODEL_FILE: &str = "saved_model.json";

/// Name of the variables file inside a bundle.
pub const VARIABLES_FILE: &str = "variables.safetensors";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    config: KillerInstinctConfig,
    signatures: BTreeMap<String, Signature>,
}

/// Writes the model and its entry points to `dir`, creating it if needed and overwriting a
/// previous bundle.
///
/// # Arguments
/// * `model` - The model to export.
/// * `dir` - The bundle's directory.
///
/// # Returns
/// An error if the bundle couldn't be written.
pub fn export(model: &KillerInstinct, dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let manifest = Manifest {
        config: model.config().clone(),
        signatures: signatures(),
    };

    fs::write(
        dir.join(SAVED_MODEL_FILE),
        serde_json::to_string_pretty(&manifest)?,
    )?;
    variables::write(model, &dir.join(VARIABLES_FILE))?;

    info!(
        "exported model at step {} to {}",
        model.step(),
        dir.display()
    );
    Ok(())
}

fn signatures() -> BTreeMap<String, Signature> {
    EntryPoint::ALL
        .into_iter()
        .map(|entry_point| (entry_point.name().to_string(), entry_point.signature()))
        .collect()
}

/// A model together with its named entry points, as found in an exported bundle.
#[derive(Clone, Debug)]
pub struct SavedModel {
    model: KillerInstinct,
    signatures: BTreeMap<String, Signature>,
}

impl SavedModel {
    /// Wraps a live model.
    pub fn new(model: KillerInstinct) -> Self {
        Self {
            model,
            signatures: signatures(),
        }
    }

    /// Loads a bundle previously written by `export`.
    ///
    /// # Arguments
    /// * `dir` - The bundle's directory.
    ///
    /// # Returns
    /// The saved model, or an error if the bundle is unreadable or doesn't describe this model.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let json = fs::read_to_string(dir.join(SAVED_MODEL_FILE))?;
        let manifest: Manifest = serde_json::from_str(&json)?;

        for (name, signature) in &manifest.signatures {
            if EntryPoint::from_name(name)?.signature() != *signature {
                return Err(KiErr::InvalidInput(format!(
                    "stored signature of `{name}` doesn't match the model"
                )));
            }
        }

        if let Some(entry_point) = EntryPoint::ALL
            .into_iter()
            .find(|entry_point| !manifest.signatures.contains_key(entry_point.name()))
        {
            let name = entry_point.name();
            return Err(KiErr::InvalidInput(format!(
                "bundle is missing the `{name}` signature"
            )));
        }

        let model = variables::read(manifest.config, &dir.join(VARIABLES_FILE))?;
        info!("loaded model at step {} from {}", model.step(), dir.display());

        Ok(Self {
            model,
            signatures: manifest.signatures,
        })
    }

    /// Writes this model back to a bundle.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        export(&self.model, dir)
    }

    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.signatures.get(name)
    }

    pub fn signature_names(&self) -> impl Iterator<Item = &str> {
        self.signatures.keys().map(String::as_str)
    }

    /// Invokes an entry point by name.
    ///
    /// # Arguments
    /// * `name` - The entry point, `learn` or `predict`.
    /// * `inputs` - The named input tensors, checked against the entry point's signature.
    ///
    /// # Returns
    /// The named output tensors, or an error if the entry point doesn't exist, the inputs don't
    /// fulfill its signature or the computation fails.
    pub fn invoke(&mut self, name: &str, inputs: &TensorMap) -> Result<TensorMap> {
        let signature = self
            .signatures
            .get(name)
            .ok_or_else(|| KiErr::UnknownEntryPoint(name.to_string()))?;
        signature.check_inputs(inputs)?;
        debug!("invoking `{name}`");

        let mut outputs = TensorMap::new();
        match EntryPoint::from_name(name)? {
            EntryPoint::Learn => {
                let data = f32_input(inputs, "data")?;
                let labels = inputs
                    .get("labels")
                    .and_then(Tensor::as_i32)
                    .ok_or_else(|| KiErr::InvalidInput("missing input `labels`".to_string()))?
                    .into_dimensionality::<Ix1>()
                    .map_err(|e| KiErr::InvalidInput(e.to_string()))?;

                let output = self.model.learn(data, labels)?;
                outputs.insert("loss".to_string(), arr0(output.loss).into());
            }
            EntryPoint::Predict => {
                let data = f32_input(inputs, "data")?;

                let output = self.model.predict(data)?;
                outputs.insert("predictions".to_string(), output.predictions.into());
            }
        }

        Ok(outputs)
    }

    pub fn model(&self) -> &KillerInstinct {
        &self.model
    }

    pub fn into_model(self) -> KillerInstinct {
        self.model
    }
}

fn f32_input<'a>(inputs: &'a TensorMap, name: &str) -> Result<ArrayView2<'a, f32>> {
    inputs
        .get(name)
        .and_then(Tensor::as_f32)
        .ok_or_else(|| KiErr::InvalidInput(format!("missing input `{name}`")))?
        .into_dimensionality::<Ix2>()
        .map_err(|e| KiErr::InvalidInput(e.to_string()))
}
