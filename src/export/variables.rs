use std::{fs, path::Path};

use safetensors::{Dtype, SafeTensorError, SafeTensors, serialize_to_file, tensor::TensorView};

use crate::{
    KiErr, KillerInstinct, KillerInstinctConfig, LAYER_DIMS, Result, optimization::AdamState,
};

const GLOBAL_STEP: &str = "global_step";
const OPTIMIZER_M: &str = "optimizer.m";
const OPTIMIZER_V: &str = "optimizer.v";
const OPTIMIZER_BETA_POWERS: &str = "optimizer.beta_powers";

fn kernel_name(layer: usize) -> String {
    format!("dense_{layer}.kernel")
}

fn bias_name(layer: usize) -> String {
    format!("dense_{layer}.bias")
}

/// A tensor waiting to be written, owns its bytes so `TensorView`s can borrow them.
struct Entry {
    name: String,
    dtype: Dtype,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl Entry {
    fn f32(name: impl Into<String>, shape: Vec<usize>, values: &[f32]) -> Self {
        Self {
            name: name.into(),
            dtype: Dtype::F32,
            shape,
            data: bytemuck::cast_slice(values).to_vec(),
        }
    }
}

/// Writes the model's parameters, optimizer state and step counter to a safetensors file.
pub(super) fn write(model: &KillerInstinct, path: &Path) -> Result<()> {
    let mut entries = Vec::new();

    let mut rest = model.params();
    for (i, layer) in model.layers().iter().enumerate() {
        let (fan_in, fan_out) = layer.dim();
        let (kernel, tail) = rest.split_at(layer.kernel_size());
        let (bias, tail) = tail.split_at(fan_out);

        entries.push(Entry::f32(kernel_name(i), vec![fan_in, fan_out], kernel));
        entries.push(Entry::f32(bias_name(i), vec![fan_out], bias));
        rest = tail;
    }

    let state = model.optimizer_state();
    entries.push(Entry::f32(OPTIMIZER_M, vec![state.len()], &state.m));
    entries.push(Entry::f32(OPTIMIZER_V, vec![state.len()], &state.v));
    entries.push(Entry::f32(
        OPTIMIZER_BETA_POWERS,
        vec![2],
        &[state.beta1_t, state.beta2_t],
    ));
    entries.push(Entry {
        name: GLOBAL_STEP.to_string(),
        dtype: Dtype::U64,
        shape: vec![1],
        data: bytemuck::bytes_of(&model.step()).to_vec(),
    });

    let views = entries
        .iter()
        .map(|entry| {
            let view = TensorView::new(entry.dtype, entry.shape.clone(), &entry.data)?;
            Ok((entry.name.clone(), view))
        })
        .collect::<std::result::Result<Vec<_>, SafeTensorError>>()?;

    serialize_to_file(views, &None, path)?;
    Ok(())
}

/// Reads a safetensors file written by `write` back into a model.
pub(super) fn read(config: KillerInstinctConfig, path: &Path) -> Result<KillerInstinct> {
    let bytes = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&bytes)?;

    let mut params = Vec::new();
    for (i, &(fan_in, fan_out)) in LAYER_DIMS.iter().enumerate() {
        params.extend(read_f32(&tensors, &kernel_name(i), &[fan_in, fan_out])?);
        params.extend(read_f32(&tensors, &bias_name(i), &[fan_out])?);
    }

    let len = params.len();
    let m = read_f32(&tensors, OPTIMIZER_M, &[len])?;
    let v = read_f32(&tensors, OPTIMIZER_V, &[len])?;
    let beta_powers = read_f32(&tensors, OPTIMIZER_BETA_POWERS, &[2])?;
    let state = AdamState {
        m: m.into_boxed_slice(),
        v: v.into_boxed_slice(),
        beta1_t: beta_powers[0],
        beta2_t: beta_powers[1],
    };

    let step = read_step(&tensors)?;
    KillerInstinct::from_parts(config, params, state, step)
}

fn stored<'a>(
    tensors: &SafeTensors<'a>,
    name: &str,
    dtype: Dtype,
    shape: &[usize],
) -> Result<TensorView<'a>> {
    let view = tensors
        .tensor(name)
        .map_err(|_| KiErr::MissingTensor(name.to_string()))?;

    if view.dtype() != dtype {
        return Err(KiErr::InvalidInput(format!(
            "stored tensor `{name}` must be {dtype:?}, got {:?}",
            view.dtype()
        )));
    }

    if view.shape() != shape {
        return Err(KiErr::InvalidInput(format!(
            "stored tensor `{name}` must have shape {shape:?}, got {:?}",
            view.shape()
        )));
    }

    Ok(view)
}

fn read_f32(tensors: &SafeTensors<'_>, name: &str, shape: &[usize]) -> Result<Vec<f32>> {
    let view = stored(tensors, name, Dtype::F32, shape)?;
    Ok(bytemuck::pod_collect_to_vec(view.data()))
}

fn read_step(tensors: &SafeTensors<'_>) -> Result<u64> {
    let view = stored(tensors, GLOBAL_STEP, Dtype::U64, &[1])?;
    let step: Vec<u64> = bytemuck::pod_collect_to_vec(view.data());
    Ok(step[0])
}
