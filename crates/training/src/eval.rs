//! Host batch -> tensor binding, and the reusable evaluation context.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use data_contracts::{TrackArray, TrackBatch};
use models::NetworkPlan;

use crate::error::{ScaffoldError, ScaffoldResult};

fn lookup<'a>(batch: &'a TrackBatch, track: &str) -> ScaffoldResult<&'a TrackArray> {
    batch.get(track).ok_or_else(|| ScaffoldError::MissingTrack {
        track: track.to_string(),
        available: batch.keys().cloned().collect(),
    })
}

/// `[b, channels, length, depth]` (or `[b, channels, length]` when depth is 1)
/// bound as `[b, depth, channels, length]`.
fn bind_modality<B: Backend>(
    track: &str,
    array: &TrackArray,
    declared: [usize; 3],
    samples: usize,
    device: &B::Device,
) -> ScaffoldResult<Tensor<B, 4>> {
    let [channels, length, depth] = declared;
    let shape = array.shape();
    let matches = shape[0] == samples
        && match shape.len() {
            3 => depth == 1 && shape[1..] == [channels, length],
            4 => shape[1..] == [channels, length, depth],
            _ => false,
        };
    if !matches {
        return Err(ScaffoldError::ShapeMismatch {
            track: track.to_string(),
            expected: format!("[{samples}, {channels}, {length}, {depth}]"),
            found: shape.to_vec(),
        });
    }
    let data = TensorData::new(array.values().to_vec(), [samples, channels, length, depth]);
    let tensor = Tensor::<B, 4>::from_data(data, device);
    Ok(if depth == 1 {
        tensor.reshape([samples, 1, channels, length])
    } else {
        tensor.permute([0, 3, 1, 2])
    })
}

/// `[b, width]`, trailing unit axes allowed.
fn check_target(track: &str, array: &TrackArray, width: usize, samples: usize) -> ScaffoldResult<()> {
    let shape = array.shape();
    let ok = shape.len() >= 2
        && shape[0] == samples
        && shape[1] == width
        && shape[2..].iter().all(|&d| d == 1);
    if ok {
        Ok(())
    } else {
        Err(ScaffoldError::ShapeMismatch {
            track: track.to_string(),
            expected: format!("[{samples}, {width}]"),
            found: shape.to_vec(),
        })
    }
}

/// Host-side target kept alongside its tensor for accuracy counting.
pub(crate) struct BoundTarget<B: Backend> {
    pub tensor: Tensor<B, 2>,
    pub values: Vec<f32>,
}

pub(crate) struct BoundBatch<B: Backend> {
    pub inputs: Vec<Tensor<B, 4>>,
    pub target: Option<BoundTarget<B>>,
    pub samples: usize,
}

/// Converts a host batch into network inputs, plus the target when `output_track` is
/// given. The sample count is taken from the first modality.
pub(crate) fn bind_batch<B: Backend>(
    plan: &NetworkPlan,
    input_shapes: &[[usize; 3]],
    batch: &TrackBatch,
    output_track: Option<&str>,
    device: &B::Device,
) -> ScaffoldResult<BoundBatch<B>> {
    let mut samples = None;
    let mut inputs = Vec::with_capacity(plan.modalities.len());
    for ((name, _), declared) in plan.modalities.iter().zip(input_shapes) {
        let array = lookup(batch, name)?;
        let n = *samples.get_or_insert(array.samples());
        if n == 0 {
            return Err(ScaffoldError::EmptyBatch);
        }
        inputs.push(bind_modality::<B>(name, array, *declared, n, device)?);
    }
    let samples = samples.ok_or(ScaffoldError::EmptyBatch)?;

    let target = match output_track {
        Some(track) => {
            let array = lookup(batch, track)?;
            check_target(track, array, plan.output_width, samples)?;
            let values = array.values().to_vec();
            let data = TensorData::new(values.clone(), [samples, plan.output_width]);
            Some(BoundTarget {
                tensor: Tensor::from_data(data, device),
                values,
            })
        }
        None => None,
    };
    Ok(BoundBatch {
        inputs,
        target,
        samples,
    })
}

/// Evaluation inputs bound once and reused across `test` / `predict` calls.
pub struct EvalContext<B: Backend> {
    pub(crate) inputs: Vec<Tensor<B, 4>>,
    pub(crate) target: Option<BoundTarget<B>>,
    samples: usize,
}

impl<B: Backend> EvalContext<B> {
    pub(crate) fn new(bound: BoundBatch<B>) -> Self {
        Self {
            inputs: bound.inputs,
            target: bound.target,
            samples: bound.samples,
        }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }
}

pub(crate) fn to_host<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> ScaffoldResult<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| ScaffoldError::Readback(format!("{e:?}")))
}
