//! Host-side track arrays exchanged between data loading, the scaffold and artifact writers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("shape {shape:?} needs {expected} values, found {found}")]
    ValueCount {
        shape: Vec<usize>,
        expected: usize,
        found: usize,
    },
    #[error("track arrays need a leading sample axis")]
    Scalar,
    #[error("sample index {index} out of range for {samples} samples")]
    IndexOutOfRange { index: usize, samples: usize },
}

#[derive(Deserialize)]
struct RawTrackArray {
    shape: Vec<usize>,
    values: Vec<f32>,
}

/// Dense row-major `f32` array whose first axis indexes samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrackArray")]
pub struct TrackArray {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl TryFrom<RawTrackArray> for TrackArray {
    type Error = ContractError;

    fn try_from(raw: RawTrackArray) -> Result<Self, Self::Error> {
        TrackArray::new(raw.shape, raw.values)
    }
}

impl TrackArray {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Result<Self, ContractError> {
        if shape.is_empty() {
            return Err(ContractError::Scalar);
        }
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(ContractError::ValueCount {
                shape,
                expected,
                found: values.len(),
            });
        }
        Ok(Self { shape, values })
    }

    pub fn zeros(shape: Vec<usize>) -> Result<Self, ContractError> {
        let len = shape.iter().product();
        Self::new(shape, vec![0.0; len])
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    pub fn samples(&self) -> usize {
        self.shape[0]
    }

    /// Values per sample (product of the non-sample axes).
    pub fn sample_len(&self) -> usize {
        self.shape[1..].iter().product()
    }

    pub fn row(&self, index: usize) -> Result<&[f32], ContractError> {
        if index >= self.samples() {
            return Err(ContractError::IndexOutOfRange {
                index,
                samples: self.samples(),
            });
        }
        let len = self.sample_len();
        Ok(&self.values[index * len..(index + 1) * len])
    }

    /// Gather the given samples, in order.
    pub fn select(&self, indices: &[usize]) -> Result<Self, ContractError> {
        let mut values = Vec::with_capacity(indices.len() * self.sample_len());
        for &index in indices {
            values.extend_from_slice(self.row(index)?);
        }
        let mut shape = self.shape.clone();
        shape[0] = indices.len();
        Self::new(shape, values)
    }

    /// First `n` samples (all of them when fewer are available).
    pub fn head(&self, n: usize) -> Self {
        let n = n.min(self.samples());
        let mut shape = self.shape.clone();
        shape[0] = n;
        Self {
            shape,
            values: self.values[..n * self.sample_len()].to_vec(),
        }
    }

    /// Total signal per sample.
    pub fn row_sums(&self) -> Vec<f32> {
        let len = self.sample_len().max(1);
        self.values.chunks(len).map(|row| row.iter().sum()).collect()
    }
}

/// Track name -> batch array; inputs and outputs travel together.
pub type TrackBatch = BTreeMap<String, TrackArray>;

/// Output track name -> predicted distribution, handed to artifact writers and plot sinks.
pub type PredictionArtifact = BTreeMap<String, TrackArray>;
