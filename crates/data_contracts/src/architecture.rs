//! Network architecture schema: one entry per input modality.
//!
//! Field names follow the architecture JSON files used by existing runs
//! (`inputShape`, `numberOfFilters`, `FCwidth`, ...), so those files load unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::ConfigError;

/// Number of convolution blocks in every per-modality sub-network.
pub const CONV_LAYERS: usize = 2;

/// A 2D window (kernel, pooling window or stride) as `[height, width]`.
///
/// Scalars in JSON expand to square windows, matching how existing
/// configuration files spell `"pool_size": 3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Window {
    Square(usize),
    Rect([usize; 2]),
}

impl Window {
    pub fn dims(&self) -> [usize; 2] {
        match *self {
            Window::Square(k) => [k, k],
            Window::Rect(hw) => hw,
        }
    }

    pub fn height(&self) -> usize {
        self.dims()[0]
    }

    pub fn width(&self) -> usize {
        self.dims()[1]
    }

    fn has_zero(&self) -> bool {
        self.dims().contains(&0)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArchitectureError {
    #[error("architecture declares no input modalities")]
    Empty,
    #[error("modality {modality}: {field} must list {expected} entries, found {found}")]
    LayerCount {
        modality: String,
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("modality {modality}: {field} contains a zero dimension")]
    ZeroDimension {
        modality: String,
        field: &'static str,
    },
    #[error("modality {modality}: dropout keep-probability must be in (0, 1], got {value}")]
    KeepProb { modality: String, value: f64 },
    #[error("modality {modality}: outputWidth {found} differs from {expected} declared by other modalities")]
    MismatchedOutputWidth {
        modality: String,
        expected: usize,
        found: usize,
    },
    #[error("modality {modality}: FCwidth {found} differs from {expected}; fused modalities need a uniform FCwidth")]
    MismatchedFcWidth {
        modality: String,
        expected: usize,
        found: usize,
    },
    #[error("{scope}: feature map collapses at {stage} (input {height}x{width})")]
    Collapsed {
        scope: String,
        stage: &'static str,
        height: usize,
        width: usize,
    },
}

/// Architecture of a single modality's convolutional sub-network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityArchitecture {
    /// `(channels, length, depth)`; depth is 1 for every track type in use.
    #[serde(rename = "inputShape")]
    pub input_shape: [usize; 3],
    #[serde(rename = "outputWidth", deserialize_with = "scalar_or_singleton")]
    pub output_width: usize,
    #[serde(rename = "numberOfFilters")]
    pub filters: Vec<usize>,
    #[serde(rename = "filterSize")]
    pub filter_sizes: Vec<Window>,
    #[serde(rename = "pool_size")]
    pub pool_window: Window,
    pub pool_stride: Window,
    #[serde(rename = "FCwidth")]
    pub fc_width: usize,
    /// Keep-probability applied by dropout while training.
    #[serde(rename = "dropout")]
    pub keep_prob: f64,
}

impl ModalityArchitecture {
    pub fn channels(&self) -> usize {
        self.input_shape[0]
    }

    pub fn length(&self) -> usize {
        self.input_shape[1]
    }

    pub fn depth(&self) -> usize {
        self.input_shape[2]
    }

    /// Number of values in one sample of this modality.
    pub fn sample_len(&self) -> usize {
        self.input_shape.iter().product()
    }

    pub fn validate(&self, modality: &str) -> Result<(), ArchitectureError> {
        if self.filters.len() != CONV_LAYERS {
            return Err(ArchitectureError::LayerCount {
                modality: modality.to_string(),
                field: "numberOfFilters",
                expected: CONV_LAYERS,
                found: self.filters.len(),
            });
        }
        if self.filter_sizes.len() != CONV_LAYERS {
            return Err(ArchitectureError::LayerCount {
                modality: modality.to_string(),
                field: "filterSize",
                expected: CONV_LAYERS,
                found: self.filter_sizes.len(),
            });
        }
        let zero = |field: &'static str| ArchitectureError::ZeroDimension {
            modality: modality.to_string(),
            field,
        };
        if self.input_shape.contains(&0) {
            return Err(zero("inputShape"));
        }
        if self.output_width == 0 {
            return Err(zero("outputWidth"));
        }
        if self.filters.contains(&0) {
            return Err(zero("numberOfFilters"));
        }
        if self.filter_sizes.iter().any(Window::has_zero) {
            return Err(zero("filterSize"));
        }
        if self.pool_window.has_zero() {
            return Err(zero("pool_size"));
        }
        if self.pool_stride.has_zero() {
            return Err(zero("pool_stride"));
        }
        if self.fc_width == 0 {
            return Err(zero("FCwidth"));
        }
        if !(self.keep_prob > 0.0 && self.keep_prob <= 1.0) {
            return Err(ArchitectureError::KeepProb {
                modality: modality.to_string(),
                value: self.keep_prob,
            });
        }
        Ok(())
    }
}

/// Modality name -> sub-network architecture, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkArchitecture {
    modalities: BTreeMap<String, ModalityArchitecture>,
}

impl NetworkArchitecture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_modality(mut self, name: impl Into<String>, arch: ModalityArchitecture) -> Self {
        self.modalities.insert(name.into(), arch);
        self
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_vec_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.modalities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modalities.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ModalityArchitecture> {
        self.modalities.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modalities.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModalityArchitecture)> {
        self.modalities.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// First modality by name; supplies the scaffold-level pooling and head dropout.
    pub fn primary(&self) -> Option<(&str, &ModalityArchitecture)> {
        self.iter().next()
    }

    /// Keep only the listed modalities; every name must have an entry.
    pub fn restrict_to(&self, names: &[String]) -> Result<Self, ConfigError> {
        let mut modalities = BTreeMap::new();
        for name in names {
            let arch = self
                .modalities
                .get(name)
                .ok_or_else(|| ConfigError::MissingArchitecture(name.clone()))?;
            modalities.insert(name.clone(), arch.clone());
        }
        Ok(Self { modalities })
    }

    /// Replace every modality's training keep-probability.
    pub fn set_keep_prob(&mut self, keep_prob: f64) {
        for arch in self.modalities.values_mut() {
            arch.keep_prob = keep_prob;
        }
    }

    /// Per-entry checks plus the cross-modality invariants the fused network relies on.
    pub fn validate(&self) -> Result<(), ArchitectureError> {
        let (_, first) = self.primary().ok_or(ArchitectureError::Empty)?;
        for (name, arch) in self.iter() {
            arch.validate(name)?;
            if arch.output_width != first.output_width {
                return Err(ArchitectureError::MismatchedOutputWidth {
                    modality: name.to_string(),
                    expected: first.output_width,
                    found: arch.output_width,
                });
            }
            if arch.fc_width != first.fc_width {
                return Err(ArchitectureError::MismatchedFcWidth {
                    modality: name.to_string(),
                    expected: first.fc_width,
                    found: arch.fc_width,
                });
            }
        }
        Ok(())
    }

    pub fn output_width(&self) -> Option<usize> {
        self.primary().map(|(_, arch)| arch.output_width)
    }
}

fn scalar_or_singleton<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Scalar(usize),
        Singleton([usize; 1]),
    }
    Ok(match Repr::deserialize(deserializer)? {
        Repr::Scalar(v) | Repr::Singleton([v]) => v,
    })
}
