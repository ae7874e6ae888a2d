//! Addressable weight tensors for inspection and monitoring.
//!
//! Keys read as paths: `modality/<name>/conv1`, `modality/<name>/conv2`,
//! `modality/<name>/fc`, `fusion/conv` and `output/fc`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModalityLayer {
    Conv1,
    Conv2,
    Fc,
}

impl ModalityLayer {
    fn as_str(self) -> &'static str {
        match self {
            ModalityLayer::Conv1 => "conv1",
            ModalityLayer::Conv2 => "conv2",
            ModalityLayer::Fc => "fc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WeightKey {
    Modality { name: String, layer: ModalityLayer },
    FusionConv,
    OutputFc,
}

impl WeightKey {
    pub fn modality(name: impl Into<String>, layer: ModalityLayer) -> Self {
        WeightKey::Modality {
            name: name.into(),
            layer,
        }
    }
}

impl fmt::Display for WeightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightKey::Modality { name, layer } => write!(f, "modality/{name}/{}", layer.as_str()),
            WeightKey::FusionConv => f.write_str("fusion/conv"),
            WeightKey::OutputFc => f.write_str("output/fc"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognized weight key `{0}`")]
pub struct ParseWeightKeyError(pub String);

impl FromStr for WeightKey {
    type Err = ParseWeightKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let key = match parts.as_slice() {
            ["fusion", "conv"] => WeightKey::FusionConv,
            ["output", "fc"] => WeightKey::OutputFc,
            ["modality", name, layer] if !name.is_empty() => {
                let layer = match *layer {
                    "conv1" => ModalityLayer::Conv1,
                    "conv2" => ModalityLayer::Conv2,
                    "fc" => ModalityLayer::Fc,
                    _ => return Err(ParseWeightKeyError(s.to_string())),
                };
                WeightKey::modality(*name, layer)
            }
            _ => return Err(ParseWeightKeyError(s.to_string())),
        };
        Ok(key)
    }
}
