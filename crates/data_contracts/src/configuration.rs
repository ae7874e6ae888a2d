//! Run configuration (`configurations.json`): known tracks plus the selected inputs/outputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::architecture::ArchitectureError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no architecture entry for input track {0}")]
    MissingArchitecture(String),
    #[error("no configured track carries any of the ids {0:?}")]
    UnknownTrackIds(Vec<String>),
    #[error("configuration selects no output track")]
    NoOutputs,
    #[error(transparent)]
    Architecture(#[from] ArchitectureError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSpec {
    pub id: String,
    /// Per-track metadata the training core does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(rename = "Inputs")]
    pub inputs: Vec<String>,
    #[serde(rename = "Outputs")]
    pub outputs: Vec<String>,
    #[serde(rename = "DataName")]
    pub data_name: String,
    #[serde(rename = "Strand", default, skip_serializing_if = "Option::is_none")]
    pub strand: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    #[serde(rename = "Tracks")]
    pub tracks: BTreeMap<String, TrackSpec>,
    #[serde(rename = "Options")]
    pub options: RunOptions,
}

impl RunConfiguration {
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

    /// Names of the tracks whose id appears in `ids_spec` (ids joined by `_`).
    pub fn tracks_with_ids(&self, ids_spec: &str) -> Result<Vec<String>, ConfigError> {
        let ids: Vec<&str> = ids_spec.split('_').filter(|s| !s.is_empty()).collect();
        let names: Vec<String> = self
            .tracks
            .iter()
            .filter(|(_, spec)| ids.contains(&spec.id.as_str()))
            .map(|(name, _)| name.clone())
            .collect();
        if names.is_empty() {
            return Err(ConfigError::UnknownTrackIds(
                ids.into_iter().map(str::to_string).collect(),
            ));
        }
        Ok(names)
    }

    pub fn override_inputs(&mut self, ids_spec: &str) -> Result<&[String], ConfigError> {
        self.options.inputs = self.tracks_with_ids(ids_spec)?;
        Ok(&self.options.inputs)
    }

    pub fn override_outputs(&mut self, ids_spec: &str) -> Result<&[String], ConfigError> {
        self.options.outputs = self.tracks_with_ids(ids_spec)?;
        Ok(&self.options.outputs)
    }

    /// The track the network predicts: the first configured output.
    pub fn output_track(&self) -> Result<&str, ConfigError> {
        self.options
            .outputs
            .first()
            .map(String::as_str)
            .ok_or(ConfigError::NoOutputs)
    }

    /// Inputs followed by outputs, without duplicates.
    pub fn all_tracks(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for key in self.options.inputs.iter().chain(self.options.outputs.iter()) {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }
}
