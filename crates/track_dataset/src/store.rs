//! In-memory track store loaded from `<data_dir>/<data_name>/<split>.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use data_contracts::{TrackArray, TrackBatch};
use tracing::info;

use crate::types::{DatasetError, DatasetResult};

/// Validation runs on at most this many leading samples.
pub const VALIDATION_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Validation,
}

impl Split {
    pub fn file_name(self) -> &'static str {
        match self {
            Split::Train => "train.json",
            Split::Validation => "validation.json",
        }
    }
}

/// Every track of one split; all tracks share the same sample count.
#[derive(Debug, Clone)]
pub struct TrackStore {
    tracks: BTreeMap<String, TrackArray>,
    samples: usize,
}

impl TrackStore {
    pub fn from_tracks(tracks: BTreeMap<String, TrackArray>) -> DatasetResult<Self> {
        let samples = match tracks.values().next() {
            Some(first) => first.samples(),
            None => return Err(DatasetError::Empty("track map".to_string())),
        };
        for (name, track) in &tracks {
            if track.samples() != samples {
                return Err(DatasetError::SampleCount {
                    track: name.clone(),
                    expected: samples,
                    found: track.samples(),
                });
            }
        }
        Ok(Self { tracks, samples })
    }

    pub fn from_path(path: &Path) -> DatasetResult<Self> {
        let bytes = fs::read(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tracks: BTreeMap<String, TrackArray> =
            serde_json::from_slice(&bytes).map_err(|source| DatasetError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        if tracks.is_empty() {
            return Err(DatasetError::Empty(path.display().to_string()));
        }
        let store = Self::from_tracks(tracks)?;
        info!(
            path = %path.display(),
            tracks = store.tracks.len(),
            samples = store.samples,
            "loaded track file"
        );
        Ok(store)
    }

    pub fn split_path(data_dir: &Path, data_name: &str, split: Split) -> PathBuf {
        data_dir.join(data_name).join(split.file_name())
    }

    pub fn load_split(data_dir: &Path, data_name: &str, split: Split) -> DatasetResult<Self> {
        Self::from_path(&Self::split_path(data_dir, data_name, split))
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn track_names(&self) -> impl Iterator<Item = &str> {
        self.tracks.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> DatasetResult<&TrackArray> {
        self.tracks
            .get(name)
            .ok_or_else(|| DatasetError::MissingTrack {
                track: name.to_string(),
                available: self.tracks.keys().cloned().collect(),
            })
    }

    /// Fails on the first name the data does not carry.
    pub fn require(&self, names: &[String]) -> DatasetResult<()> {
        for name in names {
            self.get(name)?;
        }
        Ok(())
    }

    /// The first `min(samples, limit)` samples of the named tracks.
    pub fn subset(&self, names: &[String], limit: usize) -> DatasetResult<Self> {
        let mut tracks = BTreeMap::new();
        for name in names {
            tracks.insert(name.clone(), self.get(name)?.head(limit));
        }
        Self::from_tracks(tracks)
    }

    /// Gather `indices` from each named track.
    pub fn gather(&self, names: &[String], indices: &[usize]) -> DatasetResult<TrackBatch> {
        let mut batch = TrackBatch::new();
        for name in names {
            batch.insert(name.clone(), self.get(name)?.select(indices)?);
        }
        Ok(batch)
    }

    /// The whole store as one batch.
    pub fn to_batch(&self) -> TrackBatch {
        self.tracks.clone()
    }
}
