//! Error types for track_dataset.

use data_contracts::ContractError;
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(
        "track `{track}` is not in the data (available: {available:?}); \
         track names in the configuration file must match the keys of the data file"
    )]
    MissingTrack {
        track: String,
        available: Vec<String>,
    },
    #[error("track `{track}` has {found} samples, expected {expected}")]
    SampleCount {
        track: String,
        expected: usize,
        found: usize,
    },
    #[error("nothing to read: {0} is empty")]
    Empty(String),
    #[error("batch size must be positive")]
    ZeroBatch,
    #[error(transparent)]
    Contract(#[from] ContractError),
}
