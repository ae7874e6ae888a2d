use std::path::PathBuf;

use burn::record::RecorderError;
use data_contracts::{ArchitectureError, ContractError};
use thiserror::Error;

pub type ScaffoldResult<T> = Result<T, ScaffoldError>;

#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error(transparent)]
    Architecture(#[from] ArchitectureError),
    #[error(
        "track `{track}` is not in the batch (available: {available:?}); \
         track names in the configuration file must match the keys of the data file"
    )]
    MissingTrack {
        track: String,
        available: Vec<String>,
    },
    #[error("track `{track}` has shape {found:?}, expected {expected}")]
    ShapeMismatch {
        track: String,
        expected: String,
        found: Vec<usize>,
    },
    #[error("batch has no samples")]
    EmptyBatch,
    #[error("evaluation context has no target for `{0}`")]
    NoTarget(String),
    #[error("unknown weight `{0}`")]
    UnknownWeight(String),
    #[error("unknown modality `{0}`")]
    UnknownModality(String),
    #[error("checkpoint error at {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: RecorderError,
    },
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
    #[error("tensor readback failed: {0}")]
    Readback(String),
    #[error(transparent)]
    Contract(#[from] ContractError),
}
