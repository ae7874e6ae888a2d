//! Shared data contracts: network architecture, run configuration and track arrays.

pub mod architecture;
pub mod configuration;
pub mod tracks;

pub use architecture::{
    ArchitectureError, ModalityArchitecture, NetworkArchitecture, Window, CONV_LAYERS,
};
pub use configuration::{ConfigError, RunConfiguration, RunOptions, TrackSpec};
pub use tracks::{ContractError, PredictionArtifact, TrackArray, TrackBatch};
