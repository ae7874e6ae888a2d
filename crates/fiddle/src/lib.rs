//! FIDDLE umbrella crate: re-export the workspace crates with feature wiring.

#[cfg(feature = "data-contracts")]
pub use data_contracts;

#[cfg(feature = "models")]
pub use models;

#[cfg(feature = "track-dataset")]
pub use track_dataset;

#[cfg(feature = "training")]
pub use training;

/// The types most runs touch.
#[cfg(all(
    feature = "data-contracts",
    feature = "models",
    feature = "track-dataset",
    feature = "training"
))]
pub mod prelude {
    pub use data_contracts::{NetworkArchitecture, RunConfiguration, TrackArray, TrackBatch};
    pub use models::{FiddleNet, WeightKey};
    pub use track_dataset::{MultiModalBatcher, TrackStore};
    pub use training::{
        EvalContext, EvalMetrics, RestorePlan, Scaffold, ScaffoldConfig, Session, StepMetrics,
    };
}
