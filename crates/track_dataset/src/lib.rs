//! Multi-modal track data for FIDDLE.
//!
//! - `TrackStore`: every track of one split held in memory, keyed by track name.
//! - `MultiModalBatcher`: endless, shuffled, fixed-size batches over a store.
//! - `select_probe_indices`: the handful of validation rows snapshotted during training.

pub mod batch;
pub mod probe;
pub mod store;
pub mod types;

pub use batch::MultiModalBatcher;
pub use probe::{select_probe_indices, DEFAULT_PROBE_COUNT};
pub use store::{Split, TrackStore, VALIDATION_LIMIT};
pub use types::{DatasetError, DatasetResult};
