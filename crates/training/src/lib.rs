#![recursion_limit = "256"]

//! Training scaffold for the multi-modal track network: session lifecycle, objective,
//! evaluation, checkpoints, run logs and the command-line driver.

pub mod checkpoint;
pub mod error;
pub mod eval;
pub mod monitor;
pub mod objective;
pub mod scaffold;
pub mod trainer;
pub mod util;

pub use error::{ScaffoldError, ScaffoldResult};
pub use eval::EvalContext;
pub use monitor::{Monitor, ScalarSummary};
pub use scaffold::{
    EvalMetrics, RestorePlan, Scaffold, ScaffoldConfig, Session, StepMetrics,
    DEFAULT_LEARNING_RATE,
};
pub use trainer::{PeakLogSink, PredictionSink, TrainReport, Trainer, TrainerConfig};
pub use util::{run_train, TrainArgs};

/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;

pub type ADBackend = burn::backend::Autodiff<TrainBackend>;

/// Installs the `tracing` subscriber used by the binaries (`RUST_LOG`, default `info`).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
