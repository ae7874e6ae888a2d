//! Burn modules for the multi-modal track network.
//!
//! - `ModalityNet`: two conv/pool/norm stages and a fully-connected embedding per input track.
//! - `FusionStage`: convolution across the stacked modality embeddings.
//! - `OutputHead`: dropout, linear map and softmax over the output bins.
//! - `FiddleNet`: the assembled network, built from a `NetworkArchitecture` via `FiddleNetConfig`.
//!
//! Shapes are resolved up front by [`plan`], so a bad architecture fails before any
//! parameter is allocated. Training, losses and checkpoints live in the `training` crate.

pub mod fusion;
pub mod head;
pub mod init;
pub mod modality;
pub mod network;
pub mod plan;
pub mod weights;

pub use fusion::FusionStage;
pub use head::{OutputHead, ScaffoldHead};
pub use init::{l2_penalty, WeightInit, CONV_INIT_STD, L2_SCALE};
pub use modality::ModalityNet;
pub use network::{FiddleNet, FiddleNetConfig};
pub use plan::{FusionPlan, ModalityPlan, NetworkPlan, FUSION_FILTERS, FUSION_KERNEL_WIDTH};
pub use weights::{ModalityLayer, ParseWeightKeyError, WeightKey};

pub mod prelude {
    pub use super::{FiddleNet, FiddleNetConfig, ModalityNet, WeightKey};
}
