use burn::module::{Ignored, Module};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use data_contracts::{ArchitectureError, NetworkArchitecture};

use crate::fusion::FusionStage;
use crate::head::{OutputHead, ScaffoldHead};
use crate::init::WeightInit;
use crate::modality::ModalityNet;
use crate::plan::NetworkPlan;
use crate::weights::{ModalityLayer, WeightKey};

#[derive(Debug, Clone)]
pub struct FiddleNetConfig {
    pub architecture: NetworkArchitecture,
    /// Seed for convolution kernels; `None` draws from the OS.
    pub seed: Option<u64>,
}

impl FiddleNetConfig {
    pub fn new(architecture: NetworkArchitecture) -> Self {
        Self {
            architecture,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn plan(&self) -> Result<NetworkPlan, ArchitectureError> {
        NetworkPlan::new(&self.architecture)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<FiddleNet<B>, ArchitectureError> {
        let plan = self.plan()?;
        let mut weights = WeightInit::new(self.seed);
        let modalities = plan
            .modalities
            .iter()
            .map(|(_, m)| ModalityNet::new(m, &mut weights, device))
            .collect();
        let fusion = plan
            .fusion
            .as_ref()
            .map(|f| FusionStage::new(f, &mut weights, device));
        let output = OutputHead::new(
            plan.fused_width,
            plan.output_width,
            plan.head_keep_prob,
            device,
        );
        Ok(FiddleNet {
            modalities,
            head: ScaffoldHead::new(fusion, output),
            names: Ignored(plan.modality_names().map(str::to_string).collect()),
        })
    }
}

/// Multi-modal network: one [`ModalityNet`] per input track (name order), then a
/// [`ScaffoldHead`] holding the optional [`FusionStage`] and the softmax [`OutputHead`].
#[derive(Module, Debug)]
pub struct FiddleNet<B: Backend> {
    modalities: Vec<ModalityNet<B>>,
    head: ScaffoldHead<B>,
    names: Ignored<Vec<String>>,
}

impl<B: Backend> FiddleNet<B> {
    pub fn modality_names(&self) -> &[String] {
        &self.names.0
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.names.0.iter().position(|n| n == name)
    }

    pub fn modality(&self, name: &str) -> Option<&ModalityNet<B>> {
        self.index_of(name).map(|i| &self.modalities[i])
    }

    /// Swap in a modality sub-network, leaving every other parameter untouched.
    /// Returns `false` when no modality has that name.
    pub fn replace_modality(&mut self, name: &str, net: ModalityNet<B>) -> bool {
        match self.index_of(name) {
            Some(i) => {
                self.modalities[i] = net;
                true
            }
            None => false,
        }
    }

    pub fn head(&self) -> &ScaffoldHead<B> {
        &self.head
    }

    pub fn replace_head(&mut self, head: ScaffoldHead<B>) {
        self.head = head;
    }

    /// Per-modality embeddings `[batch, fc_width]`; `inputs` follow [`Self::modality_names`].
    pub fn embed(&self, inputs: Vec<Tensor<B, 4>>) -> Vec<Tensor<B, 2>> {
        self.modalities
            .iter()
            .zip(inputs)
            .map(|(net, x)| net.forward(x))
            .collect()
    }

    /// With a single modality the embedding passes through unchanged.
    pub fn fuse(&self, embeddings: Vec<Tensor<B, 2>>) -> Tensor<B, 2> {
        self.head.fuse(embeddings)
    }

    /// Predicted distribution `[batch, output_width]`, rows summing to one.
    pub fn forward(&self, inputs: Vec<Tensor<B, 4>>) -> Tensor<B, 2> {
        self.head.forward(self.embed(inputs))
    }

    /// Sum of the L2 penalties of every convolution kernel.
    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        let mut terms = self.modalities.iter().map(ModalityNet::l2_penalty);
        let first = terms.next();
        let total = terms.fold(first, |acc, t| acc.map(|a| a + t));
        let fusion = self.head.fusion.as_ref().map(FusionStage::l2_penalty);
        match (total, fusion) {
            (Some(a), Some(b)) => a + b,
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => Tensor::zeros([1], &self.head.output.fc.weight.val().device()),
        }
    }

    /// Current values of the addressed weight, or `None` when the key names
    /// nothing in this network.
    pub fn weight(&self, key: &WeightKey) -> Option<TensorData> {
        match key {
            WeightKey::Modality { name, layer } => {
                let net = self.modality(name)?;
                let data = match layer {
                    ModalityLayer::Conv1 => net.conv1.weight.val().into_data(),
                    ModalityLayer::Conv2 => net.conv2.weight.val().into_data(),
                    ModalityLayer::Fc => net.fc.weight.val().into_data(),
                };
                Some(data)
            }
            WeightKey::FusionConv => self
                .head
                .fusion
                .as_ref()
                .map(|f| f.conv.weight.val().into_data()),
            WeightKey::OutputFc => Some(self.head.output.fc.weight.val().into_data()),
        }
    }
}
