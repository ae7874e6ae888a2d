use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::fusion::FusionStage;

/// Dropout, a linear map to the output width, then a softmax over bins.
#[derive(Module, Debug)]
pub struct OutputHead<B: Backend> {
    dropout: Dropout,
    pub(crate) fc: Linear<B>,
}

impl<B: Backend> OutputHead<B> {
    pub fn new(input: usize, output: usize, keep_prob: f64, device: &B::Device) -> Self {
        Self {
            dropout: DropoutConfig::new(1.0 - keep_prob).init(),
            fc: LinearConfig::new(input, output).init(device),
        }
    }

    pub fn forward(&self, fused: Tensor<B, 2>) -> Tensor<B, 2> {
        softmax(self.fc.forward(self.dropout.forward(fused)), 1)
    }
}

/// Everything downstream of the modality embeddings; checkpointed as one record.
#[derive(Module, Debug)]
pub struct ScaffoldHead<B: Backend> {
    pub(crate) fusion: Option<FusionStage<B>>,
    pub(crate) output: OutputHead<B>,
}

impl<B: Backend> ScaffoldHead<B> {
    pub fn new(fusion: Option<FusionStage<B>>, output: OutputHead<B>) -> Self {
        Self { fusion, output }
    }

    pub fn has_fusion(&self) -> bool {
        self.fusion.is_some()
    }

    /// `embeddings` holds one tensor per modality, at least one.
    /// With a single modality the embedding passes through unchanged.
    pub fn fuse(&self, mut embeddings: Vec<Tensor<B, 2>>) -> Tensor<B, 2> {
        match &self.fusion {
            Some(stage) => stage.forward(FusionStage::stack(embeddings)),
            None => embeddings.remove(0),
        }
    }

    pub fn forward(&self, embeddings: Vec<Tensor<B, 2>>) -> Tensor<B, 2> {
        self.output.forward(self.fuse(embeddings))
    }
}
