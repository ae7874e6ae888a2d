use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::nn::pool::{AvgPool2d, AvgPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::init::{l2_penalty, WeightInit};
use crate::plan::ModalityPlan;

/// Per-modality feature extractor:
/// `[conv -> relu -> avg pool -> batch norm] x 2 -> flatten -> dropout -> fc`.
///
/// Input `[batch, depth, channels, length]`, output `[batch, fc_width]`.
#[derive(Module, Debug)]
pub struct ModalityNet<B: Backend> {
    pub(crate) conv1: Conv2d<B>,
    pool1: AvgPool2d,
    norm1: BatchNorm<B, 2>,
    pub(crate) conv2: Conv2d<B>,
    pool2: AvgPool2d,
    norm2: BatchNorm<B, 2>,
    dropout: Dropout,
    pub(crate) fc: Linear<B>,
}

impl<B: Backend> ModalityNet<B> {
    pub fn new(plan: &ModalityPlan, init: &mut WeightInit, device: &B::Device) -> Self {
        let pool = || {
            AvgPool2dConfig::new(plan.pool_window)
                .with_strides(plan.pool_stride)
                .init()
        };
        Self {
            conv1: init.conv2d([plan.in_depth, plan.filters[0]], plan.kernels[0], device),
            pool1: pool(),
            norm1: BatchNormConfig::new(plan.filters[0]).init(device),
            conv2: init.conv2d([plan.filters[0], plan.filters[1]], plan.kernels[1], device),
            pool2: pool(),
            norm2: BatchNormConfig::new(plan.filters[1]).init(device),
            dropout: DropoutConfig::new(1.0 - plan.keep_prob).init(),
            fc: LinearConfig::new(plan.flat_len, plan.fc_width).init(device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.conv1.forward(input));
        let x = self.norm1.forward(self.pool1.forward(x));
        let x = relu(self.conv2.forward(x));
        let x = self.norm2.forward(self.pool2.forward(x));
        let x: Tensor<B, 2> = x.flatten(1, 3);
        self.fc.forward(self.dropout.forward(x))
    }

    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        l2_penalty(&self.conv1) + l2_penalty(&self.conv2)
    }
}
