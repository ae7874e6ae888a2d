use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::nn::pool::{AvgPool2d, AvgPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::init::{l2_penalty, WeightInit};
use crate::plan::{FusionPlan, FUSION_FILTERS};

/// Cross-modality stage. The per-modality embeddings are stacked into a one-channel
/// `[N, fc_width]` map and convolved with a kernel spanning all `N` rows.
#[derive(Module, Debug)]
pub struct FusionStage<B: Backend> {
    pub(crate) conv: Conv2d<B>,
    pool: AvgPool2d,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> FusionStage<B> {
    pub fn new(plan: &FusionPlan, init: &mut WeightInit, device: &B::Device) -> Self {
        Self {
            conv: init.conv2d([1, FUSION_FILTERS], plan.kernel, device),
            pool: AvgPool2dConfig::new(plan.pool_window)
                .with_strides(plan.pool_stride)
                .init(),
            norm: BatchNormConfig::new(FUSION_FILTERS).init(device),
        }
    }

    /// `N x [batch, fc]` -> `[batch, N, fc]`, row `i` holding modality `i`.
    pub fn stack(embeddings: Vec<Tensor<B, 2>>) -> Tensor<B, 3> {
        let rows = embeddings
            .into_iter()
            .map(|e| e.unsqueeze_dim::<3>(1))
            .collect::<Vec<_>>();
        Tensor::cat(rows, 1)
    }

    /// `[batch, N, fc]` -> `[batch, fused_width]`.
    pub fn forward(&self, stacked: Tensor<B, 3>) -> Tensor<B, 2> {
        let x: Tensor<B, 4> = stacked.unsqueeze_dim(1);
        let x = relu(self.conv.forward(x));
        let x = self.norm.forward(self.pool.forward(x));
        x.flatten(1, 3)
    }

    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        l2_penalty(&self.conv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;
    use data_contracts::Window;

    type TestBackend = NdArray<f32>;

    #[test]
    fn stack_keeps_modality_rows() {
        let device = Default::default();
        let a = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0], [2, 2]),
            &device,
        );
        let b = a.clone().mul_scalar(10.0);
        let stacked = FusionStage::stack(vec![a, b]);
        assert_eq!(stacked.dims(), [2, 2, 2]);
        let values = stacked.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![1.0, 2.0, 10.0, 20.0, 3.0, 4.0, 30.0, 40.0]);
    }

    #[test]
    fn fuses_to_planned_width() {
        let device = Default::default();
        let plan = FusionPlan::new(3, 32, Window::Rect([1, 2]), Window::Rect([1, 2])).unwrap();
        let stage = FusionStage::<TestBackend>::new(&plan, &mut WeightInit::new(Some(0)), &device);
        let out = stage.forward(Tensor::ones([4, 3, 32], &device));
        assert_eq!(out.dims(), [4, plan.flat_len]);
    }
}
