//! Parameter initialization shared by every convolution in the network.

use burn::module::Param;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Standard deviation of the truncated-normal convolution kernels.
pub const CONV_INIT_STD: f64 = 0.01;
/// Scale of the L2 penalty on convolution kernels (`scale * sum(w^2) / 2`).
pub const L2_SCALE: f64 = 0.0005;

/// Seeded source for convolution kernels.
pub struct WeightInit {
    rng: StdRng,
}

impl WeightInit {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self { rng }
    }

    /// Normal(0, std) resampled until it lands within two standard deviations.
    fn truncated_normal(&mut self, std: f64) -> f32 {
        loop {
            let z: f64 = self.rng.sample(StandardNormal);
            if z.abs() <= 2.0 {
                return (z * std) as f32;
            }
        }
    }

    /// Valid-padding, unit-stride convolution with a truncated-normal kernel.
    pub fn conv2d<B: Backend>(
        &mut self,
        channels: [usize; 2],
        kernel: [usize; 2],
        device: &B::Device,
    ) -> Conv2d<B> {
        let mut conv = Conv2dConfig::new(channels, kernel)
            .with_stride([1, 1])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);
        let shape = [channels[1], channels[0], kernel[0], kernel[1]];
        let len = shape.iter().product();
        let values: Vec<f32> = (0..len)
            .map(|_| self.truncated_normal(CONV_INIT_STD))
            .collect();
        conv.weight = Param::from_tensor(Tensor::from_data(TensorData::new(values, shape), device));
        conv
    }
}

/// `L2_SCALE * sum(w^2) / 2` for one convolution kernel.
pub fn l2_penalty<B: Backend>(conv: &Conv2d<B>) -> Tensor<B, 1> {
    let w = conv.weight.val();
    (w.clone() * w).sum().mul_scalar(L2_SCALE / 2.0)
}
