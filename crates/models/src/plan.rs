//! Static shape planning. Burn layers need their input widths at construction, so every
//! spatial size is resolved (and checked) before any parameter is allocated.

use data_contracts::{ArchitectureError, ModalityArchitecture, NetworkArchitecture, Window};

/// Filters in the cross-modality convolution.
pub const FUSION_FILTERS: usize = 40;
/// Width of the cross-modality convolution kernel; its height spans all modalities.
pub const FUSION_KERNEL_WIDTH: usize = 10;

/// `[height, width]` of a feature map.
pub type Extent = [usize; 2];

fn conv_valid(
    scope: &str,
    stage: &'static str,
    input: Extent,
    kernel: Extent,
) -> Result<Extent, ArchitectureError> {
    if kernel[0] > input[0] || kernel[1] > input[1] {
        return Err(ArchitectureError::Collapsed {
            scope: scope.to_string(),
            stage,
            height: input[0],
            width: input[1],
        });
    }
    Ok([input[0] - kernel[0] + 1, input[1] - kernel[1] + 1])
}

fn pool_valid(
    scope: &str,
    stage: &'static str,
    input: Extent,
    window: Extent,
    stride: Extent,
) -> Result<Extent, ArchitectureError> {
    if window[0] > input[0] || window[1] > input[1] {
        return Err(ArchitectureError::Collapsed {
            scope: scope.to_string(),
            stage,
            height: input[0],
            width: input[1],
        });
    }
    Ok([
        (input[0] - window[0]) / stride[0] + 1,
        (input[1] - window[1]) / stride[1] + 1,
    ])
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModalityPlan {
    /// Input channels of the first convolution (the declared depth).
    pub in_depth: usize,
    pub input: Extent,
    pub filters: [usize; 2],
    pub kernels: [Extent; 2],
    pub pool_window: Extent,
    pub pool_stride: Extent,
    /// Feature map after the second pooling stage.
    pub pooled: Extent,
    /// Flattened width fed to the fully-connected layer.
    pub flat_len: usize,
    pub fc_width: usize,
    pub keep_prob: f64,
}

impl ModalityPlan {
    pub fn new(name: &str, arch: &ModalityArchitecture) -> Result<Self, ArchitectureError> {
        arch.validate(name)?;
        let input = [arch.channels(), arch.length()];
        let kernels = [arch.filter_sizes[0].dims(), arch.filter_sizes[1].dims()];
        let window = arch.pool_window.dims();
        let stride = arch.pool_stride.dims();

        let x = conv_valid(name, "conv1", input, kernels[0])?;
        let x = pool_valid(name, "pool1", x, window, stride)?;
        let x = conv_valid(name, "conv2", x, kernels[1])?;
        let pooled = pool_valid(name, "pool2", x, window, stride)?;

        Ok(Self {
            in_depth: arch.depth(),
            input,
            filters: [arch.filters[0], arch.filters[1]],
            kernels,
            pool_window: window,
            pool_stride: stride,
            pooled,
            flat_len: arch.filters[1] * pooled[0] * pooled[1],
            fc_width: arch.fc_width,
            keep_prob: arch.keep_prob,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusionPlan {
    pub modalities: usize,
    pub fc_width: usize,
    pub kernel: Extent,
    pub pool_window: Extent,
    pub pool_stride: Extent,
    pub pooled: Extent,
    pub flat_len: usize,
}

impl FusionPlan {
    /// Pooling runs along the feature axis only; after the modality-spanning
    /// convolution the map is one row high.
    pub fn new(
        modalities: usize,
        fc_width: usize,
        pool_window: Window,
        pool_stride: Window,
    ) -> Result<Self, ArchitectureError> {
        let scope = "fusion";
        let kernel = [modalities, FUSION_KERNEL_WIDTH];
        let window = [1, pool_window.width()];
        let stride = [1, pool_stride.width()];
        let x = conv_valid(scope, "conv", [modalities, fc_width], kernel)?;
        let pooled = pool_valid(scope, "pool", x, window, stride)?;
        Ok(Self {
            modalities,
            fc_width,
            kernel,
            pool_window: window,
            pool_stride: stride,
            pooled,
            flat_len: FUSION_FILTERS * pooled[0] * pooled[1],
        })
    }
}

/// Resolved shapes for the whole network, modalities in name order.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkPlan {
    pub modalities: Vec<(String, ModalityPlan)>,
    pub fusion: Option<FusionPlan>,
    pub fused_width: usize,
    pub output_width: usize,
    pub head_keep_prob: f64,
}

impl NetworkPlan {
    pub fn new(arch: &NetworkArchitecture) -> Result<Self, ArchitectureError> {
        arch.validate()?;
        let (_, primary) = arch.primary().ok_or(ArchitectureError::Empty)?;

        let mut modalities = Vec::with_capacity(arch.len());
        for (name, entry) in arch.iter() {
            modalities.push((name.to_string(), ModalityPlan::new(name, entry)?));
        }

        let fusion = if modalities.len() > 1 {
            Some(FusionPlan::new(
                modalities.len(),
                primary.fc_width,
                primary.pool_window,
                primary.pool_stride,
            )?)
        } else {
            None
        };
        let fused_width = fusion
            .as_ref()
            .map(|f| f.flat_len)
            .unwrap_or(primary.fc_width);

        Ok(Self {
            modalities,
            fusion,
            fused_width,
            output_width: primary.output_width,
            head_keep_prob: primary.keep_prob,
        })
    }

    pub fn modality_names(&self) -> impl Iterator<Item = &str> {
        self.modalities.iter().map(|(name, _)| name.as_str())
    }
}
