//! The training scaffold: a validated network description (`Scaffold`) and the live
//! numerical state built from it (`Session`).
//!
//! `Scaffold::new` resolves every shape; `Scaffold::initialize` allocates parameters
//! (fresh, or partly restored from per-modality checkpoints) and hands back a `Session`
//! that trains, evaluates, predicts, inspects weights and writes checkpoints until it is
//! closed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use burn::module::{AutodiffModule, Module};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::TensorData;
use data_contracts::{NetworkArchitecture, PredictionArtifact, TrackArray, TrackBatch};
use models::{FiddleNet, FiddleNetConfig, ModalityLayer, NetworkPlan, WeightKey};
use serde::Serialize;
use tracing::{debug, info};

use crate::checkpoint;
use crate::error::{ScaffoldError, ScaffoldResult};
use crate::eval::{bind_batch, to_host, EvalContext};
use crate::monitor::{Monitor, ScalarSummary};
use crate::objective::{bucketed_accuracy, kl_divergence};

pub const DEFAULT_LEARNING_RATE: f64 = 0.001;

#[derive(Debug, Clone)]
pub struct ScaffoldConfig {
    pub architecture: NetworkArchitecture,
    /// Track the network predicts.
    pub output_track: String,
    pub learning_rate: f64,
    pub seed: Option<u64>,
}

impl ScaffoldConfig {
    pub fn new(architecture: NetworkArchitecture, output_track: impl Into<String>) -> Self {
        Self {
            architecture,
            output_track: output_track.into(),
            learning_rate: DEFAULT_LEARNING_RATE,
            seed: None,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Modality name -> checkpoint directory to restore it from.
#[derive(Debug, Clone, Default)]
pub struct RestorePlan {
    entries: BTreeMap<String, PathBuf>,
}

impl RestorePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, modality: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.entries.insert(modality.into(), dir.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(name, dir)| (name.as_str(), dir.as_path()))
    }
}

/// Result of one optimizer step. `accuracy` counts rows, not a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepMetrics {
    pub loss: f32,
    pub accuracy: usize,
    pub step: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvalMetrics {
    pub loss: f32,
    pub accuracy: usize,
    pub samples: usize,
}

impl EvalMetrics {
    pub fn summary(&self) -> ScalarSummary {
        ScalarSummary {
            loss: self.loss as f64,
            accuracy: if self.samples == 0 {
                0.0
            } else {
                self.accuracy as f64 / self.samples as f64
            },
        }
    }
}

/// Uninitialized state: architecture validated, shapes resolved, no parameters.
#[derive(Debug, Clone)]
pub struct Scaffold {
    config: ScaffoldConfig,
    plan: NetworkPlan,
    input_shapes: Vec<[usize; 3]>,
}

impl Scaffold {
    pub fn new(config: ScaffoldConfig) -> ScaffoldResult<Self> {
        let plan = NetworkPlan::new(&config.architecture)?;
        let input_shapes = config
            .architecture
            .iter()
            .map(|(_, arch)| arch.input_shape)
            .collect();
        debug!(
            modalities = plan.modalities.len(),
            fused_width = plan.fused_width,
            output_width = plan.output_width,
            "resolved network plan"
        );
        Ok(Self {
            config,
            plan,
            input_shapes,
        })
    }

    pub fn architecture(&self) -> &NetworkArchitecture {
        &self.config.architecture
    }

    pub fn plan(&self) -> &NetworkPlan {
        &self.plan
    }

    pub fn output_track(&self) -> &str {
        &self.config.output_track
    }

    pub fn input_tracks(&self) -> Vec<String> {
        self.plan.modality_names().map(str::to_string).collect()
    }

    /// Allocates fresh parameters, then overwrites the modalities named in `restore`
    /// from their checkpoints. Modalities not in the plan keep their fresh values.
    pub fn initialize<B: AutodiffBackend>(
        &self,
        restore: Option<&RestorePlan>,
        device: &B::Device,
    ) -> ScaffoldResult<Session<B, impl Optimizer<FiddleNet<B>, B>>> {
        let mut net_config = FiddleNetConfig::new(self.config.architecture.clone());
        net_config.seed = self.config.seed;
        let mut model = net_config.init::<B>(device)?;

        if let Some(plan) = restore {
            for (modality, dir) in plan.iter() {
                checkpoint::load_modality(&mut model, modality, dir, device)?;
                info!(modality, dir = %dir.display(), "restored modality from checkpoint");
            }
        }

        let optim = AdamConfig::new().init::<B, FiddleNet<B>>();
        let session = Session {
            model,
            optim,
            scaffold: self.clone(),
            device: device.clone(),
            step: 0,
        };
        for (name, count) in session.parameter_count() {
            info!(scope = %name, parameters = count, "initialized");
        }
        Ok(session)
    }
}

/// Live network, optimizer and step counter. Single caller; every call is one
/// synchronous pass.
pub struct Session<B: AutodiffBackend, O> {
    model: FiddleNet<B>,
    optim: O,
    scaffold: Scaffold,
    device: B::Device,
    step: u64,
}

impl<B, O> Session<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<FiddleNet<B>, B>,
{
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn architecture(&self) -> &NetworkArchitecture {
        self.scaffold.architecture()
    }

    pub fn scaffold(&self) -> &Scaffold {
        &self.scaffold
    }

    pub fn model(&self) -> &FiddleNet<B> {
        &self.model
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Trainable parameters per modality, then the fusion stage and head together.
    pub fn parameter_count(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = self
            .model
            .modality_names()
            .iter()
            .filter_map(|name| {
                self.model
                    .modality(name)
                    .map(|net| (name.clone(), net.num_params()))
            })
            .collect();
        counts.push((
            checkpoint::HEAD_CHECKPOINT.to_string(),
            self.model.head().num_params(),
        ));
        counts
    }

    /// One optimizer step on the KL loss plus the convolution L2 penalties, with
    /// dropout and batch statistics in training mode. Reports the KL loss alone.
    pub fn train(&mut self, batch: &TrackBatch) -> ScaffoldResult<StepMetrics> {
        let output_track = self.scaffold.output_track().to_string();
        let bound = bind_batch::<B>(
            &self.scaffold.plan,
            &self.scaffold.input_shapes,
            batch,
            Some(&output_track),
            &self.device,
        )?;
        let target = bound.target.ok_or(ScaffoldError::NoTarget(output_track))?;

        let prediction = self.model.forward(bound.inputs);
        let loss = kl_divergence(target.tensor, prediction.clone());
        let objective = loss.clone() + self.model.l2_penalty();
        let grads = GradientsParams::from_grads(objective.backward(), &self.model);
        self.model = self
            .optim
            .step(self.scaffold.config.learning_rate, self.model.clone(), grads);
        self.step += 1;

        let loss = first_value(to_host(loss.detach())?);
        let predicted = to_host(prediction.detach())?;
        let accuracy = bucketed_accuracy(&target.values, &predicted, self.scaffold.plan.output_width);
        Ok(StepMetrics {
            loss,
            accuracy,
            step: self.step,
        })
    }

    /// Binds inputs and target once for repeated `test` / `predict` calls.
    pub fn eval_context(&self, batch: &TrackBatch) -> ScaffoldResult<EvalContext<B::InnerBackend>> {
        let bound = bind_batch::<B::InnerBackend>(
            &self.scaffold.plan,
            &self.scaffold.input_shapes,
            batch,
            Some(self.scaffold.output_track()),
            &self.device,
        )?;
        Ok(EvalContext::new(bound))
    }

    /// Like [`Self::eval_context`] for batches without the output track; usable with
    /// `predict` only.
    pub fn prediction_context(
        &self,
        batch: &TrackBatch,
    ) -> ScaffoldResult<EvalContext<B::InnerBackend>> {
        let bound = bind_batch::<B::InnerBackend>(
            &self.scaffold.plan,
            &self.scaffold.input_shapes,
            batch,
            None,
            &self.device,
        )?;
        Ok(EvalContext::new(bound))
    }

    /// Evaluation-mode loss and accuracy; no parameter changes.
    pub fn test(&self, context: &EvalContext<B::InnerBackend>) -> ScaffoldResult<EvalMetrics> {
        let target = context
            .target
            .as_ref()
            .ok_or_else(|| ScaffoldError::NoTarget(self.scaffold.output_track().to_string()))?;
        let model = self.model.valid();
        let prediction = model.forward(context.inputs.clone());
        let loss = kl_divergence(target.tensor.clone(), prediction.clone());
        let loss = first_value(to_host(loss)?);
        let predicted = to_host(prediction)?;
        Ok(EvalMetrics {
            loss,
            accuracy: bucketed_accuracy(&target.values, &predicted, self.scaffold.plan.output_width),
            samples: context.samples(),
        })
    }

    /// Evaluation-mode softmax output keyed by the output track.
    pub fn predict(
        &self,
        context: &EvalContext<B::InnerBackend>,
    ) -> ScaffoldResult<PredictionArtifact> {
        let model = self.model.valid();
        let prediction = to_host(model.forward(context.inputs.clone()))?;
        let array = TrackArray::new(
            vec![context.samples(), self.scaffold.plan.output_width],
            prediction,
        )?;
        let mut artifact = PredictionArtifact::new();
        artifact.insert(self.scaffold.output_track().to_string(), array);
        Ok(artifact)
    }

    pub fn get_weight(&self, key: &WeightKey) -> ScaffoldResult<TensorData> {
        self.model
            .weight(key)
            .ok_or_else(|| ScaffoldError::UnknownWeight(key.to_string()))
    }

    /// [`Self::get_weight`] addressed by its path form, e.g. `modality/dnaseq/conv1`.
    pub fn get_weight_by_name(&self, key: &str) -> ScaffoldResult<TensorData> {
        let key: WeightKey = key
            .parse()
            .map_err(|_| ScaffoldError::UnknownWeight(key.to_string()))?;
        self.get_weight(&key)
    }

    /// Every weight this network can report, modalities first.
    pub fn weight_keys(&self) -> Vec<WeightKey> {
        let mut keys = Vec::new();
        for name in self.model.modality_names() {
            for layer in [ModalityLayer::Conv1, ModalityLayer::Conv2, ModalityLayer::Fc] {
                keys.push(WeightKey::modality(name.clone(), layer));
            }
        }
        if self.model.head().has_fusion() {
            keys.push(WeightKey::FusionConv);
        }
        keys.push(WeightKey::OutputFc);
        keys
    }

    pub fn create_monitor_variables(&self, save_path: &Path) -> ScaffoldResult<Monitor> {
        Monitor::create(save_path, self.scaffold.output_track(), self.weight_keys())
    }

    /// Writes train and validation scalars plus the L2 norm of every monitored
    /// weight, keyed by `step`.
    pub fn summarize(
        &self,
        step: u64,
        monitor: &Monitor,
        train: &ScalarSummary,
        validation: &ScalarSummary,
    ) -> ScaffoldResult<()> {
        let mut norms = BTreeMap::new();
        for key in monitor.weight_keys() {
            let values = self
                .get_weight(key)?
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| ScaffoldError::Readback(format!("{e:?}")))?;
            let norm = values.iter().map(|v| (*v as f64).powi(2)).sum::<f64>().sqrt();
            norms.insert(key.to_string(), norm);
        }
        monitor.write_summary(step, train, validation, norms)
    }

    pub fn save_checkpoints(&self, dir: &Path) -> ScaffoldResult<()> {
        checkpoint::save_network(&self.model, dir)
    }

    /// Overwrites one modality's parameters on the live session.
    pub fn restore_modality(&mut self, modality: &str, dir: &Path) -> ScaffoldResult<()> {
        checkpoint::load_modality(&mut self.model, modality, dir, &self.device)
    }

    /// Restores every modality with a checkpoint under `dir`, and the head when present.
    /// Returns the restored modality names.
    pub fn restore_available(&mut self, dir: &Path) -> ScaffoldResult<Vec<String>> {
        let names = checkpoint::available_modalities(&self.model, dir);
        for name in &names {
            self.restore_modality(name, dir)?;
        }
        if checkpoint::head_file(dir).is_file() {
            checkpoint::load_head(&mut self.model, dir, &self.device)?;
        }
        Ok(names)
    }

    pub fn close(self) {
        info!(steps = self.step, "session closed");
    }
}

fn first_value(values: Vec<f32>) -> f32 {
    values.first().copied().unwrap_or(f32::NAN)
}
