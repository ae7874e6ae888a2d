//! The outer training loop: iterations of fixed step counts, validation after each,
//! periodic prediction snapshots and checkpointing on improvement.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use burn::optim::Optimizer;
use burn::tensor::backend::AutodiffBackend;
use data_contracts::PredictionArtifact;
use models::FiddleNet;
use serde::Serialize;
use track_dataset::{select_probe_indices, MultiModalBatcher, TrackStore, DEFAULT_PROBE_COUNT};
use tracing::{debug, info};

use crate::monitor::ScalarSummary;
use crate::scaffold::{Session, StepMetrics};

pub const ORIGINAL_OUTPUTS: &str = "original_outputs.json";

/// `pred_viz_<iteration>.json`
pub fn prediction_file(dir: &Path, iteration: usize) -> PathBuf {
    dir.join(format!("pred_viz_{iteration}.json"))
}

/// Receives the probe predictions at every snapshot, next to the probes' true outputs.
pub trait PredictionSink {
    fn on_prediction(
        &mut self,
        iteration: usize,
        predicted: &PredictionArtifact,
        original: &PredictionArtifact,
    ) -> anyhow::Result<()>;
}

/// Logs where each probe's predicted and true distributions peak.
#[derive(Debug, Default)]
pub struct PeakLogSink;

impl PredictionSink for PeakLogSink {
    fn on_prediction(
        &mut self,
        iteration: usize,
        predicted: &PredictionArtifact,
        original: &PredictionArtifact,
    ) -> anyhow::Result<()> {
        for (track, prediction) in predicted {
            let Some(truth) = original.get(track) else {
                continue;
            };
            for probe in 0..prediction.samples().min(truth.samples()) {
                let predicted_peak = crate::objective::argmax(prediction.row(probe)?);
                let true_peak = crate::objective::argmax(truth.row(probe)?);
                info!(iteration, track = %track, probe, predicted_peak, true_peak, "prediction snapshot");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Results directory of this run; logs, snapshots and checkpoints land here.
    pub run_dir: PathBuf,
    pub iterations: usize,
    pub steps_per_iteration: usize,
    pub max_epoch: usize,
    pub save_prediction_freq: usize,
    /// Checkpoints are only written after this many iterations.
    pub checkpoint_after: usize,
    pub probe_count: usize,
}

impl TrainerConfig {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
            iterations: 1000,
            steps_per_iteration: 10,
            max_epoch: 1000,
            save_prediction_freq: 50,
            checkpoint_after: 20,
            probe_count: DEFAULT_PROBE_COUNT,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub iterations: usize,
    pub steps: u64,
    pub pretrain_validation_loss: f32,
    pub best_validation_loss: Option<f32>,
    pub checkpoints_written: usize,
}

/// Running mean of step metrics within one iteration.
#[derive(Debug, Default)]
struct StepAverager {
    loss: f64,
    accuracy: usize,
    steps: usize,
}

impl StepAverager {
    fn push(&mut self, metrics: &StepMetrics) {
        self.loss += metrics.loss as f64;
        self.accuracy += metrics.accuracy;
        self.steps += 1;
    }

    fn summary(&self, batch_size: usize) -> ScalarSummary {
        let steps = self.steps.max(1) as f64;
        ScalarSummary {
            loss: self.loss / steps,
            accuracy: self.accuracy as f64 / steps / batch_size.max(1) as f64,
        }
    }
}

fn write_artifact(path: &Path, artifact: &PredictionArtifact) -> anyhow::Result<()> {
    let json = serde_json::to_vec(artifact)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// `validation` must carry every input track and the output track.
    pub fn run<B, O>(
        &self,
        session: &mut Session<B, O>,
        batcher: &mut MultiModalBatcher,
        validation: &TrackStore,
        mut sink: Option<&mut dyn PredictionSink>,
    ) -> anyhow::Result<TrainReport>
    where
        B: AutodiffBackend,
        O: Optimizer<FiddleNet<B>, B>,
    {
        let cfg = &self.config;
        let run_dir = cfg.run_dir.as_path();
        let monitor = session.create_monitor_variables(run_dir)?;

        let output_track = session.scaffold().output_track().to_string();
        let mut tracks = session.scaffold().input_tracks();
        tracks.push(output_track.clone());

        let probes = select_probe_indices(validation.get(&output_track)?, cfg.probe_count);
        let probe_batch = validation.gather(&tracks, &probes)?;
        let mut original = PredictionArtifact::new();
        if let Some(array) = probe_batch.get(&output_track) {
            original.insert(output_track.clone(), array.clone());
        }
        write_artifact(&run_dir.join(ORIGINAL_OUTPUTS), &original)?;
        let probe_context = session.prediction_context(&probe_batch)?;

        let validation_context = session.eval_context(&validation.to_batch())?;
        let pretrain = session.test(&validation_context)?;
        info!(loss = pretrain.loss, accuracy = pretrain.accuracy, "pre-train validation");

        let batch_size = batcher.batch_size();
        let train_size = batcher.samples().max(1);
        let mut best: Option<f32> = None;
        let mut checkpoints_written = 0;
        let mut iterations = 0;

        for it in 0..cfg.iterations {
            let seen = it * cfg.steps_per_iteration * batch_size;
            let epoch = seen / train_size;
            if epoch > cfg.max_epoch {
                info!(epoch, max_epoch = cfg.max_epoch, "reached max epoch");
                break;
            }
            info!(epoch, iteration = it, examples_seen = seen, "iteration");

            let mut averager = StepAverager::default();
            for _ in 0..cfg.steps_per_iteration {
                let batch = batcher.next_batch()?;
                let metrics = session.train(&batch)?;
                debug!(step = metrics.step, loss = metrics.loss, accuracy = metrics.accuracy, "train step");
                averager.push(&metrics);
            }
            let train = averager.summary(batch_size);
            let validation_metrics = session.test(&validation_context)?;
            let valid = validation_metrics.summary();
            info!(
                train_loss = train.loss,
                train_accuracy = train.accuracy,
                validation_loss = valid.loss,
                validation_accuracy = valid.accuracy,
                "iteration done"
            );

            if cfg.save_prediction_freq > 0 && it % cfg.save_prediction_freq == 0 {
                let predicted = session.predict(&probe_context)?;
                write_artifact(&prediction_file(run_dir, it), &predicted)?;
                if let Some(sink) = sink.as_deref_mut() {
                    sink.on_prediction(it, &predicted, &original)?;
                }
            }

            monitor.record_train(&train)?;
            monitor.record_validation(&valid)?;
            session.summarize(session.step(), &monitor, &train, &valid)?;

            let improved = best.map_or(true, |b| validation_metrics.loss < b);
            if improved && it > cfg.checkpoint_after {
                best = Some(validation_metrics.loss);
                session.save_checkpoints(run_dir)?;
                checkpoints_written += 1;
                info!(dir = %run_dir.display(), loss = validation_metrics.loss, "model saved");
            }
            iterations = it + 1;
        }

        Ok(TrainReport {
            iterations,
            steps: session.step(),
            pretrain_validation_loss: pretrain.loss,
            best_validation_loss: best,
            checkpoints_written,
        })
    }
}
