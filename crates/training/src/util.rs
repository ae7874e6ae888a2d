use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use data_contracts::{NetworkArchitecture, RunConfiguration};
use track_dataset::{MultiModalBatcher, Split, TrackStore, VALIDATION_LIMIT};
use tracing::{info, warn};

use crate::checkpoint;
use crate::scaffold::{RestorePlan, Scaffold, ScaffoldConfig};
use crate::trainer::{PeakLogSink, PredictionSink, Trainer, TrainerConfig};
use crate::ADBackend;

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackendKind {
    #[value(name = "ndarray")]
    NdArray,
    Wgpu,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizeMode {
    /// Write prediction snapshots only.
    Offline,
    /// Also hand each snapshot to the prediction sink.
    Online,
}

#[derive(Parser, Debug)]
#[command(name = "train", about = "Train the multi-modal track network")]
pub struct TrainArgs {
    /// Name of this run; results land in <results-dir>/<run-name>.
    #[arg(long, default_value = "experiment")]
    pub run_name: String,
    /// Directory holding <DataName>/train.json and <DataName>/validation.json.
    #[arg(long, default_value = "../data/hdf5datasets")]
    pub data_dir: PathBuf,
    /// Run configuration file (tracks, inputs, outputs, data name).
    #[arg(long, default_value = "configurations.json")]
    pub configuration: PathBuf,
    /// Architecture file (per-modality network parameters).
    #[arg(long, default_value = "architecture.json")]
    pub architecture: PathBuf,
    /// Directory of per-modality checkpoints to start from.
    #[arg(long)]
    pub restore_path: Option<PathBuf>,
    /// Whether prediction snapshots are also sent to the prediction sink.
    #[arg(long, value_enum, default_value_t = VisualizeMode::Offline)]
    pub visualize_prediction: VisualizeMode,
    /// Snapshot probe predictions every this many iterations.
    #[arg(long, default_value_t = 50)]
    pub save_prediction_freq: usize,
    /// Stop once this many epochs have been seen.
    #[arg(long, default_value_t = 1000)]
    pub max_epoch: usize,
    /// Batch size.
    #[arg(long, default_value_t = 20)]
    pub batch_size: usize,
    /// Learning rate.
    #[arg(long, default_value_t = 0.001)]
    pub learning_rate: f64,
    /// Keep-probability for every modality's dropout (architecture file value if unset).
    #[arg(long)]
    pub dropout: Option<f64>,
    /// Results root directory.
    #[arg(long, default_value = "../results")]
    pub results_dir: PathBuf,
    /// Input track ids joined by `_`; overrides the configuration's inputs.
    #[arg(long)]
    pub inputs: Option<String>,
    /// Output track ids joined by `_`; overrides the configuration's outputs.
    #[arg(long)]
    pub outputs: Option<String>,
    /// Training iterations (each runs 10 optimizer steps).
    #[arg(long, default_value_t = 1000)]
    pub iterations: usize,
    /// Seed for parameter initialization and batch shuffling.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
}

/// Configuration after CLI overrides, plus the architecture restricted to its inputs.
pub struct ResolvedRun {
    pub configuration: RunConfiguration,
    pub architecture: NetworkArchitecture,
    pub run_dir: PathBuf,
}

pub fn resolve_run(args: &TrainArgs) -> anyhow::Result<ResolvedRun> {
    let mut configuration = RunConfiguration::from_path(&args.configuration)?;
    if let Some(ids) = &args.inputs {
        let inputs = configuration.override_inputs(ids)?;
        info!(?inputs, "inputs overridden from command line");
    }
    if let Some(ids) = &args.outputs {
        let outputs = configuration.override_outputs(ids)?;
        info!(?outputs, "outputs overridden from command line");
    }
    configuration.output_track()?;

    let mut architecture = NetworkArchitecture::from_path(&args.architecture)?
        .restrict_to(&configuration.options.inputs)?;
    if let Some(keep_prob) = args.dropout {
        architecture.set_keep_prob(keep_prob);
    }
    architecture.validate()?;

    Ok(ResolvedRun {
        configuration,
        architecture,
        run_dir: args.results_dir.join(&args.run_name),
    })
}

/// Modalities with a `<modality>_model.bin` under `dir`.
pub fn restore_plan_for(architecture: &NetworkArchitecture, dir: &Path) -> RestorePlan {
    let mut plan = RestorePlan::new();
    for name in architecture.names() {
        if checkpoint::modality_file(dir, name).is_file() {
            plan = plan.with(name, dir);
        } else {
            warn!(modality = name, dir = %dir.display(), "no checkpoint to restore; starting fresh");
        }
    }
    plan
}

pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    validate_backend_choice(args.backend)?;
    let run = resolve_run(&args)?;
    let options = &run.configuration.options;
    let output_track = run.configuration.output_track()?.to_string();

    fs::create_dir_all(&run.run_dir)
        .with_context(|| format!("failed to create {}", run.run_dir.display()))?;
    run.architecture.write_to(&run.run_dir.join("architecture.json"))?;
    run.configuration
        .write_to(&run.run_dir.join("configuration.json"))?;

    let tracks = run.configuration.all_tracks();
    let train = TrackStore::load_split(&args.data_dir, &options.data_name, Split::Train)?;
    train.require(&tracks)?;
    let validation = TrackStore::load_split(&args.data_dir, &options.data_name, Split::Validation)?
        .subset(&tracks, VALIDATION_LIMIT)?;
    info!(
        train = train.samples(),
        validation = validation.samples(),
        inputs = ?options.inputs,
        output = %output_track,
        "data loaded"
    );

    let mut config = ScaffoldConfig::new(run.architecture.clone(), output_track)
        .with_learning_rate(args.learning_rate);
    config.seed = args.seed;
    let scaffold = Scaffold::new(config)?;

    let restore = args
        .restore_path
        .as_deref()
        .map(|dir| restore_plan_for(&run.architecture, dir));
    let device = <ADBackend as burn::tensor::backend::Backend>::Device::default();
    let mut session = scaffold.initialize::<ADBackend>(restore.as_ref(), &device)?;

    let mut batcher = MultiModalBatcher::new(train, tracks, args.batch_size, args.seed)?;
    let mut trainer_config = TrainerConfig::new(&run.run_dir);
    trainer_config.iterations = args.iterations;
    trainer_config.max_epoch = args.max_epoch;
    trainer_config.save_prediction_freq = args.save_prediction_freq;
    let trainer = Trainer::new(trainer_config);

    let mut peaks = PeakLogSink;
    let sink: Option<&mut dyn PredictionSink> = match args.visualize_prediction {
        VisualizeMode::Online => Some(&mut peaks),
        VisualizeMode::Offline => None,
    };
    let report = trainer.run(&mut session, &mut batcher, &validation, sink)?;
    info!(
        iterations = report.iterations,
        steps = report.steps,
        best_validation_loss = ?report.best_validation_loss,
        checkpoints = report.checkpoints_written,
        "training finished"
    );
    let report_path = run.run_dir.join("report.json");
    fs::write(&report_path, serde_json::to_vec_pretty(&report)?)
        .with_context(|| format!("failed to write {}", report_path.display()))?;
    session.close();
    Ok(())
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            warn!("built with backend-wgpu; training will still use the WGPU backend despite --backend ndarray");
        }
        _ => {}
    }
    Ok(())
}
