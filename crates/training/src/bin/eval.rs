use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use data_contracts::{NetworkArchitecture, RunConfiguration};
use track_dataset::{Split, TrackStore, VALIDATION_LIMIT};
use tracing::{info, warn};
use training::util::{validate_backend_choice, BackendKind};
use training::{ADBackend, Scaffold, ScaffoldConfig};

#[derive(Parser, Debug)]
#[command(
    name = "eval",
    about = "Evaluate a trained run's checkpoints on a data split (loss and bucketed accuracy)"
)]
struct Args {
    /// Run directory written by `train` (architecture.json, configuration.json, checkpoints).
    #[arg(long)]
    run_dir: PathBuf,
    /// Directory holding <DataName>/<split>.json.
    #[arg(long, default_value = "../data/hdf5datasets")]
    data_dir: PathBuf,
    /// Evaluate on the training split instead of validation.
    #[arg(long)]
    train_split: bool,
    /// Evaluate at most this many leading samples.
    #[arg(long, default_value_t = VALIDATION_LIMIT)]
    limit: usize,
    /// Write the predicted distributions here as JSON.
    #[arg(long)]
    predictions_out: Option<PathBuf>,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    backend: BackendKind,
}

fn main() -> anyhow::Result<()> {
    training::init_tracing();
    let args = Args::parse();
    validate_backend_choice(args.backend)?;

    let configuration = RunConfiguration::from_path(&args.run_dir.join("configuration.json"))?;
    let architecture = NetworkArchitecture::from_path(&args.run_dir.join("architecture.json"))?;
    let output_track = configuration.output_track()?.to_string();

    let split = if args.train_split {
        Split::Train
    } else {
        Split::Validation
    };
    let tracks = configuration.all_tracks();
    let store = TrackStore::load_split(&args.data_dir, &configuration.options.data_name, split)?
        .subset(&tracks, args.limit)?;

    let scaffold = Scaffold::new(ScaffoldConfig::new(architecture, output_track))?;
    let device = <ADBackend as burn::tensor::backend::Backend>::Device::default();
    let mut session = scaffold.initialize::<ADBackend>(None, &device)?;
    let restored = session.restore_available(&args.run_dir)?;
    let inputs = scaffold.input_tracks();
    if restored.len() < inputs.len() {
        warn!(
            ?restored,
            ?inputs,
            "not every modality has a checkpoint; the rest are freshly initialized"
        );
    }

    let context = session.eval_context(&store.to_batch())?;
    let metrics = session.test(&context)?;
    let summary = metrics.summary();
    info!(
        samples = metrics.samples,
        loss = summary.loss,
        accuracy = summary.accuracy,
        "evaluation"
    );
    println!("{}", serde_json::to_string(&metrics)?);

    if let Some(path) = &args.predictions_out {
        let predicted = session.predict(&context)?;
        fs::write(path, serde_json::to_vec(&predicted)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote predictions");
    }
    session.close();
    Ok(())
}
