mod common;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use clap::Parser;
use common::{batch, two_modalities, OUTPUT_TRACK};
use training::{run_train, TrainArgs};

fn write_fixture(root: &Path) -> anyhow::Result<()> {
    let configuration = serde_json::json!({
        "Tracks": {
            "dnaseq": {"id": "1", "orientation": "both"},
            "netseq": {"id": "2"},
            "mnaseseq": {"id": "3"},
            "tssseq": {"id": "4"}
        },
        "Options": {
            "Inputs": ["dnaseq", "mnaseseq"],
            "Outputs": ["tssseq"],
            "DataName": "toy",
            "Strand": "Single"
        }
    });
    fs::write(
        root.join("configurations.json"),
        serde_json::to_vec_pretty(&configuration)?,
    )?;
    two_modalities().write_to(&root.join("architecture.json"))?;

    let data_dir = root.join("data").join("toy");
    fs::create_dir_all(&data_dir)?;
    for (file, samples) in [("train.json", 12), ("validation.json", 9)] {
        let tracks: BTreeMap<_, _> = batch(samples, samples).into_iter().collect();
        fs::write(data_dir.join(file), serde_json::to_vec(&tracks)?)?;
    }
    Ok(())
}

fn args(root: &Path, extra: &[&str]) -> TrainArgs {
    let root = root.display().to_string();
    let mut argv = vec![
        "train".to_string(),
        "--run-name".into(),
        "smoke".into(),
        "--data-dir".into(),
        format!("{root}/data"),
        "--configuration".into(),
        format!("{root}/configurations.json"),
        "--architecture".into(),
        format!("{root}/architecture.json"),
        "--results-dir".into(),
        format!("{root}/results"),
        "--batch-size".into(),
        "4".into(),
        "--seed".into(),
        "7".into(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    TrainArgs::parse_from(argv)
}

#[test]
fn defaults_follow_the_documented_flags() {
    let args = TrainArgs::parse_from(["train"]);
    assert_eq!(args.run_name, "experiment");
    assert_eq!(args.batch_size, 20);
    assert_eq!(args.max_epoch, 1000);
    assert_eq!(args.save_prediction_freq, 50);
    assert_eq!(args.iterations, 1000);
    assert!((args.learning_rate - 0.001).abs() < 1e-12);
    assert!(args.dropout.is_none());
}

#[test]
fn short_run_writes_logs_snapshots_and_configuration() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_fixture(tmp.path())?;

    // ids 1_2 select dnaseq and netseq in place of the configured mnaseseq input
    run_train(args(
        tmp.path(),
        &[
            "--inputs",
            "1_2",
            "--iterations",
            "2",
            "--save-prediction-freq",
            "1",
            "--visualize-prediction",
            "online",
        ],
    ))?;

    let run_dir = tmp.path().join("results").join("smoke");
    let train_log = fs::read_to_string(run_dir.join("train.txt"))?;
    let mut lines = train_log.lines();
    assert_eq!(lines.next(), Some(format!("Loss\t{OUTPUT_TRACK}_Accuracy").as_str()));
    assert_eq!(lines.count(), 2);
    let validation_log = fs::read_to_string(run_dir.join("validation.txt"))?;
    assert_eq!(validation_log.lines().count(), 3);

    let summaries = fs::read_to_string(run_dir.join("summaries.jsonl"))?;
    let last: serde_json::Value = serde_json::from_str(summaries.lines().last().unwrap_or(""))?;
    assert_eq!(last["step"], 20);
    assert!(last["weight_norms"]["fusion/conv"].as_f64().unwrap_or(0.0) > 0.0);

    for name in ["original_outputs.json", "pred_viz_0.json", "pred_viz_1.json"] {
        assert!(run_dir.join(name).is_file(), "missing {name}");
    }
    let original: BTreeMap<String, data_contracts::TrackArray> =
        serde_json::from_slice(&fs::read(run_dir.join("original_outputs.json"))?)?;
    assert_eq!(original[OUTPUT_TRACK].samples(), 5);

    let configuration =
        data_contracts::RunConfiguration::from_path(&run_dir.join("configuration.json"))?;
    assert_eq!(configuration.options.inputs, vec!["dnaseq", "netseq"]);
    let architecture =
        data_contracts::NetworkArchitecture::from_path(&run_dir.join("architecture.json"))?;
    assert_eq!(architecture.len(), 2);

    // no checkpoint before iteration 21
    assert!(!training::checkpoint::head_file(&run_dir).exists());
    Ok(())
}

#[test]
fn max_epoch_stops_the_loop() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_fixture(tmp.path())?;
    // 10 steps x 4 samples over 12 training samples: epoch 3 at iteration 1
    run_train(args(
        tmp.path(),
        &["--inputs", "1_2", "--iterations", "5", "--max-epoch", "2"],
    ))?;
    let run_dir = tmp.path().join("results").join("smoke");
    let train_log = fs::read_to_string(run_dir.join("train.txt"))?;
    assert_eq!(train_log.lines().count(), 2);
    Ok(())
}

#[test]
fn unknown_input_architecture_is_reported() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_fixture(tmp.path())?;
    // configured inputs include mnaseseq, which the architecture file lacks
    let err = run_train(args(tmp.path(), &["--iterations", "1"])).unwrap_err();
    assert!(err.to_string().contains("mnaseseq"));
    Ok(())
}
