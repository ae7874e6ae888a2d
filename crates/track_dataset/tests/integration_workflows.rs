//! End-to-end track_dataset workflows: data files on disk -> store -> batches and probes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use data_contracts::TrackArray;
use track_dataset::{
    select_probe_indices, DatasetError, MultiModalBatcher, Split, TrackStore,
    DEFAULT_PROBE_COUNT, VALIDATION_LIMIT,
};

fn write_split(root: &Path, data_name: &str, split: Split, samples: usize) -> anyhow::Result<()> {
    let mut tracks = BTreeMap::new();
    let dna: Vec<f32> = (0..samples * 4 * 20).map(|v| (v % 4) as f32).collect();
    tracks.insert("dnaseq".to_string(), TrackArray::new(vec![samples, 4, 20], dna)?);
    let tss: Vec<f32> = (0..samples * 10)
        .map(|v| if v % 10 == (v / 10) % 10 { 1.0 } else { 0.0 })
        .collect();
    tracks.insert("tssseq".to_string(), TrackArray::new(vec![samples, 10], tss)?);
    let dir = root.join(data_name);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(split.file_name()), serde_json::to_vec(&tracks)?)?;
    Ok(())
}

#[test]
fn loads_splits_and_batches_inputs_with_outputs() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_split(tmp.path(), "toy", Split::Train, 12)?;
    write_split(tmp.path(), "toy", Split::Validation, 8)?;

    let train = TrackStore::load_split(tmp.path(), "toy", Split::Train)?;
    assert_eq!(train.samples(), 12);

    let keys = vec!["dnaseq".to_string(), "tssseq".to_string()];
    let mut batcher = MultiModalBatcher::new(train, keys.clone(), 5, Some(1))?;
    let batch = batcher.next_batch()?;
    assert_eq!(batch["dnaseq"].shape(), &[5, 4, 20]);
    assert_eq!(batch["tssseq"].shape(), &[5, 10]);

    let validation = TrackStore::load_split(tmp.path(), "toy", Split::Validation)?
        .subset(&keys, VALIDATION_LIMIT)?;
    assert_eq!(validation.samples(), 8);
    let probes = select_probe_indices(validation.get("tssseq")?, DEFAULT_PROBE_COUNT);
    assert_eq!(probes.len(), 4);
    let picked = validation.gather(&keys, &probes)?;
    assert_eq!(picked["tssseq"].samples(), 4);
    Ok(())
}

#[test]
fn missing_split_file_reports_path() {
    let tmp = tempfile::tempdir().unwrap();
    let err = TrackStore::load_split(tmp.path(), "absent", Split::Train).unwrap_err();
    assert!(matches!(err, DatasetError::Io { .. }));
    assert!(err.to_string().contains("train.json"));
}

#[test]
fn malformed_track_file_is_a_json_error() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("bad");
    fs::create_dir_all(&dir)?;
    fs::write(
        dir.join("train.json"),
        r#"{"dnaseq": {"shape": [2, 3], "values": [1.0]}}"#,
    )?;
    let err = TrackStore::load_split(tmp.path(), "bad", Split::Train).unwrap_err();
    assert!(matches!(err, DatasetError::Json { .. }));
    Ok(())
}
