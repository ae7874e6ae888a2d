mod common;

use common::{batch, two_modalities, TestBackend, OUTPUT_TRACK};
use training::checkpoint::{head_file, modality_file};
use training::{RestorePlan, Scaffold, ScaffoldConfig, ScaffoldError};

fn values(data: burn::tensor::TensorData) -> Vec<f32> {
    data.to_vec::<f32>().unwrap()
}

fn scaffold(seed: u64) -> Scaffold {
    Scaffold::new(ScaffoldConfig::new(two_modalities(), OUTPUT_TRACK).with_seed(seed)).unwrap()
}

#[test]
fn checkpoints_are_written_per_modality() {
    let tmp = tempfile::tempdir().unwrap();
    let device = Default::default();
    let session = scaffold(1).initialize::<TestBackend>(None, &device).unwrap();
    session.save_checkpoints(tmp.path()).unwrap();

    assert!(modality_file(tmp.path(), "dnaseq").is_file());
    assert!(modality_file(tmp.path(), "netseq").is_file());
    assert!(head_file(tmp.path()).is_file());
}

#[test]
fn restoring_one_modality_leaves_the_other_fresh() {
    let tmp = tempfile::tempdir().unwrap();
    let device = Default::default();

    let mut trained = scaffold(1).initialize::<TestBackend>(None, &device).unwrap();
    trained.train(&batch(4, 0)).unwrap();
    trained.save_checkpoints(tmp.path()).unwrap();
    let trained_dna = values(trained.get_weight_by_name("modality/dnaseq/conv1").unwrap());

    let fresh = scaffold(9).initialize::<TestBackend>(None, &device).unwrap();
    let plan = RestorePlan::new().with("dnaseq", tmp.path());
    let mixed = scaffold(9)
        .initialize::<TestBackend>(Some(&plan), &device)
        .unwrap();

    assert_eq!(
        values(mixed.get_weight_by_name("modality/dnaseq/conv1").unwrap()),
        trained_dna
    );
    for key in ["modality/netseq/conv1", "modality/netseq/conv2"] {
        assert_eq!(
            values(mixed.get_weight_by_name(key).unwrap()),
            values(fresh.get_weight_by_name(key).unwrap())
        );
    }
}

#[test]
fn live_restore_overwrites_only_the_named_modality() {
    let tmp = tempfile::tempdir().unwrap();
    let device = Default::default();

    let source = scaffold(2).initialize::<TestBackend>(None, &device).unwrap();
    source.save_checkpoints(tmp.path()).unwrap();

    let mut target = scaffold(3).initialize::<TestBackend>(None, &device).unwrap();
    let netseq_before = values(target.get_weight_by_name("modality/netseq/conv2").unwrap());
    target.restore_modality("dnaseq", tmp.path()).unwrap();

    assert_eq!(
        values(target.get_weight_by_name("modality/dnaseq/conv2").unwrap()),
        values(source.get_weight_by_name("modality/dnaseq/conv2").unwrap())
    );
    assert_eq!(
        values(target.get_weight_by_name("modality/netseq/conv2").unwrap()),
        netseq_before
    );
}

#[test]
fn restore_errors_propagate() {
    let tmp = tempfile::tempdir().unwrap();
    let device = Default::default();

    let missing = RestorePlan::new().with("dnaseq", tmp.path());
    assert!(matches!(
        scaffold(4).initialize::<TestBackend>(Some(&missing), &device),
        Err(ScaffoldError::Checkpoint { .. })
    ));

    let unknown = RestorePlan::new().with("chipseq", tmp.path());
    assert!(matches!(
        scaffold(4).initialize::<TestBackend>(Some(&unknown), &device),
        Err(ScaffoldError::UnknownModality(_))
    ));
}

#[test]
fn full_restore_reproduces_evaluation() {
    let tmp = tempfile::tempdir().unwrap();
    let device = Default::default();

    let mut trained = scaffold(5).initialize::<TestBackend>(None, &device).unwrap();
    trained.train(&batch(4, 1)).unwrap();
    trained.save_checkpoints(tmp.path()).unwrap();
    let context = trained.eval_context(&batch(5, 2)).unwrap();
    let expected = trained.test(&context).unwrap();

    let mut restored = scaffold(6).initialize::<TestBackend>(None, &device).unwrap();
    let names = restored.restore_available(tmp.path()).unwrap();
    assert_eq!(names, vec!["dnaseq".to_string(), "netseq".to_string()]);
    let context = restored.eval_context(&batch(5, 2)).unwrap();
    let actual = restored.test(&context).unwrap();
    assert!((actual.loss - expected.loss).abs() < 1e-5);
    assert_eq!(actual.accuracy, expected.accuracy);
}
