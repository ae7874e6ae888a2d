mod common;

use common::{batch, two_modalities, TestBackend, OUTPUT_TRACK, OUTPUT_WIDTH};
use models::WeightKey;
use training::{Scaffold, ScaffoldConfig, ScaffoldError};

fn scaffold(seed: u64) -> Scaffold {
    Scaffold::new(ScaffoldConfig::new(two_modalities(), OUTPUT_TRACK).with_seed(seed)).unwrap()
}

#[test]
fn train_step_then_repeatable_evaluation() {
    let device = Default::default();
    let mut session = scaffold(1).initialize::<TestBackend>(None, &device).unwrap();

    let metrics = session.train(&batch(4, 0)).unwrap();
    assert!(metrics.loss.is_finite());
    assert!(metrics.loss >= 0.0);
    assert!(metrics.accuracy <= 4);
    assert_eq!(metrics.step, 1);
    assert_eq!(session.step(), 1);

    let context = session.eval_context(&batch(6, 3)).unwrap();
    let first = session.test(&context).unwrap();
    let second = session.test(&context).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.samples, 6);
    assert!(first.accuracy <= 6);
    assert_eq!(session.step(), 1);
}

#[test]
fn predictions_are_distributions_keyed_by_output() {
    let device = Default::default();
    let session = scaffold(2).initialize::<TestBackend>(None, &device).unwrap();
    let mut inputs = batch(3, 1);
    inputs.remove(OUTPUT_TRACK);

    let context = session.prediction_context(&inputs).unwrap();
    assert!(!context.has_target());
    let artifact = session.predict(&context).unwrap();
    let predicted = &artifact[OUTPUT_TRACK];
    assert_eq!(predicted.shape(), &[3, OUTPUT_WIDTH]);
    for s in 0..3 {
        let total: f32 = predicted.row(s).unwrap().iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
    }
    assert!(matches!(
        session.test(&context),
        Err(ScaffoldError::NoTarget(_))
    ));
}

#[test]
fn missing_track_names_the_configuration_mismatch() {
    let device = Default::default();
    let mut session = scaffold(3).initialize::<TestBackend>(None, &device).unwrap();
    let mut incomplete = batch(4, 0);
    incomplete.remove("netseq");

    let err = session.train(&incomplete).unwrap_err();
    assert!(matches!(err, ScaffoldError::MissingTrack { ref track, .. } if track == "netseq"));
    assert!(err.to_string().contains("must match"));
    assert_eq!(session.step(), 0);
}

#[test]
fn wrong_track_shape_is_rejected_before_the_backend() {
    let device = Default::default();
    let session = scaffold(4).initialize::<TestBackend>(None, &device).unwrap();
    let mut wrong = batch(2, 0);
    wrong.insert(
        "netseq".to_string(),
        data_contracts::TrackArray::zeros(vec![2, 1, 59]).unwrap(),
    );
    assert!(matches!(
        session.eval_context(&wrong),
        Err(ScaffoldError::ShapeMismatch { .. })
    ));
}

#[test]
fn weights_are_reported_by_explicit_key() {
    let device = Default::default();
    let session = scaffold(5).initialize::<TestBackend>(None, &device).unwrap();

    let conv = session.get_weight_by_name("modality/netseq/conv1").unwrap();
    assert_eq!(conv.shape, vec![8, 1, 1, 5]);
    let fusion = session.get_weight(&WeightKey::FusionConv).unwrap();
    assert_eq!(fusion.shape, vec![40, 1, 2, 10]);

    for unknown in ["modality/chipseq/conv1", "hidden/fc", "conv1"] {
        assert!(matches!(
            session.get_weight_by_name(unknown),
            Err(ScaffoldError::UnknownWeight(_))
        ));
    }
    assert_eq!(session.weight_keys().len(), 2 * 3 + 2);
}

#[test]
fn mismatched_fc_widths_fail_at_construction() {
    let mut narrow = common::modality(1);
    narrow.fc_width = 16;
    let architecture = two_modalities().with_modality("netseq", narrow);
    let err = Scaffold::new(ScaffoldConfig::new(architecture, OUTPUT_TRACK)).unwrap_err();
    assert!(matches!(
        err,
        ScaffoldError::Architecture(data_contracts::ArchitectureError::MismatchedFcWidth { .. })
    ));
}

#[test]
fn single_modality_network_trains() {
    let device = Default::default();
    let architecture = data_contracts::NetworkArchitecture::new()
        .with_modality("dnaseq", common::modality(4));
    let mut session = Scaffold::new(ScaffoldConfig::new(architecture, OUTPUT_TRACK).with_seed(6))
        .unwrap()
        .initialize::<TestBackend>(None, &device)
        .unwrap();
    let metrics = session.train(&batch(4, 2)).unwrap();
    assert!(metrics.loss.is_finite());
    assert!(session.get_weight(&WeightKey::FusionConv).is_err());
}

#[test]
fn empty_batches_are_rejected() {
    let device = Default::default();
    let mut session = scaffold(7).initialize::<TestBackend>(None, &device).unwrap();
    assert!(matches!(
        session.train(&batch(0, 0)),
        Err(ScaffoldError::EmptyBatch)
    ));
    assert!(matches!(
        session.eval_context(&batch(0, 0)),
        Err(ScaffoldError::EmptyBatch)
    ));
    assert_eq!(session.step(), 0);
}

#[test]
fn evaluation_normalizes_with_running_statistics() {
    let device = Default::default();
    let mut session = scaffold(8).initialize::<TestBackend>(None, &device).unwrap();
    session.train(&batch(4, 0)).unwrap();

    let full = batch(3, 2);
    let mut first = full.clone();
    for array in first.values_mut() {
        let mut shape = array.shape().to_vec();
        let row = array.values().len() / shape[0];
        shape[0] = 1;
        *array = data_contracts::TrackArray::new(shape, array.values()[..row].to_vec()).unwrap();
    }

    // each sample's prediction does not depend on the rest of the batch
    let whole = session.predict(&session.eval_context(&full).unwrap()).unwrap();
    let alone = session.predict(&session.eval_context(&first).unwrap()).unwrap();
    let expected = whole[OUTPUT_TRACK].row(0).unwrap();
    let actual = alone[OUTPUT_TRACK].row(0).unwrap();
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-5);
    }
}
