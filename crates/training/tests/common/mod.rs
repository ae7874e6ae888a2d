#![allow(dead_code)]

use data_contracts::{ModalityArchitecture, NetworkArchitecture, TrackArray, TrackBatch, Window};

pub type TestBackend = burn::backend::Autodiff<burn_ndarray::NdArray<f32>>;

pub const LENGTH: usize = 60;
pub const OUTPUT_WIDTH: usize = 10;
pub const OUTPUT_TRACK: &str = "tssseq";

pub fn modality(channels: usize) -> ModalityArchitecture {
    ModalityArchitecture {
        input_shape: [channels, LENGTH, 1],
        output_width: OUTPUT_WIDTH,
        filters: vec![8, 8],
        filter_sizes: vec![Window::Rect([channels, 5]), Window::Rect([1, 5])],
        pool_window: Window::Rect([1, 2]),
        pool_stride: Window::Rect([1, 2]),
        fc_width: 32,
        keep_prob: 0.5,
    }
}

/// `dnaseq` (4 channels) and `netseq` (1 channel).
pub fn two_modalities() -> NetworkArchitecture {
    NetworkArchitecture::new()
        .with_modality("dnaseq", modality(4))
        .with_modality("netseq", modality(1))
}

fn signal(samples: usize, width: usize, phase: usize) -> Vec<f32> {
    (0..samples * width)
        .map(|i| (((i * 7 + phase * 13) % 17) as f32) / 17.0)
        .collect()
}

/// Normalized targets peaking at a sample-dependent bin.
pub fn targets(samples: usize) -> TrackArray {
    let mut values = vec![0.01f32; samples * OUTPUT_WIDTH];
    for s in 0..samples {
        values[s * OUTPUT_WIDTH + (s * 3) % OUTPUT_WIDTH] = 1.0;
    }
    for row in values.chunks_mut(OUTPUT_WIDTH) {
        let total: f32 = row.iter().sum();
        row.iter_mut().for_each(|v| *v /= total);
    }
    TrackArray::new(vec![samples, OUTPUT_WIDTH], values).unwrap()
}

pub fn batch(samples: usize, phase: usize) -> TrackBatch {
    let mut batch = TrackBatch::new();
    batch.insert(
        "dnaseq".to_string(),
        TrackArray::new(vec![samples, 4, LENGTH], signal(samples, 4 * LENGTH, phase)).unwrap(),
    );
    batch.insert(
        "netseq".to_string(),
        TrackArray::new(vec![samples, 1, LENGTH, 1], signal(samples, LENGTH, phase + 1))
            .unwrap(),
    );
    batch.insert(OUTPUT_TRACK.to_string(), targets(samples));
    batch
}
