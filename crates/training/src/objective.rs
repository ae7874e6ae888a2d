//! Divergence loss and coarse positional accuracy.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Added to both distributions before taking logs.
pub const EPSILON: f64 = 1e-10;
/// The output axis is split into this many equal buckets for accuracy.
pub const ACCURACY_BUCKETS: usize = 10;

/// `mean_b sum_i (t + eps) * (log(t + eps) - log(p + eps))` over `[batch, width]` rows.
pub fn kl_divergence<B: Backend>(target: Tensor<B, 2>, prediction: Tensor<B, 2>) -> Tensor<B, 1> {
    let target = target.add_scalar(EPSILON);
    let prediction = prediction.add_scalar(EPSILON);
    let per_row = (target.clone() * (target.log() - prediction.log())).sum_dim(1);
    per_row.mean()
}

/// Index of the first maximum.
pub fn argmax(row: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in row.iter().enumerate() {
        if *v > row[best] {
            best = i;
        }
    }
    best
}

/// `floor(10 * index / width)`, clamped to the last bucket.
pub fn accuracy_bucket(index: usize, width: usize) -> usize {
    if width == 0 {
        return 0;
    }
    (ACCURACY_BUCKETS * index / width).min(ACCURACY_BUCKETS - 1)
}

/// Rows of `target` and `prediction` (row-major, `width` wide) whose arg-max
/// buckets agree.
pub fn bucketed_accuracy(target: &[f32], prediction: &[f32], width: usize) -> usize {
    if width == 0 {
        return 0;
    }
    target
        .chunks(width)
        .zip(prediction.chunks(width))
        .filter(|(t, p)| accuracy_bucket(argmax(t), width) == accuracy_bucket(argmax(p), width))
        .count()
}
