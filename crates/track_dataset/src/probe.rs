use data_contracts::TrackArray;

/// Validation rows snapshotted for prediction plots.
pub const DEFAULT_PROBE_COUNT: usize = 5;

/// Rows ordered by total signal, `count` of them starting at the median row.
/// Fewer are returned when the array runs out.
pub fn select_probe_indices(output: &TrackArray, count: usize) -> Vec<usize> {
    let sums = output.row_sums();
    let mut order: Vec<usize> = (0..sums.len()).collect();
    order.sort_by(|&a, &b| sums[a].total_cmp(&sums[b]));
    let start = order.len() / 2;
    let end = (start + count).min(order.len());
    order[start..end].to_vec()
}
