//! Endless shuffled batching over a track store.

use data_contracts::TrackBatch;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::store::TrackStore;
use crate::types::{DatasetError, DatasetResult};

/// Yields fixed-size batches of the selected tracks. Sample order is reshuffled
/// each time the store is exhausted; a batch that straddles the boundary
/// continues into the next pass, so every batch is full.
pub struct MultiModalBatcher {
    store: TrackStore,
    tracks: Vec<String>,
    batch_size: usize,
    order: Vec<usize>,
    cursor: usize,
    passes: usize,
    rng: StdRng,
}

impl MultiModalBatcher {
    pub fn new(
        store: TrackStore,
        tracks: Vec<String>,
        batch_size: usize,
        seed: Option<u64>,
    ) -> DatasetResult<Self> {
        if batch_size == 0 {
            return Err(DatasetError::ZeroBatch);
        }
        store.require(&tracks)?;
        if store.samples() == 0 {
            return Err(DatasetError::Empty("training store".to_string()));
        }
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let mut order: Vec<usize> = (0..store.samples()).collect();
        order.shuffle(&mut rng);
        Ok(Self {
            store,
            tracks,
            batch_size,
            order,
            cursor: 0,
            passes: 0,
            rng,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn samples(&self) -> usize {
        self.store.samples()
    }

    /// Completed passes over the store.
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn next_batch(&mut self) -> DatasetResult<TrackBatch> {
        let mut indices = Vec::with_capacity(self.batch_size);
        while indices.len() < self.batch_size {
            if self.cursor == self.order.len() {
                self.order.shuffle(&mut self.rng);
                self.cursor = 0;
                self.passes += 1;
                debug!(passes = self.passes, "reshuffled training samples");
            }
            indices.push(self.order[self.cursor]);
            self.cursor += 1;
        }
        self.store.gather(&self.tracks, &indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_contracts::TrackArray;
    use std::collections::BTreeMap;

    fn store(samples: usize) -> TrackStore {
        let mut tracks = BTreeMap::new();
        let ids = (0..samples).map(|v| v as f32).collect();
        tracks.insert(
            "id".to_string(),
            TrackArray::new(vec![samples, 1], ids).unwrap(),
        );
        TrackStore::from_tracks(tracks).unwrap()
    }

    #[test]
    fn batches_are_full_and_cover_every_sample() {
        let mut batcher = MultiModalBatcher::new(store(5), vec!["id".into()], 2, Some(9)).unwrap();
        let mut seen = Vec::new();
        for _ in 0..5 {
            let batch = batcher.next_batch().unwrap();
            let ids = batch["id"].values().to_vec();
            assert_eq!(ids.len(), 2);
            seen.extend(ids);
        }
        assert_eq!(batcher.passes(), 1);
        let mut first_pass: Vec<_> = seen[..5].iter().map(|v| *v as usize).collect();
        first_pass.sort_unstable();
        assert_eq!(first_pass, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn rejects_unknown_tracks_and_zero_batches() {
        assert!(MultiModalBatcher::new(store(3), vec!["other".into()], 2, None).is_err());
        assert!(matches!(
            MultiModalBatcher::new(store(3), vec!["id".into()], 0, None),
            Err(DatasetError::ZeroBatch)
        ));
    }

    #[test]
    fn rejects_a_store_without_samples() {
        assert!(matches!(
            MultiModalBatcher::new(store(0), vec!["id".into()], 2, Some(1)),
            Err(DatasetError::Empty(_))
        ));
    }
}
