use super::batch::{BatchError, GraphBatch, GraphSpec, collate};
use super::dataset::MdCathDataset;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::collections::VecDeque;
use tracing::warn;

/// Streams batches of one split.
///
/// With `num_workers > 0`, batches are prepared on a dedicated rayon pool, a window of
/// `prefetch` batches at a time; otherwise they are prepared inline. Either way the
/// batches come out in the same order.
pub struct BatchLoader<'a> {
    dataset: &'a MdCathDataset,
    indices: Vec<usize>,
    batch_size: usize,
    spec: GraphSpec,
    shuffle_seed: Option<u64>,
    pool: Option<rayon::ThreadPool>,
    prefetch: usize,
}

impl<'a> BatchLoader<'a> {
    pub fn new(
        dataset: &'a MdCathDataset,
        indices: Vec<usize>,
        batch_size: usize,
        spec: GraphSpec,
    ) -> Self {
        Self {
            dataset,
            indices,
            batch_size: batch_size.max(1),
            spec,
            shuffle_seed: None,
            pool: None,
            prefetch: 1,
        }
    }

    /// Reshuffles the split at the start of every epoch, seeded by `seed` and the epoch.
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        if num_workers == 0 {
            self.pool = None;
            self.prefetch = 1;
            return self;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("cathnet-loader-{i}"))
            .build()
        {
            Ok(pool) => {
                self.pool = Some(pool);
                self.prefetch = 2 * num_workers;
            }
            Err(e) => {
                warn!(error = %e, "Failed to start loader workers; preparing batches inline.");
                self.pool = None;
                self.prefetch = 1;
            }
        }
        self
    }

    pub fn num_samples(&self) -> usize {
        self.indices.len()
    }

    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    /// The batches of one pass over the split.
    pub fn epoch(&self, epoch: usize) -> Batches<'_, 'a> {
        let mut order = self.indices.clone();
        if let Some(seed) = self.shuffle_seed {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);
        }
        Batches {
            loader: self,
            order,
            next_start: 0,
            ready: VecDeque::new(),
        }
    }

    fn prepare(&self, chunk: &[usize]) -> Result<GraphBatch, BatchError> {
        let samples: Vec<_> = chunk.iter().map(|&i| self.dataset.sample(i)).collect();
        collate(&samples, &self.spec)
    }
}

pub struct Batches<'l, 'a> {
    loader: &'l BatchLoader<'a>,
    order: Vec<usize>,
    next_start: usize,
    ready: VecDeque<Result<GraphBatch, BatchError>>,
}

impl Batches<'_, '_> {
    fn fill(&mut self) {
        let loader = self.loader;
        let window_end = (self.next_start + loader.prefetch * loader.batch_size).min(self.order.len());
        let chunks: Vec<&[usize]> = self.order[self.next_start..window_end]
            .chunks(loader.batch_size)
            .collect();

        let prepared: Vec<_> = match &loader.pool {
            Some(pool) => pool.install(|| chunks.par_iter().map(|c| loader.prepare(c)).collect()),
            None => chunks.iter().map(|c| loader.prepare(c)).collect(),
        };
        self.ready.extend(prepared);
        self.next_start = window_end;
    }
}

impl Iterator for Batches<'_, '_> {
    type Item = Result<GraphBatch, BatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ready.is_empty() && self.next_start < self.order.len() {
            self.fill();
        }
        self.ready.pop_front()
    }
}
