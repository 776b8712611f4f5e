use std::sync::Arc;

use crate::domain::{Chunk, Embedding, SimilarityMetric};
use crate::infrastructure::config::IvfConfig;

/// Inverted-file index: k-means centroids with one posting list each.
///
/// Lists hold positions into the store's insertion-ordered chunk vector.
/// Training is deterministic for a given chunk sequence.
#[derive(Debug, Clone)]
pub struct IvfIndex {
    metric: SimilarityMetric,
    probes: usize,
    centroids: Vec<Embedding>,
    lists: Vec<Vec<usize>>,
    trained_on: usize,
}

impl IvfIndex {
    pub fn train(config: &IvfConfig, metric: SimilarityMetric, chunks: &[Arc<Chunk>]) -> Self {
        let n = chunks.len();
        let list_count = config.lists.clamp(1, n.max(1));

        let mut centroids: Vec<Embedding> = (0..list_count)
            .filter_map(|i| chunks.get(i * n / list_count))
            .map(|c| c.embedding.clone())
            .collect();

        for _ in 0..config.train_iterations {
            let lists = assign_all(&centroids, metric, chunks);
            let mut moved = false;
            for (centroid, members) in centroids.iter_mut().zip(&lists) {
                if let Some(mean) = mean_of(chunks, members, metric) {
                    moved |= mean != *centroid;
                    *centroid = mean;
                }
            }
            if !moved {
                break;
            }
        }

        let lists = assign_all(&centroids, metric, chunks);
        tracing::debug!(
            chunks = n,
            lists = centroids.len(),
            iterations = config.train_iterations,
            "Trained IVF index"
        );

        Self {
            metric,
            probes: config.probes.max(1),
            centroids,
            lists,
            trained_on: n,
        }
    }

    /// Appends a newly stored chunk to its nearest list.
    pub fn assign(&mut self, position: usize, embedding: &Embedding) {
        if let Some(list) = nearest(&self.centroids, self.metric, embedding) {
            self.lists[list].push(position);
        }
    }

    /// Recomputes every list against the current centroids, e.g. after
    /// positions shifted because chunks were removed.
    pub fn reassign(&mut self, chunks: &[Arc<Chunk>]) {
        self.lists = assign_all(&self.centroids, self.metric, chunks);
    }

    /// True once the collection has doubled since the last training.
    pub fn needs_retrain(&self, len: usize) -> bool {
        len >= self.trained_on.saturating_mul(2)
    }

    pub fn list_count(&self) -> usize {
        self.centroids.len()
    }

    /// Ascending positions in the `probes` lists closest to `query`.
    pub fn candidates(&self, query: &Embedding) -> Vec<usize> {
        let mut ranked: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, self.metric.similarity(query, c)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut positions: Vec<usize> = ranked
            .iter()
            .take(self.probes)
            .flat_map(|(i, _)| self.lists[*i].iter().copied())
            .collect();
        positions.sort_unstable();
        positions
    }
}

fn nearest(centroids: &[Embedding], metric: SimilarityMetric, v: &Embedding) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, c) in centroids.iter().enumerate() {
        let sim = metric.similarity(v, c);
        if best.map_or(true, |(_, b)| sim > b) {
            best = Some((i, sim));
        }
    }
    best.map(|(i, _)| i)
}

fn assign_all(
    centroids: &[Embedding],
    metric: SimilarityMetric,
    chunks: &[Arc<Chunk>],
) -> Vec<Vec<usize>> {
    let mut lists = vec![Vec::new(); centroids.len()];
    for (pos, chunk) in chunks.iter().enumerate() {
        if let Some(list) = nearest(centroids, metric, &chunk.embedding) {
            lists[list].push(pos);
        }
    }
    lists
}

fn mean_of(chunks: &[Arc<Chunk>], members: &[usize], metric: SimilarityMetric) -> Option<Embedding> {
    let first = chunks.get(*members.first()?)?;
    let mut sum = vec![0.0f32; first.embedding.dimension()];
    for &pos in members {
        for (acc, x) in sum.iter_mut().zip(chunks[pos].embedding.as_slice()) {
            *acc += x;
        }
    }
    let count = members.len() as f32;
    sum.iter_mut().for_each(|x| *x /= count);

    let mean = Embedding::new(sum);
    Some(match metric {
        SimilarityMetric::Cosine => mean.normalized(),
        _ => mean,
    })
}
