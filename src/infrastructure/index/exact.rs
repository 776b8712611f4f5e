use std::sync::Arc;

use crate::domain::{Chunk, Embedding, MetadataFilter, ScoredChunk, SimilarityMetric};

/// Scores every chunk against `query` and keeps the best `k`.
pub fn exact_top_k(
    chunks: &[Arc<Chunk>],
    query: &Embedding,
    k: usize,
    metric: SimilarityMetric,
    filter: Option<&MetadataFilter>,
) -> Vec<ScoredChunk> {
    score_candidates(chunks, 0..chunks.len(), query, k, metric, filter)
}

/// Scores the chunks at `positions` and keeps the best `k`.
///
/// `positions` must be ascending so that equal similarities keep insertion
/// order after the stable sort.
pub fn score_candidates(
    chunks: &[Arc<Chunk>],
    positions: impl IntoIterator<Item = usize>,
    query: &Embedding,
    k: usize,
    metric: SimilarityMetric,
    filter: Option<&MetadataFilter>,
) -> Vec<ScoredChunk> {
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f32)> = positions
        .into_iter()
        .filter_map(|pos| chunks.get(pos).map(|chunk| (pos, chunk)))
        .filter(|(_, chunk)| filter.map_or(true, |f| f.matches(chunk)))
        .map(|(pos, chunk)| (pos, metric.similarity(query, &chunk.embedding)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);

    scored
        .into_iter()
        .map(|(pos, raw)| ScoredChunk::new(Arc::clone(&chunks[pos]), metric.normalize_score(raw)))
        .collect()
}
