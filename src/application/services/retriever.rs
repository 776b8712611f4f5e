use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::{
    ports::{DocumentStore, Reranker},
    Embedding, MetadataFilter, RetrievalError, RetrievalResult, ScoredChunk,
};

/// Top-k similarity search over the store followed by an optional re-ranking
/// pass that may reorder, but never add or drop, entries.
pub struct Retriever {
    store: Arc<dyn DocumentStore>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl Retriever {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            reranker: None,
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    #[instrument(skip(self, query, filter), fields(dimension = query.dimension()))]
    pub async fn retrieve(
        &self,
        query: &Embedding,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<RetrievalResult, RetrievalError> {
        let entries = self.store.search(query, k, filter).await?;
        Ok(into_result(entries))
    }

    /// Same as [`Retriever::retrieve`] but hands the query text to the
    /// re-ranker.
    #[instrument(skip(self, query_vector, filter))]
    pub async fn retrieve_with_text(
        &self,
        query_text: &str,
        query_vector: &Embedding,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<RetrievalResult, RetrievalError> {
        let entries = self.store.search(query_vector, k, filter).await?;
        let Some(reranker) = &self.reranker else {
            return Ok(into_result(entries));
        };
        if entries.len() < 2 {
            return Ok(into_result(entries));
        }

        let original = entries.clone();
        let reranked = reranker.rerank(query_text, entries).await;

        if !same_members(&original, &reranked) {
            warn!(
                reranker = reranker.name(),
                "Re-ranker changed result membership, keeping vector order"
            );
            return Ok(into_result(original));
        }

        debug!(reranker = reranker.name(), count = reranked.len(), "Re-ranked results");
        Ok(into_result(reranked))
    }
}

fn into_result(entries: Vec<ScoredChunk>) -> RetrievalResult {
    RetrievalResult::from_ranked(
        entries
            .into_iter()
            .map(|e| ScoredChunk::new(e.chunk, e.score.clamp(0.0, 1.0)))
            .collect(),
    )
}

fn same_members(a: &[ScoredChunk], b: &[ScoredChunk]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let ids: HashSet<_> = a.iter().map(|e| e.chunk.id).collect();
    let other: HashSet<_> = b.iter().map(|e| e.chunk.id).collect();
    ids == other
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChunkingPolicy, Chunk, Document};
    use crate::infrastructure::embedding::HashingEmbedder;
    use crate::infrastructure::rerank::LexicalReranker;
    use crate::infrastructure::store::InMemoryDocumentStore;
    use async_trait::async_trait;

    const DIM: usize = 64;

    async fn store_with(source: &str, text: &str, policy: &ChunkingPolicy) -> Arc<dyn DocumentStore> {
        let embedder = HashingEmbedder::new(DIM);
        let store = InMemoryDocumentStore::new(DIM);
        let chunks = policy
            .split(text)
            .into_iter()
            .map(|piece| {
                let embedding = embedder.embed_sync(&piece).unwrap();
                Chunk::new(source, piece, embedding)
            })
            .collect::<Vec<_>>();
        store.put(Document::new(source).with_chunks(chunks)).await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_grass_scenario() {
        let policy = ChunkingPolicy::sentences(200);
        let store = store_with("nature.txt", "The sky is blue. Grass is green.", &policy).await;
        assert_eq!(store.all_chunks().unwrap().count(), 2);

        let query = HashingEmbedder::new(DIM).embed_sync("What color is grass?").unwrap();
        let result = Retriever::new(store).retrieve(&query, 1, None).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.entries()[0].chunk.text, "Grass is green.");
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty_result() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new(DIM));
        let query = HashingEmbedder::new(DIM).embed_sync("anything").unwrap();

        let result = Retriever::new(store).retrieve(&query, 5, None).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_results_bounded_and_descending() {
        let text = "Rust is fast. Rust is safe. Python is dynamic. Go has goroutines. \
                    Rust has traits. Java runs on the JVM.";
        let store = store_with("langs.txt", text, &ChunkingPolicy::sentences(200)).await;
        let query = HashingEmbedder::new(DIM).embed_sync("is rust safe").unwrap();
        let retriever = Retriever::new(store);

        for k in [1, 3, 6, 20] {
            let result = retriever.retrieve(&query, k, None).await.unwrap();
            assert!(result.len() <= k);
            assert!(result.is_score_descending());
            assert!(result.iter().all(|e| (0.0..=1.0).contains(&e.score)));
        }
        assert_eq!(retriever.retrieve(&query, 20, None).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_lexical_rerank_keeps_membership() {
        let text = "Cats sleep a lot. Dogs bark at night. Cats purr when happy.";
        let store = store_with("pets.txt", text, &ChunkingPolicy::sentences(200)).await;
        let query_text = "why do cats purr";
        let query = HashingEmbedder::new(DIM).embed_sync(query_text).unwrap();

        let plain = Retriever::new(store.clone())
            .retrieve(&query, 2, None)
            .await
            .unwrap();
        let reranked = Retriever::new(store)
            .with_reranker(Arc::new(LexicalReranker::new(0.5)))
            .retrieve_with_text(query_text, &query, 2, None)
            .await
            .unwrap();

        let ids = |r: &RetrievalResult| r.iter().map(|e| e.chunk.id).collect::<HashSet<_>>();
        assert_eq!(ids(&plain), ids(&reranked));
        assert!(reranked.is_score_descending());
    }

    struct DroppingReranker;

    #[async_trait]
    impl Reranker for DroppingReranker {
        fn name(&self) -> &str {
            "dropping"
        }

        async fn rerank(&self, _query: &str, mut entries: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
            entries.pop();
            entries
        }
    }

    #[tokio::test]
    async fn test_membership_changing_reranker_is_ignored() {
        let text = "Alpha one. Beta two. Gamma three.";
        let store = store_with("greek.txt", text, &ChunkingPolicy::sentences(200)).await;
        let query = HashingEmbedder::new(DIM).embed_sync("alpha beta gamma").unwrap();

        let result = Retriever::new(store)
            .with_reranker(Arc::new(DroppingReranker))
            .retrieve_with_text("alpha beta gamma", &query, 3, None)
            .await
            .unwrap();

        assert_eq!(result.len(), 3);
    }

    #[tokio::test]
    async fn test_filter_restricts_candidates() {
        let embedder = HashingEmbedder::new(DIM);
        let store = InMemoryDocumentStore::new(DIM);
        for source in ["a.txt", "b.txt"] {
            let chunk = Chunk::new(source, "shared words here", embedder.embed_sync("shared words here").unwrap());
            store.put(Document::new(source).with_chunks([chunk])).await.unwrap();
        }
        let store: Arc<dyn DocumentStore> = Arc::new(store);
        let query = embedder.embed_sync("shared words").unwrap();
        let filter = MetadataFilter::new().source_ref("b.txt");

        let result = Retriever::new(store)
            .retrieve(&query, 5, Some(&filter))
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.entries()[0].chunk.source_ref, "b.txt");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_error() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new(DIM));
        let query = HashingEmbedder::new(8).embed_sync("short").unwrap();

        let err = Retriever::new(store).retrieve(&query, 1, None).await.unwrap_err();
        assert!(matches!(err, RetrievalError::DimensionMismatch { expected: 64, actual: 8 }));
    }
}
