use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{
    ports::{ChunkCursor, DocumentStore, IndexKind, StoreStats},
    Chunk, Document, DomainError, Embedding, MetadataFilter, RetrievalError, ScoredChunk,
    SimilarityMetric,
};
use crate::infrastructure::config::{IndexConfig, IvfConfig};
use crate::infrastructure::index::{exact_top_k, score_candidates, IvfIndex};

pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Default)]
struct IndexState {
    chunks: Vec<Arc<Chunk>>,
    positions: HashMap<Uuid, usize>,
    ivf: Option<IvfIndex>,
}

impl IndexState {
    fn rebuild_positions(&mut self) {
        self.positions = self
            .chunks
            .iter()
            .enumerate()
            .map(|(pos, chunk)| (chunk.id, pos))
            .collect();
    }
}

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    format_version: u32,
    dimension: usize,
    metric: &'a str,
    saved_at: DateTime<Utc>,
    chunks: Vec<&'a Chunk>,
}

#[derive(Deserialize)]
struct PersistedHeader {
    format_version: u32,
    dimension: usize,
    metric: String,
}

#[derive(Deserialize)]
struct PersistedIndex {
    chunks: Vec<Chunk>,
}

/// Process-wide chunk store backed by memory and a single JSON file.
pub struct InMemoryDocumentStore {
    dimension: usize,
    metric: SimilarityMetric,
    path: Option<PathBuf>,
    exact_search_threshold: usize,
    ivf_config: IvfConfig,
    state: RwLock<IndexState>,
    /// Held for a whole persist so snapshots reach disk in order.
    persist_lock: tokio::sync::Mutex<()>,
}

impl InMemoryDocumentStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            metric: SimilarityMetric::Cosine,
            path: None,
            exact_search_threshold: IndexConfig::default().exact_search_threshold,
            ivf_config: IvfConfig::default(),
            state: RwLock::new(IndexState::default()),
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(config.dimension)
            .with_metric(config.metric)
            .with_path(&config.path)
            .with_exact_search_threshold(config.exact_search_threshold)
            .with_ivf(config.ivf.clone())
    }

    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_exact_search_threshold(mut self, threshold: usize) -> Self {
        self.exact_search_threshold = threshold;
        self
    }

    pub fn with_ivf(mut self, config: IvfConfig) -> Self {
        self.ivf_config = config;
        self
    }

    pub fn len(&self) -> usize {
        self.read().map(|s| s.chunks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, IndexState>, String> {
        self.state.read().map_err(|e| e.to_string())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, IndexState>, String> {
        self.state.write().map_err(|e| e.to_string())
    }

    /// Keeps the approximate index in step with the chunk list after
    /// `appended_from..` were pushed.
    fn refresh_ivf(&self, state: &mut IndexState, appended_from: usize) {
        let len = state.chunks.len();
        if len <= self.exact_search_threshold {
            state.ivf = None;
            return;
        }

        let retrain = state.ivf.as_ref().map_or(true, |ivf| ivf.needs_retrain(len));
        if retrain {
            info!(chunks = len, "Training IVF index");
            state.ivf = Some(IvfIndex::train(&self.ivf_config, self.metric, &state.chunks));
        } else if let Some(ivf) = state.ivf.as_mut() {
            for pos in appended_from..len {
                ivf.assign(pos, &state.chunks[pos].embedding);
            }
        }
    }

    fn validate_document(&self, state: &IndexState, doc: &Document) -> Result<(), DomainError> {
        let mut seen = HashSet::with_capacity(doc.chunks.len());
        for chunk in &doc.chunks {
            if chunk.embedding.dimension() != self.dimension {
                return Err(DomainError::validation(format!(
                    "chunk {} has dimension {}, index expects {}",
                    chunk.id,
                    chunk.embedding.dimension(),
                    self.dimension
                )));
            }
            if chunk.source_ref != doc.source_ref {
                return Err(DomainError::validation(format!(
                    "chunk {} belongs to {}, not {}",
                    chunk.id, chunk.source_ref, doc.source_ref
                )));
            }
            if state.positions.contains_key(&chunk.id) || !seen.insert(chunk.id) {
                return Err(DomainError::conflict(format!(
                    "chunk {} already exists",
                    chunk.id
                )));
            }
        }
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Chunk>, RetrievalError> {
        let header: PersistedHeader = serde_json::from_slice(bytes)?;
        if header.format_version != INDEX_FORMAT_VERSION {
            return Err(RetrievalError::UnsupportedVersion {
                found: header.format_version,
                supported: INDEX_FORMAT_VERSION,
            });
        }
        if header.dimension != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: header.dimension,
            });
        }
        if header.metric != self.metric.as_str() {
            return Err(RetrievalError::MetricMismatch {
                expected: self.metric.as_str().to_string(),
                found: header.metric,
            });
        }

        let persisted: PersistedIndex = serde_json::from_slice(bytes)?;
        let mut seen = HashSet::with_capacity(persisted.chunks.len());
        for chunk in &persisted.chunks {
            if chunk.embedding.dimension() != self.dimension {
                return Err(RetrievalError::corrupt(format!(
                    "chunk {} has dimension {}, expected {}",
                    chunk.id,
                    chunk.embedding.dimension(),
                    self.dimension
                )));
            }
            if !seen.insert(chunk.id) {
                return Err(RetrievalError::DuplicateId(chunk.id));
            }
        }
        Ok(persisted.chunks)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    #[instrument(skip(self, doc), fields(source_ref = %doc.source_ref, chunks = doc.chunks.len()))]
    async fn put(&self, doc: Document) -> Result<(), DomainError> {
        let mut state = self.write().map_err(DomainError::internal)?;
        self.validate_document(&state, &doc)?;

        let appended_from = state.chunks.len();
        for chunk in doc.chunks {
            let pos = state.chunks.len();
            state.positions.insert(chunk.id, pos);
            state.chunks.push(Arc::new(chunk));
        }
        self.refresh_ivf(&mut state, appended_from);

        debug!(total = state.chunks.len(), "Stored document chunks");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Arc<Chunk>, DomainError> {
        let state = self.read().map_err(DomainError::internal)?;
        state
            .positions
            .get(&id)
            .map(|&pos| Arc::clone(&state.chunks[pos]))
            .ok_or_else(|| DomainError::not_found(format!("chunk {id}")))
    }

    #[instrument(skip(self))]
    async fn delete(&self, source_ref: &str) -> Result<usize, DomainError> {
        let mut state = self.write().map_err(DomainError::internal)?;
        let before = state.chunks.len();
        state.chunks.retain(|c| c.source_ref != source_ref);
        let removed = before - state.chunks.len();

        if removed > 0 {
            state.rebuild_positions();
            let len = state.chunks.len();
            if len <= self.exact_search_threshold {
                state.ivf = None;
            } else if let Some(mut ivf) = state.ivf.take() {
                ivf.reassign(&state.chunks);
                state.ivf = Some(ivf);
            }
        }

        debug!(removed, "Deleted document chunks");
        Ok(removed)
    }

    async fn clear(&self) -> Result<usize, DomainError> {
        let mut state = self.write().map_err(DomainError::internal)?;
        let removed = state.chunks.len();
        *state = IndexState::default();
        info!(removed, "Cleared index");
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn persist(&self) -> Result<(), RetrievalError> {
        let path = self.path.clone().ok_or(RetrievalError::NoPersistencePath)?;
        let _guard = self.persist_lock.lock().await;

        let snapshot: Vec<Arc<Chunk>> = {
            let state = self.read().map_err(RetrievalError::corrupt)?;
            state.chunks.clone()
        };

        let payload = PersistedIndexRef {
            format_version: INDEX_FORMAT_VERSION,
            dimension: self.dimension,
            metric: self.metric.as_str(),
            saved_at: Utc::now(),
            chunks: snapshot.iter().map(|c| c.as_ref()).collect(),
        };
        let bytes = serde_json::to_vec(&payload)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "index.json".to_string());
        let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        info!(path = %path.display(), chunks = snapshot.len(), "Persisted index");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load(&self) -> Result<(), RetrievalError> {
        let path = self.path.clone().ok_or(RetrievalError::NoPersistencePath)?;

        let chunks = match tokio::fs::read(&path).await {
            Ok(bytes) => self.decode(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No persisted index, starting empty");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut fresh = IndexState {
            chunks: chunks.into_iter().map(Arc::new).collect(),
            ..IndexState::default()
        };
        fresh.rebuild_positions();
        self.refresh_ivf(&mut fresh, 0);
        let loaded = fresh.chunks.len();

        {
            let mut state = self.write().map_err(RetrievalError::corrupt)?;
            *state = fresh;
        }

        info!(path = %path.display(), chunks = loaded, "Loaded index");
        Ok(())
    }

    async fn search(
        &self,
        query: &Embedding,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        if query.dimension() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: query.dimension(),
            });
        }

        let state = self.read().map_err(RetrievalError::corrupt)?;
        if k == 0 || state.chunks.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(ivf) = &state.ivf {
            let candidates = ivf.candidates(query);
            let results =
                score_candidates(&state.chunks, candidates, query, k, self.metric, filter);
            if results.len() >= k.min(state.chunks.len()) {
                return Ok(results);
            }
            debug!(found = results.len(), k, "IVF probes came up short, scanning exactly");
        }

        Ok(exact_top_k(&state.chunks, query, k, self.metric, filter))
    }

    fn all_chunks(&self) -> Result<ChunkCursor, DomainError> {
        let state = self.read().map_err(DomainError::internal)?;
        Ok(ChunkCursor::new(state.chunks.clone()))
    }

    fn stats(&self) -> Result<StoreStats, DomainError> {
        let state = self.read().map_err(DomainError::internal)?;
        let sources: HashSet<&str> = state.chunks.iter().map(|c| c.source_ref.as_str()).collect();
        Ok(StoreStats {
            chunks: state.chunks.len(),
            sources: sources.len(),
            dimension: self.dimension,
            metric: self.metric,
            index: if state.ivf.is_some() {
                IndexKind::Ivf
            } else {
                IndexKind::Exact
            },
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn doc(source: &str, vectors: &[[f32; 3]]) -> Document {
        Document::new(source).with_chunks(
            vectors
                .iter()
                .enumerate()
                .map(|(i, v)| Chunk::new(source, format!("{source}-{i}"), Embedding::new(v.to_vec()))),
        )
    }

    #[tokio::test]
    async fn test_put_get_and_delete() {
        let store = InMemoryDocumentStore::new(3);
        let document = doc("a.txt", &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let id = document.chunks[0].id;

        store.put(document).await.unwrap();
        store.put(doc("b.txt", &[[0.0, 0.0, 1.0]])).await.unwrap();

        assert_eq!(store.get(id).await.unwrap().text, "a.txt-0");
        assert_eq!(store.stats().unwrap().sources, 2);

        assert_eq!(store.delete("a.txt").await.unwrap(), 2);
        assert_eq!(store.delete("a.txt").await.unwrap(), 0);
        assert!(matches!(store.get(id).await, Err(DomainError::NotFound(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_put_is_all_or_nothing() {
        let store = InMemoryDocumentStore::new(3);
        let mut bad = doc("a.txt", &[[1.0, 0.0, 0.0]]);
        bad.push(Chunk::new("a.txt", "short", Embedding::new(vec![1.0, 0.0])));

        assert!(matches!(store.put(bad).await, Err(DomainError::Validation(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() {
        let store = InMemoryDocumentStore::new(3);
        let first = doc("a.txt", &[[1.0, 0.0, 0.0]]);
        let dup = first.chunks[0].clone();
        store.put(first).await.unwrap();

        let again = Document::new("a.txt").with_chunks([dup]);
        assert!(matches!(store.put(again).await, Err(DomainError::Conflict(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_search_edge_cases() {
        let store = InMemoryDocumentStore::new(3);
        let query = Embedding::new(vec![1.0, 0.0, 0.0]);

        assert!(store.search(&query, 5, None).await.unwrap().is_empty());

        store
            .put(doc("a.txt", &[[1.0, 0.0, 0.0], [0.5, 0.5, 0.0]]))
            .await
            .unwrap();
        assert!(store.search(&query, 0, None).await.unwrap().is_empty());

        let all = store.search(&query, 10, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].score >= all[1].score);
        assert!(all.iter().all(|r| (0.0..=1.0).contains(&r.score)));

        let wrong = Embedding::new(vec![1.0, 0.0]);
        assert!(matches!(
            store.search(&wrong, 1, None).await,
            Err(RetrievalError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[tokio::test]
    async fn test_cursor_is_a_snapshot() {
        let store = InMemoryDocumentStore::new(3);
        store.put(doc("a.txt", &[[1.0, 0.0, 0.0]])).await.unwrap();

        let cursor = store.all_chunks().unwrap();
        store.put(doc("b.txt", &[[0.0, 1.0, 0.0]])).await.unwrap();

        assert_eq!(cursor.clone().count(), 1);
        assert_eq!(cursor.count(), 1);
        assert_eq!(store.all_chunks().unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_persist_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.json");

        let store = InMemoryDocumentStore::new(3).with_path(&path);
        store
            .put(doc("a.txt", &[[0.1, 0.2, 0.3], [1.0 / 3.0, -0.7, 1e-7]]))
            .await
            .unwrap();
        store
            .put(
                Document::new("b.txt").with_chunks([Chunk::new(
                    "b.txt",
                    "meta",
                    Embedding::new(vec![0.0, 0.5, f32::MIN_POSITIVE]),
                )
                .with_meta("page", 3usize)
                .with_meta("lang", "en")]),
            )
            .await
            .unwrap();
        store.persist().await.unwrap();

        let reloaded = InMemoryDocumentStore::new(3).with_path(&path);
        reloaded.load().await.unwrap();

        let before: Vec<_> = store.all_chunks().unwrap().collect();
        let after: Vec<_> = reloaded.all_chunks().unwrap().collect();
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.text, b.text);
            assert_eq!(a.metadata, b.metadata);
            assert_eq!(a.source_ref, b.source_ref);
            let bits_a: Vec<u32> = a.embedding.as_slice().iter().map(|x| x.to_bits()).collect();
            let bits_b: Vec<u32> = b.embedding.as_slice().iter().map(|x| x.to_bits()).collect();
            assert_eq!(bits_a, bits_b);
        }
        let files: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files, ["index.json"]);
    }

    #[tokio::test]
    async fn test_concurrent_persists_leave_a_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let store = Arc::new(InMemoryDocumentStore::new(3).with_path(&path));
        let vectors: Vec<[f32; 3]> = (0..500).map(|i| [i as f32, 1.0, -1.0]).collect();
        store.put(doc("bulk.txt", &vectors)).await.unwrap();

        for _ in 0..5 {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move { store.persist().await })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
        }

        let reloaded = InMemoryDocumentStore::new(3).with_path(&path);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.len(), 500);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryDocumentStore::new(3).with_path(dir.path().join("absent.json"));
        store.put(doc("a.txt", &[[1.0, 0.0, 0.0]])).await.unwrap();

        store.load().await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_load_rejects_mismatches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let store = InMemoryDocumentStore::new(3).with_path(&path);
        store.put(doc("a.txt", &[[1.0, 0.0, 0.0]])).await.unwrap();
        store.persist().await.unwrap();

        let other_dim = InMemoryDocumentStore::new(4).with_path(&path);
        assert!(matches!(
            other_dim.load().await,
            Err(RetrievalError::DimensionMismatch { .. })
        ));

        let other_metric = InMemoryDocumentStore::new(3)
            .with_metric(SimilarityMetric::Euclidean)
            .with_path(&path);
        assert!(matches!(
            other_metric.load().await,
            Err(RetrievalError::MetricMismatch { .. })
        ));

        let raw = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, raw.replace("\"format_version\":1", "\"format_version\":7")).unwrap();
        assert!(matches!(
            store.load().await,
            Err(RetrievalError::UnsupportedVersion { found: 7, .. })
        ));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_load_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let id = Uuid::new_v4();
        let chunk = serde_json::json!({
            "id": id, "text": "t", "embedding": [1.0, 0.0, 0.0], "source_ref": "a"
        });
        let body = serde_json::json!({
            "format_version": 1, "dimension": 3, "metric": "cosine",
            "saved_at": Utc::now(), "chunks": [chunk.clone(), chunk]
        });
        std::fs::write(&path, body.to_string()).unwrap();

        let store = InMemoryDocumentStore::new(3).with_path(&path);
        assert!(matches!(store.load().await, Err(RetrievalError::DuplicateId(d)) if d == id));
    }

    #[tokio::test]
    async fn test_persist_without_path_fails() {
        let store = InMemoryDocumentStore::new(3);
        assert!(matches!(
            store.persist().await,
            Err(RetrievalError::NoPersistencePath)
        ));
    }

    struct XorShift(u64);

    impl XorShift {
        fn next_f32(&mut self) -> f32 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            (x >> 40) as f32 / (1u64 << 24) as f32 * 2.0 - 1.0
        }
    }

    fn normalize(v: Vec<f32>) -> Embedding {
        Embedding::new(v).normalized()
    }

    #[tokio::test]
    async fn test_ivf_recall_on_clustered_data() {
        let dim = 32;
        let ivf = IvfConfig {
            lists: 16,
            probes: 4,
            train_iterations: 8,
            min_recall: 0.9,
        };
        let approx = InMemoryDocumentStore::new(dim)
            .with_exact_search_threshold(100)
            .with_ivf(ivf.clone());
        let exact = InMemoryDocumentStore::new(dim).with_exact_search_threshold(usize::MAX);

        let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
        let centres: Vec<Embedding> = (0..8)
            .map(|_| normalize((0..dim).map(|_| rng.next_f32()).collect()))
            .collect();

        let mut chunks = Vec::new();
        for (c, centre) in centres.iter().enumerate() {
            for i in 0..100 {
                let v = centre
                    .as_slice()
                    .iter()
                    .map(|x| x + 0.15 * rng.next_f32())
                    .collect();
                chunks.push(Chunk::new("clusters", format!("{c}-{i}"), normalize(v)));
            }
        }
        let document = Document::new("clusters").with_chunks(chunks);
        exact.put(document.clone()).await.unwrap();
        approx.put(document).await.unwrap();
        assert_eq!(approx.stats().unwrap().index, IndexKind::Ivf);
        assert_eq!(exact.stats().unwrap().index, IndexKind::Exact);

        let mut qrng = XorShift(42);
        let mut total = 0.0;
        let queries = 16;
        for q in 0..queries {
            let query = normalize(
                centres[q % centres.len()]
                    .as_slice()
                    .iter()
                    .map(|x| x + 0.05 * qrng.next_f32())
                    .collect(),
            );
            let truth: HashSet<Uuid> = exact
                .search(&query, 10, None)
                .await
                .unwrap()
                .iter()
                .map(|r| r.chunk.id)
                .collect();
            let found = approx.search(&query, 10, None).await.unwrap();
            let hits = found.iter().filter(|r| truth.contains(&r.chunk.id)).count();
            total += hits as f32 / 10.0;
        }

        let recall = total / queries as f32;
        assert!(recall >= ivf.min_recall, "recall {recall} below {}", ivf.min_recall);
    }

    #[tokio::test]
    async fn test_ivf_follows_deletes_and_growth() {
        let store = InMemoryDocumentStore::new(3).with_exact_search_threshold(2);
        store
            .put(doc("a", &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]))
            .await
            .unwrap();
        assert_eq!(store.stats().unwrap().index, IndexKind::Ivf);

        store.put(doc("b", &[[0.9, 0.1, 0.0]])).await.unwrap();
        let query = Embedding::new(vec![1.0, 0.0, 0.0]);
        let top = store.search(&query, 2, None).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].chunk.text, "a-0");

        store.delete("a").await.unwrap();
        assert_eq!(store.stats().unwrap().index, IndexKind::Exact);
        assert_eq!(store.search(&query, 5, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_searches() {
        let store = Arc::new(InMemoryDocumentStore::new(3));
        store
            .put(doc("a", &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]))
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let query = Embedding::new(vec![1.0, 0.0, 0.0]);
                    store.search(&query, 1, None).await.map(|r| r[0].chunk.text.clone())
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "a-0");
        }
    }
}
