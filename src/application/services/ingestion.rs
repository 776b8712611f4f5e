use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::application::retry::{execute_with_retry, RetryConfig};
use crate::domain::{
    ports::{DocumentStore, Embedder},
    Chunk, ChunkingPolicy, Document, DomainError, EmbeddingError, Language, RawDocument,
};

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunking: ChunkingPolicy,
    pub max_document_bytes: usize,
    /// Delete earlier chunks of the same `source_ref` before storing.
    pub replace_existing: bool,
    pub retry: RetryConfig,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingPolicy::default(),
            max_document_bytes: 5 * 1024 * 1024,
            replace_existing: true,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionReport {
    pub source_ref: String,
    #[serde(flatten)]
    pub outcome: IngestionOutcome,
}

impl IngestionReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, IngestionOutcome::Indexed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestionOutcome {
    Indexed {
        chunks: usize,
        replaced: usize,
        language: Language,
    },
    Failed {
        error: String,
    },
}

/// Turns raw documents into embedded chunks in the store.
pub struct IngestionService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    options: IngestionOptions,
}

impl IngestionService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        options: IngestionOptions,
    ) -> Self {
        Self {
            embedder,
            store,
            options,
        }
    }

    #[instrument(skip(self, document), fields(source_ref = %document.source_ref, bytes = document.text.len()))]
    pub async fn ingest(&self, document: RawDocument) -> IngestionReport {
        let source_ref = document.source_ref.clone();

        let outcome = match self.try_ingest(document).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Document rejected");
                IngestionOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        IngestionReport {
            source_ref,
            outcome,
        }
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    pub async fn ingest_batch(&self, documents: Vec<RawDocument>) -> Vec<IngestionReport> {
        let mut reports = Vec::with_capacity(documents.len());
        for document in documents {
            reports.push(self.ingest(document).await);
        }

        let indexed = reports.iter().filter(|r| r.is_success()).count();
        info!(indexed, failed = reports.len() - indexed, "Batch ingested");
        reports
    }

    async fn try_ingest(&self, document: RawDocument) -> Result<IngestionOutcome, DomainError> {
        let RawDocument {
            source_ref,
            text,
            metadata,
        } = document;

        if source_ref.trim().is_empty() {
            return Err(DomainError::validation("source_ref must not be blank"));
        }
        if text.trim().is_empty() {
            return Err(DomainError::validation("document text is empty"));
        }
        if text.len() > self.options.max_document_bytes {
            return Err(DomainError::validation(format!(
                "document is {} bytes, limit is {}",
                text.len(),
                self.options.max_document_bytes
            )));
        }

        let language = Language::detect(&text);
        let pieces = self.options.chunking.split(&text);
        if pieces.is_empty() {
            return Err(DomainError::validation("document produced no chunks"));
        }

        let texts: Vec<&str> = pieces.iter().map(String::as_str).collect();
        let embedder = &self.embedder;
        let embeddings = execute_with_retry(&self.options.retry, EmbeddingError::is_retryable, || {
            embedder.embed_batch(&texts)
        })
        .await?;

        if embeddings.len() != pieces.len() {
            return Err(DomainError::external(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                pieces.len()
            )));
        }
        let expected = self.store.dimension();
        if let Some(bad) = embeddings.iter().find(|e| e.dimension() != expected) {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: bad.dimension(),
            }
            .into());
        }

        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (piece, embedding))| {
                Chunk::new(&source_ref, piece, embedding)
                    .with_metadata(metadata.clone())
                    .with_meta("chunk_index", i)
                    .with_meta("language", language.code())
            })
            .collect();
        let count = chunks.len();

        let replaced = if self.options.replace_existing {
            self.store.delete(&source_ref).await?
        } else {
            0
        };
        self.store
            .put(Document::new(source_ref).with_chunks(chunks))
            .await?;

        info!(chunks = count, replaced, language = %language, "Document indexed");
        Ok(IngestionOutcome::Indexed {
            chunks: count,
            replaced,
            language,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MetadataValue;
    use crate::infrastructure::embedding::HashingEmbedder;
    use crate::infrastructure::store::InMemoryDocumentStore;
    use crate::testing::FlakyEmbedder;
    use std::time::Duration;

    const DIM: usize = 64;

    fn options() -> IngestionOptions {
        IngestionOptions {
            chunking: ChunkingPolicy::sentences(200),
            max_document_bytes: 1024,
            replace_existing: true,
            retry: RetryConfig::default()
                .with_initial_delay(Duration::ZERO)
                .with_max_delay(Duration::ZERO),
        }
    }

    fn service(options: IngestionOptions) -> (IngestionService, Arc<dyn DocumentStore>) {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new(DIM));
        let service = IngestionService::new(Arc::new(HashingEmbedder::new(DIM)), store.clone(), options);
        (service, store)
    }

    #[tokio::test]
    async fn test_ingest_sentences() {
        let (service, store) = service(options());

        let report = service
            .ingest(RawDocument::new("nature.txt", "The sky is blue. Grass is green.").with_meta("topic", "nature"))
            .await;

        assert_eq!(
            report.outcome,
            IngestionOutcome::Indexed {
                chunks: 2,
                replaced: 0,
                language: Language::English,
            }
        );
        let chunks: Vec<_> = store.all_chunks().unwrap().collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "Grass is green.");
        assert_eq!(chunks[1].metadata["chunk_index"], MetadataValue::Int(1));
        assert_eq!(chunks[1].metadata["language"], MetadataValue::Text("en".into()));
        assert_eq!(chunks[0].metadata["topic"], MetadataValue::Text("nature".into()));
    }

    #[tokio::test]
    async fn test_punctuation_only_sentences_are_skipped() {
        let (service, store) = service(options());

        let report = service
            .ingest(RawDocument::new("book.txt", "Chapter one ends here. ... Chapter two begins."))
            .await;

        assert!(report.is_success(), "{report:?}");
        let texts: Vec<_> = store.all_chunks().unwrap().map(|c| c.text.clone()).collect();
        assert_eq!(texts, ["Chapter one ends here.", "Chapter two begins."]);
    }

    #[tokio::test]
    async fn test_reingest_replaces_existing() {
        let (service, store) = service(options());
        service.ingest(RawDocument::new("a.txt", "One. Two.")).await;

        let report = service.ingest(RawDocument::new("a.txt", "Three. Four. Five.")).await;

        assert_eq!(
            report.outcome,
            IngestionOutcome::Indexed {
                chunks: 3,
                replaced: 2,
                language: Language::English,
            }
        );
        assert_eq!(store.all_chunks().unwrap().count(), 3);
    }

    #[tokio::test]
    async fn test_append_when_not_replacing() {
        let (service, store) = service(IngestionOptions {
            replace_existing: false,
            ..options()
        });
        service.ingest(RawDocument::new("a.txt", "One. Two.")).await;
        service.ingest(RawDocument::new("a.txt", "Three.")).await;

        assert_eq!(store.all_chunks().unwrap().count(), 3);
    }

    #[tokio::test]
    async fn test_validation_failures() {
        let (service, store) = service(options());

        let reports = service
            .ingest_batch(vec![
                RawDocument::new("  ", "text"),
                RawDocument::new("empty.txt", "   \n"),
                RawDocument::new("big.txt", "x".repeat(2048)),
                RawDocument::new("ok.txt", "Fine."),
            ])
            .await;

        let ok: Vec<_> = reports.iter().map(IngestionReport::is_success).collect();
        assert_eq!(ok, [false, false, false, true]);
        assert_eq!(reports[2].source_ref, "big.txt");
        let IngestionOutcome::Failed { error } = &reports[2].outcome else {
            panic!("expected failure");
        };
        assert!(error.contains("limit is 1024"));
        assert_eq!(store.all_chunks().unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_embedding_retried() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new(DIM));
        let embedder = Arc::new(FlakyEmbedder::new(DIM, 1));
        let service = IngestionService::new(embedder.clone(), store.clone(), options());

        let report = service.ingest(RawDocument::new("a.txt", "Retry me.")).await;

        assert!(report.is_success());
        assert_eq!(embedder.attempts(), 2);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_keeps_store_untouched() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new(DIM));
        let first = IngestionService::new(Arc::new(HashingEmbedder::new(DIM)), store.clone(), options());
        first.ingest(RawDocument::new("a.txt", "Keep me.")).await;

        let wrong = IngestionService::new(Arc::new(HashingEmbedder::new(8)), store.clone(), options());
        let report = wrong.ingest(RawDocument::new("a.txt", "Replace me.")).await;

        assert!(!report.is_success());
        let chunks: Vec<_> = store.all_chunks().unwrap().collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Keep me.");
    }

    #[tokio::test]
    async fn test_arabic_document_language() {
        let (service, _) = service(options());
        let report = service.ingest(RawDocument::new("ar.txt", "السماء زرقاء. العشب أخضر.")).await;

        assert_eq!(
            report.outcome,
            IngestionOutcome::Indexed {
                chunks: 2,
                replaced: 0,
                language: Language::Arabic,
            }
        );
    }

    #[test]
    fn test_report_json_shape() {
        let report = IngestionReport {
            source_ref: "a.txt".into(),
            outcome: IngestionOutcome::Indexed {
                chunks: 2,
                replaced: 0,
                language: Language::English,
            },
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({
                "source_ref": "a.txt",
                "status": "indexed",
                "chunks": 2,
                "replaced": 0,
                "language": "en"
            })
        );
    }
}
