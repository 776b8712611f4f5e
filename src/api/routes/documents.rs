use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::api::error::{domain_error, retrieval_error, ApiError};
use crate::api::state::AppState;
use crate::application::IngestionReport;
use crate::domain::{Chunk, DomainError, Metadata, RawDocument};

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub documents: Vec<RawDocument>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub indexed: usize,
    pub failed: usize,
    pub reports: Vec<IngestionReport>,
}

#[derive(Debug, Serialize)]
pub struct SourceSummary {
    pub source_ref: String,
    pub chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct ChunkResponse {
    pub id: Uuid,
    pub source_ref: String,
    pub text: String,
    pub metadata: Metadata,
    pub dimension: usize,
}

impl From<&Chunk> for ChunkResponse {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id,
            source_ref: chunk.source_ref.clone(),
            text: chunk.text.clone(),
            metadata: chunk.metadata.clone(),
            dimension: chunk.embedding.dimension(),
        }
    }
}

pub async fn ingest_documents(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Json<IngestResponse> {
    let reports = state.ingestion.ingest_batch(request.documents).await;
    let indexed = reports.iter().filter(|r| r.is_success()).count();

    Json(IngestResponse {
        indexed,
        failed: reports.len() - indexed,
        reports,
    })
}

pub async fn list_sources(
    State(state): State<AppState>,
) -> Result<Json<Vec<SourceSummary>>, ApiError> {
    let cursor = state.store.all_chunks().map_err(domain_error)?;

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for chunk in cursor {
        *counts.entry(chunk.source_ref.clone()).or_default() += 1;
    }

    Ok(Json(
        counts
            .into_iter()
            .map(|(source_ref, chunks)| SourceSummary { source_ref, chunks })
            .collect(),
    ))
}

pub async fn delete_source(
    State(state): State<AppState>,
    Path(source_ref): Path<String>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let removed = state.store.delete(&source_ref).await.map_err(domain_error)?;
    if removed == 0 {
        return Err(domain_error(DomainError::not_found(format!(
            "no chunks for source {source_ref}"
        ))));
    }
    Ok(Json(RemovedResponse { removed }))
}

pub async fn clear_documents(
    State(state): State<AppState>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let removed = state.store.clear().await.map_err(domain_error)?;
    tracing::info!(removed, "Index cleared");
    Ok(Json(RemovedResponse { removed }))
}

pub async fn get_chunk(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChunkResponse>, ApiError> {
    let chunk = state.store.get(id).await.map_err(domain_error)?;
    Ok(Json(ChunkResponse::from(chunk.as_ref())))
}

pub async fn persist_index(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.store.persist().await.map_err(retrieval_error)?;
    Ok(StatusCode::NO_CONTENT)
}
