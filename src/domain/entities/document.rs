use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::Embedding;

/// Scalar metadata value attached to a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for MetadataValue {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// A unit of retrievable text. Immutable once stored; identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub text: String,
    pub embedding: Embedding,
    #[serde(default)]
    pub metadata: Metadata,
    pub source_ref: String,
}

impl Chunk {
    pub fn new(
        source_ref: impl Into<String>,
        text: impl Into<String>,
        embedding: Embedding,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            embedding,
            metadata: Metadata::new(),
            source_ref: source_ref.into(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Ordered chunks sharing one `source_ref`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub source_ref: String,
    pub chunks: Vec<Chunk>,
}

impl Document {
    pub fn new(source_ref: impl Into<String>) -> Self {
        Self {
            source_ref: source_ref.into(),
            chunks: Vec::new(),
        }
    }

    /// Appends a chunk, forcing its `source_ref` to the document's.
    pub fn push(&mut self, mut chunk: Chunk) {
        chunk.source_ref.clone_from(&self.source_ref);
        self.chunks.push(chunk);
    }

    pub fn with_chunks(mut self, chunks: impl IntoIterator<Item = Chunk>) -> Self {
        for chunk in chunks {
            self.push(chunk);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Raw text handed over by the ingestion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub source_ref: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl RawDocument {
    pub fn new(source_ref: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_ref: source_ref.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
