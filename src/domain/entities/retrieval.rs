use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{Chunk, MetadataValue};

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Arc<Chunk>,
    /// Relevance in `[0, 1]`.
    pub score: f32,
}

impl ScoredChunk {
    pub fn new(chunk: Arc<Chunk>, score: f32) -> Self {
        Self { chunk, score }
    }
}

/// Score-descending retrieval output for one query. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    entries: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a result, ordering entries by score (stable, so equal scores
    /// keep their incoming order).
    pub fn from_ranked(mut entries: Vec<ScoredChunk>) -> Self {
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredChunk> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[ScoredChunk] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ScoredChunk> {
        self.entries
    }

    pub fn top(&self) -> Option<&ScoredChunk> {
        self.entries.first()
    }

    pub fn is_score_descending(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].score >= w[1].score)
    }
}

impl IntoIterator for RetrievalResult {
    type Item = ScoredChunk;
    type IntoIter = std::vec::IntoIter<ScoredChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a ScoredChunk;
    type IntoIter = std::slice::Iter<'a, ScoredChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Equals { key: String, value: MetadataValue },
    NotEquals { key: String, value: MetadataValue },
    OneOf { key: String, values: Vec<MetadataValue> },
    Exists { key: String },
    SourceRef { source_ref: String },
}

impl Condition {
    pub fn matches(&self, chunk: &Chunk) -> bool {
        match self {
            Self::Equals { key, value } => chunk.metadata.get(key) == Some(value),
            Self::NotEquals { key, value } => chunk.metadata.get(key) != Some(value),
            Self::OneOf { key, values } => chunk
                .metadata
                .get(key)
                .is_some_and(|v| values.contains(v)),
            Self::Exists { key } => chunk.metadata.contains_key(key),
            Self::SourceRef { source_ref } => &chunk.source_ref == source_ref,
        }
    }
}

/// Conjunction of metadata conditions applied as a retrieval predicate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.conditions.push(Condition::Equals {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.conditions.push(Condition::SourceRef {
            source_ref: source_ref.into(),
        });
        self
    }

    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        self.conditions.iter().all(|c| c.matches(chunk))
    }
}
