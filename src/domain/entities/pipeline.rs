use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    Capability, CapabilitySet, GenerateOptions, Language, Message, MetadataFilter,
    RetrievalResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Retrieving,
    Assembling,
    Dispatching,
    Succeeded,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Legal edges of the orchestration state machine.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Retrieving)
                | (Idle, Assembling)
                | (Retrieving, Assembling)
                | (Assembling, Dispatching)
                | (Dispatching, Succeeded)
                | (Idle | Retrieving | Assembling | Dispatching, Failed)
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Retrieving => "Retrieving",
            Self::Assembling => "Assembling",
            Self::Dispatching => "Dispatching",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

fn default_capabilities() -> CapabilitySet {
    CapabilitySet::from([Capability::TextGeneration])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Overrides the configured retrieval depth.
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub filter: Option<MetadataFilter>,
    #[serde(default)]
    pub skip_retrieval: bool,
    #[serde(default = "default_capabilities")]
    pub required_capabilities: CapabilitySet,
    #[serde(default)]
    pub generation: Option<GenerateOptions>,
    /// Forces the prompt language instead of detecting it from the query.
    #[serde(default)]
    pub language: Option<Language>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: None,
            filter: None,
            skip_retrieval: false,
            required_capabilities: default_capabilities(),
            generation: None,
            language: None,
        }
    }
}

impl QueryOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn without_retrieval(mut self) -> Self {
        self.skip_retrieval = true;
        self
    }

    pub fn requiring(mut self, capability: Capability) -> Self {
        self.required_capabilities.insert(capability);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub query: String,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub options: QueryOptions,
}

impl PipelineRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            history: Vec::new(),
            options: QueryOptions::default(),
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// A numbered reference from the prompt context back to its chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub index: usize,
    pub chunk_id: Uuid,
    pub source_ref: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct PipelineResponse {
    pub answer: String,
    /// The context actually placed in the prompt.
    pub retrieval: RetrievalResult,
    pub provider: String,
    pub citations: Vec<Citation>,
    pub language: Language,
    pub transitions: Vec<PipelineState>,
}

impl PipelineResponse {
    /// The answer followed by a "Sources" block listing cited chunks.
    pub fn answer_with_sources(&self) -> String {
        if self.citations.is_empty() {
            return self.answer.clone();
        }

        let header = match self.language {
            Language::Arabic => "المصادر:",
            _ => "Sources:",
        };
        let sources = self
            .citations
            .iter()
            .map(|c| format!("[{}] {}", c.index, c.source_ref))
            .collect::<Vec<_>>()
            .join("\n");

        format!("{}\n\n---\n\n{header}\n{sources}", self.answer)
    }
}
