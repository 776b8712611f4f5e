use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named operation an LLM backend supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    TextGeneration,
    Streaming,
    FunctionCalling,
    LongContext,
    Multilingual,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextGeneration => "text_generation",
            Self::Streaming => "streaming",
            Self::FunctionCalling => "function_calling",
            Self::LongContext => "long_context",
            Self::Multilingual => "multilingual",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type CapabilitySet = BTreeSet<Capability>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    #[default]
    Healthy,
    Degraded,
    Unavailable,
}

/// Registry-owned view of a provider. Callers only ever see snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderDescriptor {
    pub name: String,
    pub capabilities: CapabilitySet,
    pub priority: i32,
    pub health: HealthState,
}

impl ProviderDescriptor {
    pub fn supports(&self, required: &CapabilitySet) -> bool {
        required.is_subset(&self.capabilities)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.3,
            stop_sequences: Vec::new(),
        }
    }
}
