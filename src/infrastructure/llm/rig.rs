use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::{anthropic, cohere, gemini, openai};
use serde::Deserialize;

use crate::domain::{ports::LlmProvider, CapabilitySet, GenerateOptions, ProviderError};
use crate::infrastructure::config::ProviderConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
    Cohere,
}

impl Vendor {
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
            Self::Cohere => "COHERE_API_KEY",
        }
    }

    /// Request field carrying stop sequences, where the vendor accepts one at
    /// the top level.
    fn stop_field(&self) -> Option<&'static str> {
        match self {
            Self::Anthropic | Self::Cohere => Some("stop_sequences"),
            Self::OpenAi => Some("stop"),
            Self::Gemini => None,
        }
    }
}

/// An LLM backend reached through `rig-core`.
pub struct RigProvider {
    name: String,
    vendor: Vendor,
    model: String,
    capabilities: CapabilitySet,
}

impl RigProvider {
    pub fn new(name: impl Into<String>, vendor: Vendor, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vendor,
            model: model.into(),
            capabilities: CapabilitySet::new(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(&config.name, config.vendor, &config.model)
            .with_capabilities(config.capabilities.clone())
    }

    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }
}

macro_rules! prompt_agent {
    ($client:expr, $provider:expr, $prompt:expr, $options:expr) => {{
        let mut builder = $client
            .agent(&$provider.model)
            .temperature(f64::from($options.temperature))
            .max_tokens(u64::from($options.max_tokens));
        if let Some(field) = $provider.vendor.stop_field() {
            if !$options.stop_sequences.is_empty() {
                builder = builder.additional_params(serde_json::json!({
                    field: $options.stop_sequences,
                }));
            }
        }
        builder
            .build()
            .prompt($prompt)
            .await
            .map_err(|e| classify_rig_error(&e.to_string()))
    }};
}

#[async_trait]
impl LlmProvider for RigProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities.clone()
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, ProviderError> {
        let key_var = self.vendor.api_key_var();
        if std::env::var(key_var).map_or(true, |v| v.trim().is_empty()) {
            return Err(ProviderError::Auth(format!("{key_var} is not set")));
        }

        match self.vendor {
            Vendor::Anthropic => prompt_agent!(anthropic::Client::from_env(), self, prompt, options),
            Vendor::OpenAi => prompt_agent!(openai::Client::from_env(), self, prompt, options),
            Vendor::Gemini => prompt_agent!(gemini::Client::from_env(), self, prompt, options),
            Vendor::Cohere => prompt_agent!(cohere::Client::from_env(), self, prompt, options),
        }
    }
}

const KNOWN_STATUSES: &[u16] = &[400, 401, 403, 404, 408, 413, 422, 429, 500, 502, 503, 504, 529];

/// The first standalone three-digit HTTP status in `message`. Digits inside
/// longer tokens (request ids, token counts) are ignored.
fn status_code(message: &str) -> Option<u16> {
    message
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.len() == 3 && token.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|token| token.parse().ok())
        .find(|code| KNOWN_STATUSES.contains(code))
}

/// Maps a rig error message onto the provider error taxonomy.
pub(crate) fn classify_rig_error(message: &str) -> ProviderError {
    let lower = message.to_ascii_lowercase();
    let status = status_code(message);

    if matches!(status, Some(401 | 403))
        || lower.contains("unauthorized")
        || lower.contains("invalid api key")
        || lower.contains("invalid x-api-key")
    {
        return ProviderError::Auth(message.to_string());
    }
    if status == Some(429) || lower.contains("rate limit") || lower.contains("too many requests") {
        return ProviderError::RateLimited(message.to_string());
    }
    if matches!(status, Some(400 | 413 | 422)) {
        return ProviderError::InvalidRequest(message.to_string());
    }
    if status.is_none()
        && (lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("error sending request"))
    {
        return ProviderError::Transport(message.to_string());
    }
    ProviderError::upstream(status, message)
}
