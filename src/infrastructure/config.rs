use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::application::{IngestionOptions, PromptTemplates, RegistryPolicy, RetryConfig};
use crate::domain::{
    Capability, CapabilitySet, ChunkingPolicy, GenerateOptions, SimilarityMetric,
};
use crate::infrastructure::llm::Vendor;

pub const DEFAULT_CONFIG_PATH: &str = "config/settings.yaml";
pub const DEFAULT_PROMPTS_PATH: &str = "config/prompts.yaml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("invalid environment override {key}={value}")]
    Env { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub config: Config,
    pub prompts: PromptTemplates,
}

impl AppConfig {
    /// Loads settings and prompts from the paths named by `RAG_CONFIG` and
    /// `RAG_PROMPTS`, falling back to the `config/` directory. A missing file
    /// yields defaults; environment overrides are applied last.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("RAG_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let prompts_path =
            std::env::var("RAG_PROMPTS").unwrap_or_else(|_| DEFAULT_PROMPTS_PATH.into());

        let mut config: Config = read_yaml_or_default(Path::new(&config_path))?;
        let prompts: PromptTemplates = read_yaml_or_default(Path::new(&prompts_path))?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(Self { config, prompts })
    }

    pub fn from_yaml_str(settings: &str, prompts: &str) -> Result<Self, ConfigError> {
        let config: Config = parse_yaml("<settings>", settings)?;
        let prompts: PromptTemplates = parse_yaml("<prompts>", prompts)?;
        config.validate()?;
        Ok(Self { config, prompts })
    }
}

fn read_yaml_or_default<T>(path: &Path) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    let shown = path.display().to_string();
    match std::fs::read_to_string(path) {
        Ok(content) => parse_yaml(&shown, &content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %shown, "Config file not found, using defaults");
            Ok(T::default())
        }
        Err(source) => Err(ConfigError::Read {
            path: shown,
            source,
        }),
    }
}

fn parse_yaml<T>(path: &str, content: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub index: IndexConfig,
    pub chunking: ChunkingPolicy,
    pub ingestion: IngestionConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub registry: RegistryConfig,
    pub generation: GenerateOptions,
    pub providers: Vec<ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cors: CorsConfig::default(),
            index: IndexConfig::default(),
            chunking: ChunkingPolicy::default(),
            ingestion: IngestionConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            prompt: PromptConfig::default(),
            registry: RegistryConfig::default(),
            generation: GenerateOptions::default(),
            providers: vec![ProviderConfig::default()],
        }
    }
}

impl Config {
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SERVER_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::Env {
                key: "SERVER_PORT".into(),
                value: port,
            })?;
        }
        if let Ok(path) = std::env::var("INDEX_PATH") {
            self.index.path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.index.dimension == 0 {
            return Err(ConfigError::Invalid("index.dimension must be positive".into()));
        }
        if self.embedding.dimension != self.index.dimension {
            return Err(ConfigError::Invalid(format!(
                "embedding.dimension ({}) differs from index.dimension ({})",
                self.embedding.dimension, self.index.dimension
            )));
        }
        if self.index.ivf.lists == 0 || self.index.ivf.probes == 0 {
            return Err(ConfigError::Invalid("index.ivf lists and probes must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.index.ivf.min_recall) {
            return Err(ConfigError::Invalid("index.ivf.min_recall must be in [0, 1]".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid("retrieval.top_k must be positive".into()));
        }
        if self.prompt.max_chars == 0 {
            return Err(ConfigError::Invalid("prompt.max_chars must be positive".into()));
        }
        if self.ingestion.max_document_bytes == 0 {
            return Err(ConfigError::Invalid(
                "ingestion.max_document_bytes must be positive".into(),
            ));
        }
        let registry = &self.registry;
        if registry.max_attempts == 0 || registry.degraded_after == 0 || registry.unavailable_after == 0
        {
            return Err(ConfigError::Invalid(
                "registry attempts and health thresholds must be positive".into(),
            ));
        }
        if registry.cooldown_base_ms > registry.cooldown_max_ms {
            return Err(ConfigError::Invalid(
                "registry.cooldown_base_ms exceeds cooldown_max_ms".into(),
            ));
        }
        if self.providers.is_empty() {
            return Err(ConfigError::Invalid("at least one provider is required".into()));
        }
        let mut names = std::collections::HashSet::new();
        for provider in &self.providers {
            if !names.insert(provider.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate provider name {}",
                    provider.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub path: PathBuf,
    pub dimension: usize,
    pub metric: SimilarityMetric,
    /// Collections at or below this size are scanned exactly.
    pub exact_search_threshold: usize,
    pub ivf: IvfConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/index.json"),
            dimension: 256,
            metric: SimilarityMetric::Cosine,
            exact_search_threshold: 1024,
            ivf: IvfConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IvfConfig {
    pub lists: usize,
    pub probes: usize,
    pub train_iterations: usize,
    /// Recall the approximate index must reach against exact search.
    pub min_recall: f32,
}

impl Default for IvfConfig {
    fn default() -> Self {
        Self {
            lists: 16,
            probes: 4,
            train_iterations: 8,
            min_recall: 0.9,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub max_document_bytes: usize,
    pub replace_existing: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: 5 * 1024 * 1024,
            replace_existing: true,
        }
    }
}

impl From<&Config> for IngestionOptions {
    fn from(config: &Config) -> Self {
        Self {
            chunking: config.chunking.clone(),
            max_document_bytes: config.ingestion.max_document_bytes,
            replace_existing: config.ingestion.replace_existing,
            retry: RetryConfig::from(&config.embedding.retry),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    #[default]
    Hashing,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimension: usize,
    /// Zero disables the cache.
    pub cache_capacity: usize,
    pub retry: RetrySettings,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            model: "text-embedding-3-small".to_string(),
            dimension: 256,
            cache_capacity: 1024,
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 250,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        RetryConfig::default()
            .with_max_retries(settings.max_retries)
            .with_initial_delay(Duration::from_millis(settings.initial_delay_ms))
            .with_max_delay(Duration::from_millis(settings.max_delay_ms))
            .with_backoff_multiplier(settings.backoff_multiplier)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankerKind {
    #[default]
    None,
    Lexical,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub reranker: RerankerKind,
    /// Share of the final score taken from query-term overlap.
    pub lexical_weight: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            reranker: RerankerKind::None,
            lexical_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub max_chars: usize,
    pub max_history_turns: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_chars: 12_000,
            max_history_turns: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub max_attempts: usize,
    pub degraded_after: u32,
    pub unavailable_after: u32,
    pub cooldown_base_ms: u64,
    pub cooldown_max_ms: u64,
    pub call_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            degraded_after: 2,
            unavailable_after: 2,
            cooldown_base_ms: 1_000,
            cooldown_max_ms: 60_000,
            call_timeout_ms: 30_000,
        }
    }
}

impl From<&RegistryConfig> for RegistryPolicy {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            degraded_after: config.degraded_after,
            unavailable_after: config.unavailable_after,
            cooldown_base: Duration::from_millis(config.cooldown_base_ms),
            cooldown_max: Duration::from_millis(config.cooldown_max_ms),
            call_timeout: Duration::from_millis(config.call_timeout_ms),
        }
    }
}

fn default_provider_capabilities() -> CapabilitySet {
    CapabilitySet::from([Capability::TextGeneration])
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub vendor: Vendor,
    pub model: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_provider_capabilities")]
    pub capabilities: CapabilitySet,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "anthropic".into(),
            vendor: Vendor::Anthropic,
            model: "claude-3-5-haiku-latest".into(),
            priority: 0,
            capabilities: default_provider_capabilities(),
        }
    }
}
