use std::sync::Arc;

use crate::application::{
    IngestionOptions, IngestionService, PipelineOrchestrator, PromptAssembler, ProviderRegistry,
    RegistryPolicy, RetryConfig, Retriever,
};
use crate::domain::{
    ports::{DocumentStore, Embedder},
    DomainError,
};
use crate::infrastructure::{
    embedder_from_config, reranker_from_config, AppConfig, InMemoryDocumentStore, RigProvider,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub ingestion: Arc<IngestionService>,
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn Embedder>,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        let app = &config.config;
        let retriever = Retriever::new(store.clone()).with_reranker(reranker_from_config(&app.retrieval));

        let orchestrator = PipelineOrchestrator::new(embedder.clone(), retriever, registry)
            .with_assembler(
                PromptAssembler::new(app.prompt.max_chars)
                    .with_max_history_turns(app.prompt.max_history_turns),
            )
            .with_templates(config.prompts.clone())
            .with_top_k(app.retrieval.top_k)
            .with_generation(app.generation.clone())
            .with_retry(RetryConfig::from(&app.embedding.retry));

        let ingestion =
            IngestionService::new(embedder, store.clone(), IngestionOptions::from(app));

        Self {
            orchestrator: Arc::new(orchestrator),
            ingestion: Arc::new(ingestion),
            store,
            config: Arc::new(config),
        }
    }

    /// Wires the configured store, embedder and providers together.
    pub fn from_config(config: AppConfig) -> Result<Self, DomainError> {
        let app = &config.config;
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::from_config(&app.index));
        let embedder = embedder_from_config(&app.embedding);

        let registry = Arc::new(ProviderRegistry::new(RegistryPolicy::from(&app.registry)));
        for provider in &app.providers {
            registry.register(Arc::new(RigProvider::from_config(provider)), provider.priority)?;
        }

        Ok(Self::new(config, store, embedder, registry))
    }
}
