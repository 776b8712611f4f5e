use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use crate::application::retry::{execute_with_retry, RetryConfig};
use crate::domain::{
    ports::Embedder, Citation, EmbeddingError, GenerateOptions, Language, MetadataFilter,
    PipelineError, PipelineFailure, PipelineRequest, PipelineResponse, PipelineState,
    RetrievalResult,
};

use super::cancellation::CancellationToken;
use super::prompt::{PromptAssembler, PromptTemplates};
use super::registry::ProviderRegistry;
use super::retriever::Retriever;

/// One request's walk through the state machine.
struct OrchestrationRun {
    state: PipelineState,
    transitions: Vec<PipelineState>,
}

impl OrchestrationRun {
    fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            transitions: vec![PipelineState::Idle],
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "Pipeline transition");
        self.state = next;
        self.transitions.push(next);
    }

    fn fail(mut self, failure: impl Into<PipelineFailure>) -> PipelineError {
        let stage = self.state;
        let failure = failure.into();
        error!(stage = %stage, error = %failure, "Pipeline failed");
        self.advance(PipelineState::Failed);
        PipelineError {
            stage,
            failure,
            transitions: self.transitions,
        }
    }
}

/// Sequences retrieval, prompt assembly and provider dispatch for each query.
///
/// The store and the registry are shared; every call to [`query`] gets its own
/// run and trace.
///
/// [`query`]: PipelineOrchestrator::query
pub struct PipelineOrchestrator {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    registry: Arc<ProviderRegistry>,
    assembler: PromptAssembler,
    templates: PromptTemplates,
    top_k: usize,
    generation: GenerateOptions,
    retry: RetryConfig,
}

impl PipelineOrchestrator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        retriever: Retriever,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            embedder,
            retriever,
            registry,
            assembler: PromptAssembler::default(),
            templates: PromptTemplates::default(),
            top_k: 4,
            generation: GenerateOptions::default(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_generation(mut self, generation: GenerateOptions) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub async fn query(&self, request: PipelineRequest) -> Result<PipelineResponse, PipelineError> {
        self.query_with_cancellation(request, CancellationToken::none())
            .await
    }

    #[instrument(skip(self, request, cancel), fields(query_chars = request.query.chars().count()))]
    pub async fn query_with_cancellation(
        &self,
        request: PipelineRequest,
        cancel: CancellationToken,
    ) -> Result<PipelineResponse, PipelineError> {
        let mut run = OrchestrationRun::new();
        let PipelineRequest {
            query,
            history,
            options,
        } = request;
        let language = options
            .language
            .unwrap_or_else(|| Language::detect(&query));

        if cancel.is_cancelled() {
            return Err(run.fail(PipelineFailure::Cancelled));
        }

        let retrieval = if options.skip_retrieval {
            RetrievalResult::empty()
        } else {
            run.advance(PipelineState::Retrieving);
            let k = options.top_k.unwrap_or(self.top_k);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(PipelineFailure::Cancelled),
                result = self.retrieve(&query, k, options.filter.as_ref()) => result,
            };
            match outcome {
                Ok(retrieval) => retrieval,
                Err(failure) => return Err(run.fail(failure)),
            }
        };

        if cancel.is_cancelled() {
            return Err(run.fail(PipelineFailure::Cancelled));
        }
        run.advance(PipelineState::Assembling);

        let template = self.templates.for_language(language);
        let prompt = match self.assembler.assemble(&query, &history, &retrieval, template) {
            Ok(prompt) => prompt,
            Err(e) => return Err(run.fail(e)),
        };
        debug!(
            chars = prompt.char_len(),
            context = prompt.retained.len(),
            dropped_context = prompt.dropped_context,
            dropped_history = prompt.dropped_history,
            "Prompt assembled"
        );

        if cancel.is_cancelled() {
            return Err(run.fail(PipelineFailure::Cancelled));
        }
        run.advance(PipelineState::Dispatching);

        let generation = options
            .generation
            .as_ref()
            .unwrap_or(&self.generation);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineFailure::Cancelled),
            result = self.registry.dispatch_with_fallback(
                &options.required_capabilities,
                &prompt.text,
                generation,
            ) => result.map_err(PipelineFailure::from),
        };
        let dispatched = match outcome {
            Ok(dispatched) => dispatched,
            Err(failure) => return Err(run.fail(failure)),
        };

        run.advance(PipelineState::Succeeded);
        info!(
            provider = %dispatched.provider,
            failed_attempts = dispatched.attempts.len(),
            language = %language,
            "Query answered"
        );

        let citations = prompt
            .retained
            .iter()
            .enumerate()
            .map(|(i, entry)| Citation {
                index: i + 1,
                chunk_id: entry.chunk.id,
                source_ref: entry.chunk.source_ref.clone(),
                score: entry.score,
            })
            .collect();

        Ok(PipelineResponse {
            answer: dispatched.text,
            retrieval: prompt.retained,
            provider: dispatched.provider,
            citations,
            language,
            transitions: run.transitions,
        })
    }

    async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<RetrievalResult, PipelineFailure> {
        let embedder = &self.embedder;
        let vector = execute_with_retry(&self.retry, EmbeddingError::is_retryable, || {
            embedder.embed(query)
        })
        .await?;

        Ok(self
            .retriever
            .retrieve_with_text(query, &vector, k, filter)
            .await?)
    }
}
