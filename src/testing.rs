//! Scripted collaborators for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::{
    ports::{Embedder, LlmProvider},
    Capability, CapabilitySet, Embedding, EmbeddingError, GenerateOptions, ProviderError,
};
use crate::infrastructure::embedding::HashingEmbedder;

/// Provider that replays queued results, then falls back to a fixed
/// behaviour, recording every prompt it receives.
pub struct ScriptedProvider {
    name: String,
    capabilities: CapabilitySet,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback: Result<String, ProviderError>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capabilities: CapabilitySet::from([Capability::TextGeneration]),
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(format!("answer from {name}")),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn answering(mut self, text: &str) -> Self {
        self.fallback = Ok(text.to_string());
        self
    }

    pub fn failing_with(mut self, error: ProviderError) -> Self {
        self.fallback = Err(error);
        self
    }

    pub fn then(self, result: Result<String, ProviderError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities.clone()
    }

    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Hashing embedder that counts how many texts it embedded.
pub struct CountingEmbedder {
    inner: HashingEmbedder,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            inner: HashingEmbedder::new(dimension),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        self.calls.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

/// Embedder whose first `failures` calls fail with a provider error.
pub struct FlakyEmbedder {
    inner: HashingEmbedder,
    failures: AtomicUsize,
    attempts: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn new(dimension: usize, failures: usize) -> Self {
        Self {
            inner: HashingEmbedder::new(dimension),
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail_once(&self) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if self.fail_once() {
            return Err(EmbeddingError::provider("503 service unavailable"));
        }
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if self.fail_once() {
            return Err(EmbeddingError::provider("503 service unavailable"));
        }
        self.inner.embed_batch(texts).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}
