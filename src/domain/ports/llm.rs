use crate::domain::{errors::ProviderError, CapabilitySet, GenerateOptions};
use async_trait::async_trait;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn capabilities(&self) -> CapabilitySet;
    async fn generate(&self, prompt: &str, options: &GenerateOptions)
        -> Result<String, ProviderError>;
}
