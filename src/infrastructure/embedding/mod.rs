mod cached;
mod hashing;
mod text;

pub use cached::CachedEmbedder;
pub use hashing::HashingEmbedder;
pub use text::RigEmbedder;

pub(crate) use hashing::tokenize;

use std::sync::Arc;

use crate::domain::ports::Embedder;
use crate::infrastructure::config::{EmbeddingConfig, EmbeddingProvider};

/// Builds the configured embedder, wrapped in a cache unless disabled.
pub fn embedder_from_config(config: &EmbeddingConfig) -> Arc<dyn Embedder> {
    let inner: Arc<dyn Embedder> = match config.provider {
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(config.dimension)),
        EmbeddingProvider::OpenAi => Arc::new(RigEmbedder::from_config(config)),
    };

    if config.cache_capacity == 0 {
        inner
    } else {
        Arc::new(CachedEmbedder::new(inner, config.cache_capacity))
    }
}
