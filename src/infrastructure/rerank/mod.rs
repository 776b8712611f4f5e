mod lexical;
mod noop;

pub use lexical::LexicalReranker;
pub use noop::NoopReranker;

use std::sync::Arc;

use crate::domain::ports::Reranker;
use crate::infrastructure::config::{RerankerKind, RetrievalConfig};

pub fn reranker_from_config(config: &RetrievalConfig) -> Arc<dyn Reranker> {
    match config.reranker {
        RerankerKind::None => Arc::new(NoopReranker),
        RerankerKind::Lexical => Arc::new(LexicalReranker::new(config.lexical_weight)),
    }
}
