mod in_memory;

pub use in_memory::{InMemoryDocumentStore, INDEX_FORMAT_VERSION};
