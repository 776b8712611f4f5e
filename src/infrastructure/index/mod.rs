//! Similarity search over stored chunks.
//!
//! Small collections are scanned exactly. Above the configured threshold an
//! inverted-file index narrows the scan to the lists nearest the query.

mod exact;
mod ivf;

pub use exact::{exact_top_k, score_candidates};
pub use ivf::IvfIndex;
