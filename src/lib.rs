//! docfinder library
//!
//! Incremental document indexing and hybrid semantic search.
//!
//! # Modules
//!
//! - `core`: text normalization, data layout, configuration
//! - `search`: document store, vector index, index builder, search engine
//! - `error`: library error type

pub mod core;
pub mod error;
pub mod search;

// Re-exports for convenience
pub use core::config::Config;
pub use core::paths::DataPaths;
pub use error::{FinderError, Result};
pub use search::{
    BuildOptions, BuildReport, Document, DocumentStore, EmbeddingProvider, HarmonicEmbedder,
    IndexBuilder, SearchEngine, SearchResult, VectorIndex,
};
