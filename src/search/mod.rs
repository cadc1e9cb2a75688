//! Indexing pipeline and hybrid search
//!
//! - `embedding`: text → normalized vector capability
//! - `store`: document metadata and embedding cache (SQLite)
//! - `vector_index`: exact inner-product index with paired persistence
//! - `builder`: incremental corpus indexing
//! - `engine`: vector recall re-ranked by lexical overlap and length

pub mod builder;
pub mod embedding;
pub mod engine;
pub mod store;
pub mod vector_index;

pub use builder::{BuildOptions, BuildReport, IndexBuilder};
pub use embedding::{EmbeddingProvider, HarmonicEmbedder};
pub use engine::{DocumentView, SearchEngine, SearchResult};
pub use store::{Document, DocumentStore, Embedding, StoreStats};
pub use vector_index::VectorIndex;
