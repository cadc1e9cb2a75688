//! Search Engine - vector recall plus lexical and length re-ranking

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::embedding::EmbeddingProvider;
use super::store::{Document, DocumentStore};
use super::vector_index::VectorIndex;
use crate::core::paths::DataPaths;
use crate::core::text::{make_preview, read_body, token_set};
use crate::error::{FinderError, Result};

const COSINE_WEIGHT: f32 = 0.7;
const OVERLAP_WEIGHT: f32 = 0.2;
const LENGTH_WEIGHT: f32 = 0.1;

/// Keywords cited in a result's reason
const REASON_KEYWORDS: usize = 5;

/// Ranked, explained search hit
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub doc_id: String,
    pub composite_score: f32,
    pub cosine_sim: f32,
    pub overlap_ratio: f32,
    pub len_score: f32,
    pub overlap_keywords: Vec<String>,
    pub preview: String,
    pub category: String,
    pub reason: String,
}

/// Document metadata with its current file text
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub document: Document,
    pub text: String,
}

impl DocumentView {
    /// Metadata plus current file text; a missing file yields empty text.
    ///
    /// Needs only the store, so it works before any index exists.
    pub fn load(store: &DocumentStore, doc_id: &str) -> Result<Option<Self>> {
        Ok(store.get_document(doc_id)?.map(|document| Self {
            text: load_text(&document),
            document,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Explanation {
    composite_score: f32,
    overlap_ratio: f32,
    len_score: f32,
    overlap_keywords: Vec<String>,
    reason: String,
}

pub struct SearchEngine {
    store: DocumentStore,
    index: Option<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SearchEngine {
    pub fn new(
        store: DocumentStore,
        index: Option<VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
        }
    }

    /// Open the store and load the persisted index.
    ///
    /// A missing index is not fatal: the engine starts empty and every
    /// search returns no results until the index is built and reloaded.
    /// An index built by an embedder of another dimension is rejected.
    pub fn open(paths: &DataPaths, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let store = DocumentStore::open(&paths.cache_db)?;
        let index = match VectorIndex::load(&paths.index_file, &paths.index_meta) {
            Ok(index) if index.dimension() != embedder.dimension() => {
                return Err(FinderError::DimensionMismatch {
                    expected: embedder.dimension(),
                    actual: index.dimension(),
                });
            }
            Ok(index) => {
                debug!(vectors = index.len(), "loaded vector index");
                Some(index)
            }
            Err(FinderError::NotFound(what)) => {
                warn!("{}; search will return no results", what);
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self::new(store, index, embedder))
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Number of vectors in the loaded index
    pub fn index_size(&self) -> usize {
        self.index.as_ref().map_or(0, VectorIndex::len)
    }

    /// Rank documents for `query`, best first
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_one(query)?;
        let Some(index) = self.index.as_ref().filter(|i| !i.is_empty()) else {
            return Ok(Vec::new());
        };

        let k = top_k.min(index.len());
        let query_tokens = token_set(query);
        let mut results = Vec::with_capacity(k);

        for (row, cosine_sim) in index.search(&query_vector, k)? {
            let Some(doc_id) = index.id(row) else {
                continue;
            };
            let Some(doc) = self.store.get_document(doc_id)? else {
                debug!(doc_id, "index entry has no document record; skipping");
                continue;
            };

            let text = load_text(&doc);
            let explanation = explain(&query_tokens, &text, doc.length_tokens, cosine_sim);

            results.push(SearchResult {
                doc_id: doc.doc_id,
                composite_score: explanation.composite_score,
                cosine_sim,
                overlap_ratio: explanation.overlap_ratio,
                len_score: explanation.len_score,
                overlap_keywords: explanation.overlap_keywords,
                preview: make_preview(&text),
                category: doc.category,
                reason: explanation.reason,
            });
        }

        // Vector order is raw cosine; the final key is the composite score
        results.sort_by(|a, b| {
            b.composite_score
                .total_cmp(&a.composite_score)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        Ok(results)
    }

    pub fn get_document(&self, doc_id: &str) -> Result<Option<DocumentView>> {
        DocumentView::load(&self.store, doc_id)
    }
}

fn load_text(doc: &Document) -> String {
    match read_body(Path::new(&doc.filepath)) {
        Ok(Some(text)) => text,
        Ok(None) => String::new(),
        Err(e) => {
            warn!(doc_id = %doc.doc_id, error = %e, "could not read document; using empty text");
            String::new()
        }
    }
}

/// 1 / (1 + ln(1 + max(tokens, 1))), in (0, 1] and decreasing in length
pub fn length_score(length_tokens: usize) -> f32 {
    let tokens = length_tokens.max(1) as f64;
    (1.0 / (1.0 + (1.0 + tokens).ln())) as f32
}

fn explain(
    query_tokens: &BTreeSet<String>,
    doc_text: &str,
    length_tokens: usize,
    cosine_sim: f32,
) -> Explanation {
    let doc_tokens = token_set(doc_text);
    let overlap_keywords: Vec<String> = query_tokens.intersection(&doc_tokens).cloned().collect();

    let overlap_ratio = if query_tokens.is_empty() {
        0.0
    } else {
        overlap_keywords.len() as f32 / query_tokens.len() as f32
    };
    let len_score = length_score(length_tokens);
    let composite_score =
        COSINE_WEIGHT * cosine_sim + OVERLAP_WEIGHT * overlap_ratio + LENGTH_WEIGHT * len_score;

    let reason = if overlap_keywords.is_empty() {
        "High semantic similarity even without exact keyword overlap.".to_string()
    } else {
        let cited: Vec<&str> = overlap_keywords
            .iter()
            .take(REASON_KEYWORDS)
            .map(String::as_str)
            .collect();
        format!(
            "Semantic match with overlapping keywords: {}.",
            cited.join(", ")
        )
    };

    Explanation {
        composite_score,
        overlap_ratio,
        len_score,
        overlap_keywords,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> BTreeSet<String> {
        token_set(text)
    }

    #[test]
    fn test_length_score_bounds() {
        assert!(length_score(0) > 0.0 && length_score(0) <= 1.0);
        assert_eq!(length_score(0), length_score(1));
        assert!(length_score(10) > length_score(100));
        assert!(length_score(1_000_000) > 0.0);
    }

    #[test]
    fn test_explain_overlap() {
        let e = explain(&tokens("dog finance"), "cat dog", 2, 0.5);
        assert_eq!(e.overlap_keywords, vec!["dog"]);
        assert!((e.overlap_ratio - 0.5).abs() < 1e-6);
        assert!(e.reason.contains("dog"));

        let expected = 0.7 * 0.5 + 0.2 * 0.5 + 0.1 * length_score(2);
        assert!((e.composite_score - expected).abs() < 1e-6);
    }

    #[test]
    fn test_explain_no_overlap() {
        let e = explain(&tokens("quantum"), "cat dog", 2, 0.9);
        assert!(e.overlap_keywords.is_empty());
        assert_eq!(e.overlap_ratio, 0.0);
        assert!(e.reason.contains("without exact keyword overlap"));
    }

    #[test]
    fn test_explain_query_without_tokens() {
        let e = explain(&tokens("!!! ???"), "cat dog", 2, 0.1);
        assert_eq!(e.overlap_ratio, 0.0);
    }

    #[test]
    fn test_reason_cites_first_five_sorted() {
        let e = explain(
            &tokens("g f e d c b a"),
            "a b c d e f g",
            7,
            0.0,
        );
        assert_eq!(e.overlap_keywords.len(), 7);
        assert_eq!(
            e.reason,
            "Semantic match with overlapping keywords: a, b, c, d, e."
        );
        assert!((e.overlap_ratio - 1.0).abs() < 1e-6);
    }
}
