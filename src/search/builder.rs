//! Incremental index builder
//!
//! scan corpus → diff against the store → embed changed documents →
//! persist embeddings → rebuild the vector index from every cached
//! embedding.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::embedding::EmbeddingProvider;
use super::store::{Document, DocumentStore};
use super::vector_index::VectorIndex;
use crate::core::paths::DataPaths;
use crate::core::text::{clean_text, content_hash, count_tokens, read_body};
use crate::error::{FinderError, Result};

/// Category for files directly under the corpus root
pub const DEFAULT_CATEGORY: &str = "default";

/// A scanned document and its cleaned text
#[derive(Debug, Clone)]
pub struct ScannedDocument {
    pub document: Document,
    pub cleaned: String,
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Stop scanning after this many documents
    pub max_docs: Option<usize>,
    /// Remove stored documents not seen in a full scan
    pub prune: bool,
}

/// Outcome of one build run
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BuildReport {
    pub scanned: usize,
    pub embedded: usize,
    pub reused: usize,
    pub pruned: usize,
    /// Vectors in the rebuilt index; `None` when there was nothing to index
    pub indexed: Option<usize>,
    pub duration_ms: u128,
}

pub struct IndexBuilder<'a> {
    store: &'a DocumentStore,
    embedder: &'a dyn EmbeddingProvider,
    vectors_path: PathBuf,
    ids_path: PathBuf,
    extensions: Vec<String>,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(
        store: &'a DocumentStore,
        embedder: &'a dyn EmbeddingProvider,
        paths: &DataPaths,
    ) -> Self {
        Self {
            store,
            embedder,
            vectors_path: paths.index_file.clone(),
            ids_path: paths.index_meta.clone(),
            extensions: vec!["txt".to_string()],
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Bring the store and the persisted index up to date with `corpus_dir`
    pub fn build_or_update(&self, corpus_dir: &Path, options: &BuildOptions) -> Result<BuildReport> {
        let start = Instant::now();
        let scanned = scan_corpus(corpus_dir, &self.extensions, options.max_docs)?;
        info!(docs = scanned.len(), corpus = %corpus_dir.display(), "scanned corpus");

        let mut report = BuildReport {
            scanned: scanned.len(),
            ..BuildReport::default()
        };

        let mut to_embed: Vec<&ScannedDocument> = Vec::new();
        for item in &scanned {
            let stale = match self.store.get_document(&item.document.doc_id)? {
                Some(existing) => existing.content_hash != item.document.content_hash,
                None => true,
            };
            // Metadata is refreshed even when the content is unchanged
            self.store.upsert_document(&item.document)?;
            if stale {
                to_embed.push(item);
            } else {
                report.reused += 1;
            }
        }
        info!(
            embed = to_embed.len(),
            reused = report.reused,
            "documents needing new embeddings"
        );

        if !to_embed.is_empty() {
            let texts: Vec<&str> = to_embed.iter().map(|s| s.cleaned.as_str()).collect();
            let vectors = self.embedder.embed(&texts)?;
            if vectors.len() != texts.len() {
                return Err(FinderError::IdCountMismatch {
                    vectors: vectors.len(),
                    ids: texts.len(),
                });
            }
            for (item, vector) in to_embed.iter().zip(&vectors) {
                self.store.upsert_embedding(&item.document.doc_id, vector)?;
            }
            report.embedded = vectors.len();
        }

        if options.prune {
            report.pruned = self.prune(&scanned, options.max_docs)?;
        }

        let (ids, vectors) = self.store.get_all_embeddings_and_ids()?;
        if ids.is_empty() {
            warn!("no embeddings in cache; index not built");
            report.duration_ms = start.elapsed().as_millis();
            return Ok(report);
        }

        info!(vectors = ids.len(), "building index");
        let index = VectorIndex::build(&vectors, ids)?;
        index.persist(&self.vectors_path, &self.ids_path)?;
        report.indexed = Some(index.len());
        report.duration_ms = start.elapsed().as_millis();

        info!(
            vectors = index.len(),
            duration_ms = report.duration_ms as u64,
            "index built and saved"
        );
        Ok(report)
    }

    fn prune(&self, scanned: &[ScannedDocument], max_docs: Option<usize>) -> Result<usize> {
        if max_docs.is_some() {
            warn!("prune skipped: scan was limited by max_docs");
            return Ok(0);
        }

        let seen: HashSet<&str> = scanned
            .iter()
            .map(|s| s.document.doc_id.as_str())
            .collect();
        let mut pruned = 0;
        for doc in self.store.iter_documents()? {
            if !seen.contains(doc.doc_id.as_str()) && self.store.delete_document(&doc.doc_id)? {
                debug!(doc_id = %doc.doc_id, "pruned document");
                pruned += 1;
            }
        }
        Ok(pruned)
    }
}

/// Walk `corpus_dir` for eligible files, in path order, up to `max_docs`
pub fn scan_corpus(
    corpus_dir: &Path,
    extensions: &[String],
    max_docs: Option<usize>,
) -> Result<Vec<ScannedDocument>> {
    let limit = max_docs.unwrap_or(usize::MAX);
    let mut docs = Vec::new();

    for entry in WalkDir::new(corpus_dir).sort_by_file_name() {
        if docs.len() >= limit {
            break;
        }
        let entry = entry?;
        if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
            continue;
        }
        if let Some(doc) = scan_file(corpus_dir, entry.path())? {
            docs.push(doc);
        }
    }

    Ok(docs)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed == ext))
}

fn scan_file(corpus_dir: &Path, path: &Path) -> Result<Option<ScannedDocument>> {
    let Some(raw) = read_body(path)? else {
        warn!(path = %path.display(), "file disappeared during scan; skipping");
        return Ok(None);
    };

    let relative = path.strip_prefix(corpus_dir).unwrap_or(path);
    let (doc_id, category) = identify(relative);
    let cleaned = clean_text(&raw);
    let filepath = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string();

    Ok(Some(ScannedDocument {
        document: Document {
            doc_id,
            filepath,
            category,
            length_tokens: count_tokens(&cleaned),
            content_hash: content_hash(&cleaned),
        },
        cleaned,
    }))
}

/// `doc_id` is the `/`-joined relative path; category is its top-level directory
fn identify(relative: &Path) -> (String, String) {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    let category = if parts.len() > 1 {
        parts[0].clone()
    } else {
        DEFAULT_CATEGORY.to_string()
    };
    (parts.join("/"), category)
}
