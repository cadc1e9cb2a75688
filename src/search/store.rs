//! Document store using SQLite
//!
//! Persists document metadata and cached embeddings. Each operation opens
//! its own connection and commits before returning, so the store is cheap
//! to share between readers. Writers must be serialized by the caller.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{FinderError, Result};

/// Metadata for one corpus document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub doc_id: String,
    pub filepath: String,
    pub category: String,
    pub length_tokens: usize,
    pub content_hash: String,
}

/// Cached embedding for one document
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub doc_id: String,
    pub vector: Vec<f32>,
    pub updated_at: String,
}

/// Row counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub document_count: usize,
    pub embedding_count: usize,
}

#[derive(Debug, Clone)]
pub struct DocumentStore {
    db_path: PathBuf,
}

impl DocumentStore {
    /// Open or create the store at path
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        // Needed per connection for ON DELETE CASCADE
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        self.connect()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                doc_id TEXT PRIMARY KEY,
                filepath TEXT NOT NULL,
                category TEXT NOT NULL,
                length_tokens INTEGER NOT NULL,
                content_hash TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS embeddings (
                doc_id TEXT PRIMARY KEY,
                vector BLOB NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (doc_id) REFERENCES documents(doc_id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_documents_category ON documents(category);
            "#,
        )?;
        Ok(())
    }

    /// Insert or replace document metadata by `doc_id`
    pub fn upsert_document(&self, doc: &Document) -> Result<()> {
        self.connect()?.execute(
            r#"
            INSERT INTO documents (doc_id, filepath, category, length_tokens, content_hash)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(doc_id) DO UPDATE SET
                filepath = excluded.filepath,
                category = excluded.category,
                length_tokens = excluded.length_tokens,
                content_hash = excluded.content_hash
            "#,
            params![
                doc.doc_id,
                doc.filepath,
                doc.category,
                doc.length_tokens as i64,
                doc.content_hash,
            ],
        )?;
        Ok(())
    }

    pub fn get_document(&self, doc_id: &str) -> Result<Option<Document>> {
        let doc = self
            .connect()?
            .query_row(
                "SELECT doc_id, filepath, category, length_tokens, content_hash FROM documents WHERE doc_id = ?1",
                params![doc_id],
                document_from_row,
            )
            .optional()?;
        Ok(doc)
    }

    /// All documents ordered by `doc_id`
    pub fn iter_documents(&self) -> Result<Vec<Document>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT doc_id, filepath, category, length_tokens, content_hash FROM documents ORDER BY doc_id",
        )?;
        let docs = stmt
            .query_map([], document_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(docs)
    }

    /// Delete a document; its embedding goes with it
    pub fn delete_document(&self, doc_id: &str) -> Result<bool> {
        let removed = self
            .connect()?
            .execute("DELETE FROM documents WHERE doc_id = ?1", params![doc_id])?;
        Ok(removed > 0)
    }

    /// Insert or replace the embedding for an existing document
    pub fn upsert_embedding(&self, doc_id: &str, vector: &[f32]) -> Result<()> {
        let blob = embedding_to_blob(vector);
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        self.connect()?.execute(
            r#"
            INSERT INTO embeddings (doc_id, vector, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(doc_id) DO UPDATE SET
                vector = excluded.vector,
                updated_at = excluded.updated_at
            "#,
            params![doc_id, blob, now],
        )?;
        Ok(())
    }

    pub fn get_embedding(&self, doc_id: &str) -> Result<Option<Embedding>> {
        let row = self
            .connect()?
            .query_row(
                "SELECT doc_id, vector, updated_at FROM embeddings WHERE doc_id = ?1",
                params![doc_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(doc_id, blob, updated_at)| {
            Ok::<_, FinderError>(Embedding {
                vector: blob_to_embedding(&doc_id, &blob)?,
                doc_id,
                updated_at,
            })
        })
        .transpose()
    }

    /// Every cached embedding with its id, ordered by `doc_id`.
    ///
    /// Empty when nothing has been embedded yet.
    pub fn get_all_embeddings_and_ids(&self) -> Result<(Vec<String>, Vec<Vec<f32>>)> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT doc_id, vector FROM embeddings ORDER BY doc_id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut ids = Vec::new();
        let mut vectors = Vec::new();
        for row in rows {
            let (doc_id, blob) = row?;
            vectors.push(blob_to_embedding(&doc_id, &blob)?);
            ids.push(doc_id);
        }
        Ok((ids, vectors))
    }

    pub fn get_stats(&self) -> Result<StoreStats> {
        let conn = self.connect()?;
        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let embedding_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;

        Ok(StoreStats {
            document_count: document_count as usize,
            embedding_count: embedding_count as usize,
        })
    }
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let length_tokens: i64 = row.get(3)?;
    Ok(Document {
        doc_id: row.get(0)?,
        filepath: row.get(1)?,
        category: row.get(2)?,
        length_tokens: length_tokens.max(0) as usize,
        content_hash: row.get(4)?,
    })
}

/// Raw little-endian f32 array
fn embedding_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for &val in vector {
        blob.extend_from_slice(&val.to_le_bytes());
    }
    blob
}

fn blob_to_embedding(doc_id: &str, blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(FinderError::CorruptIndex(format!(
            "embedding blob for {} has {} bytes",
            doc_id,
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, hash: &str) -> Document {
        Document {
            doc_id: id.to_string(),
            filepath: format!("/corpus/{}", id),
            category: "pets".to_string(),
            length_tokens: 2,
            content_hash: hash.to_string(),
        }
    }

    fn open_temp() -> (tempfile::TempDir, DocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(&dir.path().join("data/cache.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_blob_conversion() {
        let vector = vec![1.0, 2.0, 3.0, -0.5];
        let blob = embedding_to_blob(&vector);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_embedding("x", &blob).unwrap(), vector);
        assert!(blob_to_embedding("x", &blob[..3]).is_err());
    }

    #[test]
    fn test_upsert_overwrites_by_key() -> Result<()> {
        let (_dir, store) = open_temp();
        store.upsert_document(&doc("pets/a.txt", "h1"))?;
        store.upsert_document(&doc("pets/a.txt", "h2"))?;

        let stored = store.get_document("pets/a.txt")?.unwrap();
        assert_eq!(stored.content_hash, "h2");
        assert_eq!(store.get_stats()?.document_count, 1);
        Ok(())
    }

    #[test]
    fn test_missing_lookups_are_none() -> Result<()> {
        let (_dir, store) = open_temp();
        assert!(store.get_document("nope")?.is_none());
        assert!(store.get_embedding("nope")?.is_none());
        Ok(())
    }

    #[test]
    fn test_empty_embeddings() -> Result<()> {
        let (_dir, store) = open_temp();
        let (ids, vectors) = store.get_all_embeddings_and_ids()?;
        assert!(ids.is_empty());
        assert!(vectors.is_empty());
        Ok(())
    }

    #[test]
    fn test_embeddings_round_trip_in_id_order() -> Result<()> {
        let (_dir, store) = open_temp();
        for id in ["b.txt", "a.txt"] {
            store.upsert_document(&doc(id, "h"))?;
        }
        store.upsert_embedding("b.txt", &[0.0, 1.0])?;
        store.upsert_embedding("a.txt", &[1.0, 0.0])?;

        let (ids, vectors) = store.get_all_embeddings_and_ids()?;
        assert_eq!(ids, vec!["a.txt", "b.txt"]);
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);

        let stats = store.get_stats()?;
        assert_eq!(stats.document_count, 2);
        assert_eq!(stats.embedding_count, 2);
        Ok(())
    }

    #[test]
    fn test_embedding_requires_document() {
        let (_dir, store) = open_temp();
        assert!(store.upsert_embedding("orphan.txt", &[1.0]).is_err());
    }

    #[test]
    fn test_delete_cascades_to_embedding() -> Result<()> {
        let (_dir, store) = open_temp();
        store.upsert_document(&doc("a.txt", "h"))?;
        store.upsert_embedding("a.txt", &[1.0, 0.0])?;

        assert!(store.delete_document("a.txt")?);
        assert!(!store.delete_document("a.txt")?);
        assert!(store.get_embedding("a.txt")?.is_none());
        assert_eq!(store.get_stats()?.embedding_count, 0);
        Ok(())
    }

    #[test]
    fn test_iter_documents_sorted() -> Result<()> {
        let (_dir, store) = open_temp();
        for id in ["finance/z.txt", "a.txt", "pets/m.txt"] {
            store.upsert_document(&doc(id, "h"))?;
        }
        let ids: Vec<String> = store
            .iter_documents()?
            .into_iter()
            .map(|d| d.doc_id)
            .collect();
        assert_eq!(ids, vec!["a.txt", "finance/z.txt", "pets/m.txt"]);
        Ok(())
    }
}
