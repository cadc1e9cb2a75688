//! Exact inner-product vector index
//!
//! Brute-force search over L2-normalized vectors, so scores are cosine
//! similarities. The index is persisted as two artifacts that only make
//! sense together:
//!
//! - the vector file: `DFVI` magic, format version, dimension and row count
//!   (u32 LE each), then `rows * dimension` f32 LE values in row-major order
//! - the id sidecar (JSON): `ids[row]` names the document of vector `row`,
//!   plus the dimension and a SHA-256 of the vector file
//!
//! Both are written to temporary files and renamed into place. `load`
//! checks counts and the checksum, so a torn pair is rejected instead of
//! being served with a shifted row-to-id mapping.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::embedding::dot;
use crate::error::{FinderError, Result};

const MAGIC: &[u8; 4] = b"DFVI";
const FORMAT_VERSION: u32 = 1;
const HEADER_SIZE: usize = 16;

#[derive(Debug, Serialize, Deserialize)]
struct IndexMeta {
    ids: Vec<String>,
    dimension: usize,
    vectors_sha256: String,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
    ids: Vec<String>,
}

impl VectorIndex {
    /// Build from row vectors and their ids; row `i` belongs to `ids[i]`
    pub fn build(vectors: &[Vec<f32>], ids: Vec<String>) -> Result<Self> {
        let Some(first) = vectors.first() else {
            return Err(FinderError::EmptyIndex);
        };
        if vectors.len() != ids.len() {
            return Err(FinderError::IdCountMismatch {
                vectors: vectors.len(),
                ids: ids.len(),
            });
        }

        let dimension = first.len();
        if dimension == 0 {
            return Err(FinderError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for v in vectors {
            if v.len() != dimension {
                return Err(FinderError::DimensionMismatch {
                    expected: dimension,
                    actual: v.len(),
                });
            }
            data.extend_from_slice(v);
        }

        Ok(Self {
            dimension,
            data,
            ids,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn id(&self, row: usize) -> Option<&str> {
        self.ids.get(row).map(String::as_str)
    }

    fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.dimension..(row + 1) * self.dimension]
    }

    /// Top `k` rows by descending inner product; `k` is clamped to `len()`
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(FinderError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .map(|row| (row, dot(query, self.row(row))))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Write both artifacts, replacing any previous pair
    pub fn persist(&self, vectors_path: &Path, ids_path: &Path) -> Result<()> {
        for path in [vectors_path, ids_path] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        let bytes = self.encode();
        let meta = IndexMeta {
            ids: self.ids.clone(),
            dimension: self.dimension,
            vectors_sha256: sha256_hex(&bytes),
        };
        let meta_bytes = serde_json::to_vec_pretty(&meta)?;

        let vectors_tmp = tmp_path(vectors_path);
        let ids_tmp = tmp_path(ids_path);
        fs::write(&vectors_tmp, &bytes)?;
        if let Err(e) = fs::write(&ids_tmp, &meta_bytes) {
            let _ = fs::remove_file(&vectors_tmp);
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&vectors_tmp, vectors_path) {
            let _ = fs::remove_file(&vectors_tmp);
            let _ = fs::remove_file(&ids_tmp);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&ids_tmp, ids_path) {
            let _ = fs::remove_file(&ids_tmp);
            return Err(e.into());
        }

        debug!(
            rows = self.len(),
            dimension = self.dimension,
            path = %vectors_path.display(),
            "persisted vector index"
        );
        Ok(())
    }

    /// Read both artifacts; `NotFound` if either is missing
    pub fn load(vectors_path: &Path, ids_path: &Path) -> Result<Self> {
        let bytes = read_artifact(vectors_path)?;
        let meta_bytes = read_artifact(ids_path)?;
        let meta: IndexMeta = serde_json::from_slice(&meta_bytes)?;

        if sha256_hex(&bytes) != meta.vectors_sha256 {
            return Err(FinderError::CorruptIndex(
                "vector file does not match id sidecar".to_string(),
            ));
        }

        let (dimension, rows, data) = decode(&bytes)?;
        if dimension != meta.dimension {
            return Err(FinderError::DimensionMismatch {
                expected: meta.dimension,
                actual: dimension,
            });
        }
        if rows != meta.ids.len() {
            return Err(FinderError::IdCountMismatch {
                vectors: rows,
                ids: meta.ids.len(),
            });
        }

        Ok(Self {
            dimension,
            data,
            ids: meta.ids,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.data.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        out.extend_from_slice(&(self.len() as u32).to_le_bytes());
        for &val in &self.data {
            out.extend_from_slice(&val.to_le_bytes());
        }
        out
    }
}

fn decode(bytes: &[u8]) -> Result<(usize, usize, Vec<f32>)> {
    if bytes.len() < HEADER_SIZE || &bytes[0..4] != MAGIC {
        return Err(FinderError::CorruptIndex("bad vector file header".to_string()));
    }

    let read_u32 = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    let version = read_u32(4);
    if version != FORMAT_VERSION {
        return Err(FinderError::CorruptIndex(format!(
            "unsupported format version {}",
            version
        )));
    }

    let dimension = read_u32(8) as usize;
    let rows = read_u32(12) as usize;
    let body = &bytes[HEADER_SIZE..];
    if body.len() != rows * dimension * 4 {
        return Err(FinderError::CorruptIndex(format!(
            "expected {} vector bytes, found {}",
            rows * dimension * 4,
            body.len()
        )));
    }

    let data = body
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok((dimension, rows, data))
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => FinderError::NotFound(format!(
            "index artifact {}; build the index first",
            path.display()
        )),
        _ => FinderError::Io(e),
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn unit(v: &[f32]) -> Vec<f32> {
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter().map(|x| x / norm).collect()
    }

    fn sample() -> (Vec<Vec<f32>>, Vec<String>) {
        (
            vec![
                unit(&[1.0, 0.0, 0.0]),
                unit(&[0.6, 0.8, 0.0]),
                unit(&[0.0, 0.0, 1.0]),
            ],
            ids(&["a", "b", "c"]),
        )
    }

    #[test]
    fn test_build_empty_fails() {
        assert!(matches!(
            VectorIndex::build(&[], Vec::new()),
            Err(FinderError::EmptyIndex)
        ));
    }

    #[test]
    fn test_build_rejects_mismatches() {
        let (vectors, _) = sample();
        assert!(matches!(
            VectorIndex::build(&vectors, ids(&["a"])),
            Err(FinderError::IdCountMismatch { vectors: 3, ids: 1 })
        ));
        assert!(matches!(
            VectorIndex::build(&[vec![1.0, 0.0], vec![1.0]], ids(&["a", "b"])),
            Err(FinderError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_search_orders_by_inner_product() -> Result<()> {
        let (vectors, names) = sample();
        let index = VectorIndex::build(&vectors, names)?;
        let hits = index.search(&unit(&[1.0, 0.1, 0.0]), 3)?;

        let rows: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(rows, vec![0, 1, 2]);
        assert!(hits.windows(2).all(|w| w[0].1 >= w[1].1));
        Ok(())
    }

    #[test]
    fn test_search_clamps_k() -> Result<()> {
        let (vectors, names) = sample();
        let index = VectorIndex::build(&vectors, names)?;
        assert_eq!(index.search(&vectors[0], 1000)?.len(), 3);
        assert!(index.search(&vectors[0], 0)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_search_rejects_wrong_dimension() -> Result<()> {
        let (vectors, names) = sample();
        let index = VectorIndex::build(&vectors, names)?;
        assert!(index.search(&[1.0, 0.0], 1).is_err());
        Ok(())
    }

    #[test]
    fn test_persist_load_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let vectors_path = dir.path().join("index.bin");
        let ids_path = dir.path().join("index_meta.json");

        let (vectors, names) = sample();
        VectorIndex::build(&vectors, names)?.persist(&vectors_path, &ids_path)?;
        assert!(!tmp_path(&vectors_path).exists());
        assert!(!tmp_path(&ids_path).exists());

        let loaded = VectorIndex::load(&vectors_path, &ids_path)?;
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.dimension(), 3);

        let hits = loaded.search(&vectors[1], 3)?;
        assert_eq!(loaded.id(hits[0].0), Some("b"));
        assert!((hits[0].1 - 1.0).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_failed_persist_leaves_no_tmp_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let vectors_path = dir.path().join("index.bin");
        let ids_path = dir.path().join("index_meta.json");
        // A non-empty directory in the sidecar's place makes its rename fail
        fs::create_dir(&ids_path)?;
        fs::write(ids_path.join("keep"), "x")?;

        let (vectors, names) = sample();
        let index = VectorIndex::build(&vectors, names)?;
        assert!(index.persist(&vectors_path, &ids_path).is_err());
        assert!(!tmp_path(&ids_path).exists());
        assert!(!tmp_path(&vectors_path).exists());
        Ok(())
    }

    #[test]
    fn test_load_missing_artifact() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let vectors_path = dir.path().join("index.bin");
        let ids_path = dir.path().join("index_meta.json");

        assert!(matches!(
            VectorIndex::load(&vectors_path, &ids_path),
            Err(FinderError::NotFound(_))
        ));

        let (vectors, names) = sample();
        VectorIndex::build(&vectors, names)?.persist(&vectors_path, &ids_path)?;
        fs::remove_file(&ids_path)?;
        assert!(matches!(
            VectorIndex::load(&vectors_path, &ids_path),
            Err(FinderError::NotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_load_rejects_torn_pair() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let vectors_path = dir.path().join("index.bin");
        let ids_path = dir.path().join("index_meta.json");
        let old_ids = dir.path().join("old_meta.json");

        let (vectors, names) = sample();
        VectorIndex::build(&vectors, names)?.persist(&vectors_path, &ids_path)?;
        fs::copy(&ids_path, &old_ids)?;

        // New vectors land, but the sidecar is still from the previous build
        VectorIndex::build(&vectors[..2], ids(&["a", "b"]))?.persist(&vectors_path, &ids_path)?;
        fs::copy(&old_ids, &ids_path)?;

        assert!(matches!(
            VectorIndex::load(&vectors_path, &ids_path),
            Err(FinderError::CorruptIndex(_))
        ));
        Ok(())
    }
}
