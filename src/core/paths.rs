use std::path::{Path, PathBuf};

use super::config::Config;

/// On-disk layout of a docfinder project
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub root: PathBuf,
    pub corpus: PathBuf,
    pub data: PathBuf,
    pub cache_db: PathBuf,
    pub index_file: PathBuf,
    pub index_meta: PathBuf,
}

impl DataPaths {
    pub fn from_root(root: PathBuf) -> Self {
        Self::with_config(root, &Config::default())
    }

    pub fn with_config(root: PathBuf, config: &Config) -> Self {
        let data = resolve(&root, config.data_dir.as_deref(), "data");
        let corpus = match config.corpus_dir.as_deref() {
            Some(dir) => resolve(&root, Some(dir), ""),
            None => data.join("docs"),
        };

        Self {
            cache_db: data.join("cache.db"),
            index_file: data.join("index.bin"),
            index_meta: data.join("index_meta.json"),
            corpus,
            data,
            root,
        }
    }

    pub fn with_corpus(mut self, corpus: PathBuf) -> Self {
        self.corpus = if corpus.is_absolute() {
            corpus
        } else {
            self.root.join(corpus)
        };
        self
    }

    pub fn index_exists(&self) -> bool {
        self.index_file.exists() && self.index_meta.exists()
    }
}

fn resolve(root: &Path, configured: Option<&Path>, fallback: &str) -> PathBuf {
    match configured {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => root.join(p),
        None => root.join(fallback),
    }
}
