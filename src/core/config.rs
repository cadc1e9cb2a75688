//! Project configuration (`docfinder.toml`)

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

pub const CONFIG_FILE_NAME: &str = "docfinder.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Corpus root; relative paths resolve against the project root
    pub corpus_dir: Option<PathBuf>,
    /// Directory holding the cache database and index artifacts
    pub data_dir: Option<PathBuf>,
    /// File extensions eligible for indexing
    pub extensions: Vec<String>,
    pub default_top_k: usize,
    pub max_top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus_dir: None,
            data_dir: None,
            extensions: vec!["txt".to_string()],
            default_top_k: 5,
            max_top_k: 100,
        }
    }
}

impl Config {
    /// Load `docfinder.toml` from the project root, or defaults if absent
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Clamp a requested result count into `[1, max_top_k]`
    pub fn clamp_top_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_top_k)
            .clamp(1, self.max_top_k.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.extensions, vec!["txt"]);
    }

    #[test]
    fn test_partial_file() {
        let config = Config::parse(
            r#"
            corpus_dir = "corpus"
            extensions = ["txt", "md"]
            max_top_k = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.corpus_dir, Some(PathBuf::from("corpus")));
        assert_eq!(config.extensions, vec!["txt", "md"]);
        assert_eq!(config.default_top_k, 5);
        assert_eq!(config.max_top_k, 20);
    }

    #[test]
    fn test_invalid_file() {
        assert!(Config::parse("default_top_k = \"five\"").is_err());
    }

    #[test]
    fn test_clamp_top_k() {
        let config = Config::default();
        assert_eq!(config.clamp_top_k(None), 5);
        assert_eq!(config.clamp_top_k(Some(0)), 1);
        assert_eq!(config.clamp_top_k(Some(1000)), 100);
    }
}
