//! CLI subcommands

pub mod index;
pub mod list;
pub mod search;
pub mod show;

use std::path::PathBuf;

use anyhow::{Context, Result};

use docfinder::{Config, DataPaths};

/// Resolved project root, configuration and data layout
pub struct Project {
    pub config: Config,
    pub paths: DataPaths,
}

impl Project {
    pub fn resolve(root: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(root) => root,
            None => std::env::current_dir().context("Failed to get current directory")?,
        };
        let config = Config::load(&root)
            .with_context(|| format!("Failed to load config from {}", root.display()))?;
        let paths = DataPaths::with_config(root, &config);
        Ok(Self { config, paths })
    }
}
