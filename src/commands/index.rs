//! Index command - scan the corpus and rebuild the vector index

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use super::Project;
use docfinder::search::{BuildOptions, DocumentStore, HarmonicEmbedder, IndexBuilder};
use docfinder::DataPaths;

pub struct IndexArgs {
    pub corpus: Option<PathBuf>,
    pub max_docs: Option<usize>,
    pub status: bool,
    pub rebuild: bool,
    pub prune: bool,
    pub json: bool,
}

/// Run index command
pub fn run(project: Project, args: IndexArgs) -> Result<()> {
    let paths = match args.corpus {
        Some(corpus) => project.paths.with_corpus(corpus),
        None => project.paths,
    };

    if args.status {
        return show_status(&paths, args.json);
    }

    if !paths.corpus.is_dir() {
        if args.json {
            println!(
                "{}",
                serde_json::json!({
                    "error": "Corpus directory not found",
                    "corpus": paths.corpus.display().to_string(),
                })
            );
        } else {
            eprintln!(
                "{} Corpus directory not found: {}",
                "Error:".red().bold(),
                paths.corpus.display()
            );
        }
        std::process::exit(1);
    }

    if args.rebuild {
        for path in [&paths.cache_db, &paths.index_file, &paths.index_meta] {
            remove_if_exists(path)?;
        }
        if !args.json {
            println!("{} Removed existing cache and index", "→".dimmed());
        }
    }

    let store = DocumentStore::open(&paths.cache_db)
        .with_context(|| format!("Failed to open store at {}", paths.cache_db.display()))?;
    let embedder = HarmonicEmbedder::new();
    let builder = IndexBuilder::new(&store, &embedder, &paths)
        .with_extensions(project.config.extensions.clone());

    if !args.json {
        println!(
            "{} Indexing {}...",
            "→".dimmed(),
            paths.corpus.display()
        );
    }

    let options = BuildOptions {
        max_docs: args.max_docs,
        prune: args.prune,
    };
    let report = builder
        .build_or_update(&paths.corpus, &options)
        .context("Index build failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {} documents scanned",
        "→".dimmed(),
        report.scanned.to_string().cyan()
    );
    println!(
        "  {} {} embedded, {} reused",
        "→".dimmed(),
        report.embedded.to_string().cyan(),
        report.reused
    );
    if report.pruned > 0 {
        println!("  {} {} pruned", "→".dimmed(), report.pruned);
    }

    match report.indexed {
        Some(vectors) => {
            println!(
                "{} Indexed {} vectors in {:.2}s",
                "✓".green().bold(),
                vectors.to_string().cyan(),
                report.duration_ms as f64 / 1000.0
            );
            println!(
                "  {} Index saved to: {}",
                "→".dimmed(),
                paths.index_file.display()
            );
        }
        None => {
            println!(
                "{} Nothing to index (no embeddings in cache)",
                "!".yellow().bold()
            );
        }
    }

    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Show index status
fn show_status(paths: &DataPaths, json: bool) -> Result<()> {
    if !paths.cache_db.exists() {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "exists": false,
                    "error": "Index not found"
                })
            );
        } else {
            println!(
                "{} Index not found. Run {} first.",
                "!".yellow().bold(),
                "docfinder index".cyan()
            );
        }
        return Ok(());
    }

    let store = DocumentStore::open(&paths.cache_db)?;
    let stats = store.get_stats()?;
    let index_bytes = std::fs::metadata(&paths.index_file)
        .map(|m| m.len())
        .unwrap_or(0);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "exists": true,
                "document_count": stats.document_count,
                "embedding_count": stats.embedding_count,
                "index_built": paths.index_exists(),
                "index_size_bytes": index_bytes,
            })
        );
    } else {
        println!("{}", "Index Status".bold());
        println!();
        println!(
            "  {} {} documents",
            "→".dimmed(),
            stats.document_count.to_string().cyan()
        );
        println!(
            "  {} {} embeddings",
            "→".dimmed(),
            stats.embedding_count.to_string().cyan()
        );
        if paths.index_exists() {
            println!(
                "  {} Index size: {:.2} KB",
                "→".dimmed(),
                index_bytes as f64 / 1024.0
            );
        } else {
            println!("  {} Vector index not built", "!".yellow());
        }
    }

    Ok(())
}
