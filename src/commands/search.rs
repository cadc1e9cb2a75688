//! Search command - hybrid semantic search over the indexed corpus

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use super::Project;
use docfinder::search::{HarmonicEmbedder, SearchEngine};

/// Run search command
pub fn run(project: Project, query: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let top_k = project.config.clamp_top_k(limit);
    let engine = SearchEngine::open(&project.paths, Arc::new(HarmonicEmbedder::new()))
        .context("Failed to open search engine")?;
    let results = engine.search(query, top_k)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{} No results found for: {}", "→".dimmed(), query.cyan());
        if engine.index_size() == 0 {
            println!(
                "  {} Index is empty. Run {} first.",
                "!".yellow(),
                "docfinder index".cyan()
            );
        }
        return Ok(());
    }

    println!(
        "{} {} results for: {}",
        "→".dimmed(),
        results.len(),
        query.cyan()
    );
    println!();

    for (i, result) in results.iter().enumerate() {
        let score_str = format!("{:.3}", result.composite_score);
        let score_colored = if result.composite_score > 0.6 {
            score_str.green()
        } else if result.composite_score > 0.4 {
            score_str.yellow()
        } else {
            score_str.dimmed()
        };

        println!(
            "{}. [{}] {} ({})",
            (i + 1).to_string().bold(),
            score_colored,
            result.doc_id.cyan(),
            result.category
        );
        println!(
            "   cos {:.3} | overlap {:.2} | len {:.3}",
            result.cosine_sim, result.overlap_ratio, result.len_score
        );
        println!("   {}", result.reason);

        // Char-aware truncation of the stored preview for terminal display
        let display = if result.preview.chars().count() > 160 {
            format!("{}...", result.preview.chars().take(160).collect::<String>())
        } else {
            result.preview.clone()
        };
        if !display.is_empty() {
            println!("   {}", display.dimmed());
        }
        println!();
    }

    Ok(())
}
