//! Show command - document metadata and text

use anyhow::Result;
use colored::Colorize;

use super::Project;
use docfinder::search::{DocumentStore, DocumentView};

pub fn run(project: Project, doc_id: &str, json: bool) -> Result<()> {
    // Metadata lookup never touches the vector index
    let store = DocumentStore::open(&project.paths.cache_db)?;

    let Some(view) = DocumentView::load(&store, doc_id)? else {
        if json {
            println!(
                "{}",
                serde_json::json!({ "error": "Document not found", "doc_id": doc_id })
            );
        } else {
            eprintln!("{} Document not found: {}", "Error:".red().bold(), doc_id);
        }
        std::process::exit(1);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let doc = &view.document;
    println!("{}", doc.doc_id.bold());
    println!("  {} category: {}", "→".dimmed(), doc.category);
    println!("  {} path: {}", "→".dimmed(), doc.filepath);
    println!("  {} tokens: {}", "→".dimmed(), doc.length_tokens);
    println!("  {} sha256: {}", "→".dimmed(), doc.content_hash.dimmed());
    println!();
    if view.text.is_empty() {
        println!("{}", "(file is missing or empty)".yellow());
    } else {
        println!("{}", view.text);
    }

    Ok(())
}
