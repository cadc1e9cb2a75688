//! List command - indexed documents

use std::collections::BTreeMap;

use anyhow::Result;
use colored::Colorize;

use super::Project;
use docfinder::search::DocumentStore;

pub fn run(project: Project, category: Option<&str>, json: bool) -> Result<()> {
    let store = DocumentStore::open(&project.paths.cache_db)?;
    let docs: Vec<_> = store
        .iter_documents()?
        .into_iter()
        .filter(|d| category.map_or(true, |c| d.category == c))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
        return Ok(());
    }

    if docs.is_empty() {
        println!("{} No documents indexed", "→".dimmed());
        return Ok(());
    }

    let mut by_category: BTreeMap<&str, usize> = BTreeMap::new();
    for doc in &docs {
        *by_category.entry(doc.category.as_str()).or_insert(0) += 1;
        println!(
            "{} [{}] {} tokens",
            doc.doc_id.cyan(),
            doc.category,
            doc.length_tokens
        );
    }

    println!();
    println!("{}", "Categories".bold());
    println!("{}", "-".repeat(30));
    for (name, count) in &by_category {
        println!("   {:<16} {:>5}", name, count);
    }
    println!("   {:<16} {:>5}", "Total", docs.len());

    Ok(())
}
