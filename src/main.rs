mod commands;
#[cfg(feature = "mcp")]
mod mcp;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::index::IndexArgs;
use commands::Project;

#[derive(Parser)]
#[command(name = "docfinder")]
#[command(about = "Incremental document indexing with hybrid semantic search", long_about = None)]
#[command(version)]
struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the corpus, embed changed documents and rebuild the index
    Index {
        #[arg(long, help = "Corpus directory (default: data/docs)")]
        corpus: Option<PathBuf>,
        #[arg(long, help = "Process at most N documents")]
        max_docs: Option<usize>,
        #[arg(long, help = "Show index status only")]
        status: bool,
        #[arg(long, help = "Discard cached embeddings and rebuild")]
        rebuild: bool,
        #[arg(long, help = "Remove documents no longer in the corpus")]
        prune: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Hybrid semantic search
    #[command(alias = "s")]
    Search {
        query: String,
        #[arg(long, short, help = "Limit results")]
        limit: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show a document's metadata and text
    Show {
        doc_id: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// List indexed documents
    List {
        #[arg(long, help = "Filter by category")]
        category: Option<String>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== MCP Server =====
    /// Start MCP server over stdio
    #[cfg(feature = "mcp")]
    Mcp {
        #[arg(long, help = "Show client configuration instructions")]
        install: bool,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCFINDER_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    let project = Project::resolve(cli.root)?;

    match cli.command {
        Commands::Index {
            corpus,
            max_docs,
            status,
            rebuild,
            prune,
            json,
        } => commands::index::run(
            project,
            IndexArgs {
                corpus,
                max_docs,
                status,
                rebuild,
                prune,
                json,
            },
        ),
        Commands::Search { query, limit, json } => {
            commands::search::run(project, &query, limit, json)
        }
        Commands::Show { doc_id, json } => commands::show::run(project, &doc_id, json),
        Commands::List { category, json } => {
            commands::list::run(project, category.as_deref(), json)
        }

        #[cfg(feature = "mcp")]
        Commands::Mcp { install } => {
            if install {
                print_mcp_install_instructions(&project);
                Ok(())
            } else {
                let runtime = tokio::runtime::Runtime::new()?;
                runtime.block_on(mcp::run_mcp_server(project))
            }
        }
    }
}

#[cfg(feature = "mcp")]
fn print_mcp_install_instructions(project: &Project) {
    use colored::Colorize;

    let binary_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "docfinder".to_string());

    println!("{}", "MCP Server Installation Guide".bold().cyan());
    println!();
    println!("Add the following to your MCP client configuration:");
    println!();
    println!(
        r#"{{
  "mcpServers": {{
    "docfinder": {{
      "command": "{}",
      "args": ["--root", "{}", "mcp"]
    }}
  }}
}}"#,
        binary_path,
        project.paths.root.display()
    );
    println!();
    println!("{}", "Available tools:".bold());
    println!("  • {} - Hybrid semantic search", "search".green());
    println!("  • {} - Document metadata and text", "get_document".green());
    println!("  • {} - Document and embedding counts", "stats".green());
    println!("  • {} - Re-index the corpus and reload", "build_index".green());
}
