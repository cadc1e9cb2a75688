//! docfinder MCP Server implementation

use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::commands::Project;
use docfinder::search::{
    BuildOptions, EmbeddingProvider, HarmonicEmbedder, IndexBuilder, SearchEngine,
};
use docfinder::{Config, DataPaths};

/// Parameters for the search tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Natural language query (e.g., "interest rates and inflation")
    #[schemars(description = "Natural language search query")]
    pub query: String,
    /// Maximum number of results to return
    #[schemars(description = "Maximum number of results (default from config, usually 5)")]
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Parameters for the get_document tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetDocumentParams {
    /// Document id: path relative to the corpus root (e.g., "finance/0001.txt")
    #[schemars(description = "Document id (path relative to the corpus root)")]
    pub doc_id: String,
}

/// Parameters for the build_index tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct BuildIndexParams {
    #[schemars(description = "Process at most this many documents")]
    #[serde(default)]
    pub max_docs: Option<usize>,
    #[schemars(description = "Remove documents no longer present in the corpus")]
    #[serde(default)]
    pub prune: bool,
}

#[derive(Debug, Serialize)]
struct StatsJson {
    document_count: usize,
    embedding_count: usize,
    index_vectors: usize,
}

/// docfinder MCP Service
#[derive(Clone)]
pub struct FinderService {
    paths: DataPaths,
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    engine: Arc<RwLock<Arc<SearchEngine>>>,
    /// Index builds are single-writer
    build_lock: Arc<Mutex<()>>,
    tool_router: ToolRouter<Self>,
}

impl FinderService {
    pub fn new(project: Project) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HarmonicEmbedder::new());
        let engine = SearchEngine::open(&project.paths, Arc::clone(&embedder))?;
        info!(vectors = engine.index_size(), "search engine ready");

        Ok(Self {
            paths: project.paths,
            config: project.config,
            embedder,
            engine: Arc::new(RwLock::new(Arc::new(engine))),
            build_lock: Arc::new(Mutex::new(())),
            tool_router: Self::tool_router(),
        })
    }

    async fn engine(&self) -> Arc<SearchEngine> {
        Arc::clone(&*self.engine.read().await)
    }
}

fn internal(context: &str, e: impl std::fmt::Display) -> McpError {
    McpError::internal_error(format!("{}: {}", context, e), None)
}

fn json_content<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|e| internal("JSON serialization failed", e))?;
    Ok(CallToolResult::success(vec![Content::text(output)]))
}

#[tool_router]
impl FinderService {
    /// Hybrid semantic search over the corpus
    #[tool(description = "Search the document corpus. Results are ranked by a blend of embedding similarity, keyword overlap with the query, and a preference for shorter documents, and each result explains its score.")]
    async fn search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let top_k = self.config.clamp_top_k(params.0.top_k);
        let engine = self.engine().await;
        let results = engine
            .search(&params.0.query, top_k)
            .map_err(|e| internal("Search failed", e))?;
        json_content(&results)
    }

    /// Document metadata and full text
    #[tool(description = "Get a document's metadata (category, token count, content hash) and its full text.")]
    async fn get_document(
        &self,
        params: Parameters<GetDocumentParams>,
    ) -> Result<CallToolResult, McpError> {
        let engine = self.engine().await;
        match engine
            .get_document(&params.0.doc_id)
            .map_err(|e| internal("Lookup failed", e))?
        {
            Some(view) => json_content(&view),
            None => Ok(CallToolResult::success(vec![Content::text(format!(
                "Document not found: {}",
                params.0.doc_id
            ))])),
        }
    }

    /// Store and index counts
    #[tool(description = "Get document and embedding counts, and the size of the loaded vector index.")]
    async fn stats(&self) -> Result<CallToolResult, McpError> {
        let engine = self.engine().await;
        let stats = engine
            .store()
            .get_stats()
            .map_err(|e| internal("Stats failed", e))?;
        json_content(&StatsJson {
            document_count: stats.document_count,
            embedding_count: stats.embedding_count,
            index_vectors: engine.index_size(),
        })
    }

    /// Re-index the corpus, then reload the engine
    #[tool(description = "Scan the corpus, embed new or changed documents, rebuild the vector index, and reload it for subsequent searches.")]
    async fn build_index(
        &self,
        params: Parameters<BuildIndexParams>,
    ) -> Result<CallToolResult, McpError> {
        let _guard = self.build_lock.lock().await;

        let store = self.engine().await.store().clone();
        let builder = IndexBuilder::new(&store, self.embedder.as_ref(), &self.paths)
            .with_extensions(self.config.extensions.clone());
        let options = BuildOptions {
            max_docs: params.0.max_docs,
            prune: params.0.prune,
        };
        let report = builder
            .build_or_update(&self.paths.corpus, &options)
            .map_err(|e| internal("Index build failed", e))?;

        let reloaded = SearchEngine::open(&self.paths, Arc::clone(&self.embedder))
            .map_err(|e| internal("Index reload failed", e))?;
        *self.engine.write().await = Arc::new(reloaded);

        json_content(&report)
    }
}

#[tool_handler]
impl ServerHandler for FinderService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "docfinder MCP Server. Hybrid semantic search and document access over an indexed text corpus.".to_string()
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Run the MCP server
pub async fn run_mcp_server(project: Project) -> Result<()> {
    use tokio::io::{stdin, stdout};

    let service = FinderService::new(project)?;
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
