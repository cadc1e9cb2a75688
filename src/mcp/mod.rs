//! MCP server for docfinder
//!
//! Exposes search, document lookup, stats and index rebuilds over stdio.

mod server;

pub use server::run_mcp_server;
