//! MCP tool provider.
//!
//! Spawns the configured stdio MCP servers, collects their tools and keeps the
//! processes alive for as long as the provider lives.

mod client;
mod protocol;
mod provider;
mod tool;
mod transport;

pub use client::McpClient;
pub use protocol::{McpToolDef, ToolCallResult};
pub use provider::ToolProvider;
pub use tool::McpTool;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("failed to start MCP server: {0}")]
    Spawn(String),

    #[error("MCP connection closed: {0}")]
    Closed(String),

    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("MCP server '{server}': {source}")]
    Server {
        server: String,
        #[source]
        source: Box<McpError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl McpError {
    fn for_server(self, server: &str) -> Self {
        McpError::Server {
            server: server.to_string(),
            source: Box::new(self),
        }
    }
}
