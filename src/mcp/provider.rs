use std::collections::HashMap;
use std::sync::Arc;

use super::client::McpClient;
use super::tool::McpTool;
use super::McpError;
use crate::config::McpServerConfig;
use crate::tools::Tool;

/// Owns the running MCP servers and the tools they expose.
///
/// Start it before the agent is built and call [`shutdown`](Self::shutdown)
/// when the server stops; the subprocesses are also killed on drop.
pub struct ToolProvider {
    clients: Vec<Arc<McpClient>>,
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolProvider {
    /// Spawn every configured server and load its tools.
    ///
    /// If any server fails, the servers already started are stopped before
    /// the error is returned.
    pub async fn start(servers: &HashMap<String, McpServerConfig>) -> Result<Self, McpError> {
        let mut names: Vec<&String> = servers.keys().collect();
        names.sort();

        let mut provider = Self {
            clients: Vec::new(),
            tools: Vec::new(),
        };

        for name in names {
            let config = &servers[name];
            match Self::start_one(name, config).await {
                Ok((client, defs)) => {
                    for def in defs {
                        provider
                            .tools
                            .push(Arc::new(McpTool::new(def, Arc::clone(&client))));
                    }
                    provider.clients.push(client);
                }
                Err(e) => {
                    tracing::error!(server = %name, "Failed to start MCP server: {}", e);
                    provider.shutdown().await;
                    return Err(e.for_server(name));
                }
            }
        }

        if provider.tools.is_empty() {
            tracing::warn!("MCP servers started but no tools were loaded");
        } else {
            tracing::info!(
                servers = provider.clients.len(),
                tools = provider.tools.len(),
                "MCP tools loaded"
            );
        }
        Ok(provider)
    }

    async fn start_one(
        name: &str,
        config: &McpServerConfig,
    ) -> Result<(Arc<McpClient>, Vec<super::McpToolDef>), McpError> {
        let client = Arc::new(McpClient::connect(name, config)?);
        let loaded = async {
            client.initialize().await?;
            client.list_tools().await
        }
        .await;
        match loaded {
            Ok(defs) => Ok((client, defs)),
            Err(e) => {
                client.shutdown().await;
                Err(e)
            }
        }
    }

    /// Tools from every server, in server-name order.
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.clone()
    }

    pub fn server_count(&self) -> usize {
        self.clients.len()
    }

    /// Stop every server.
    pub async fn shutdown(&mut self) {
        self.tools.clear();
        for client in self.clients.drain(..) {
            client.shutdown().await;
        }
    }
}
