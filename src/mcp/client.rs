//! MCP client for one stdio server.
//!
//! A background task reads responses and routes them to waiting requests by id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use super::protocol::{
    InitializeResult, McpMessage, McpNotification, McpRequest, McpToolDef, ToolCallResult,
    ToolsListResult, PROTOCOL_VERSION,
};
use super::transport::StdioTransport;
use super::McpError;
use crate::config::McpServerConfig;

type Pending = Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value, McpError>>>>>;

/// Connection to a single MCP server.
pub struct McpClient {
    name: String,
    transport: Arc<StdioTransport>,
    next_id: AtomicI64,
    pending: Pending,
    reader: JoinHandle<()>,
}

impl McpClient {
    /// Spawn the server and start the receive loop. Call [`initialize`](Self::initialize) next.
    pub fn connect(name: &str, config: &McpServerConfig) -> Result<Self, McpError> {
        let transport = Arc::new(StdioTransport::spawn(&config.command, &config.args, &config.env)?);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let reader = tokio::spawn(receive_loop(
            name.to_string(),
            Arc::clone(&transport),
            Arc::clone(&pending),
        ));

        Ok(Self {
            name: name.to_string(),
            transport,
            next_id: AtomicI64::new(1),
            pending,
            reader,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Perform the `initialize` handshake.
    pub async fn initialize(&self) -> Result<InitializeResult, McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });
        let result: InitializeResult = self.request("initialize", Some(params)).await?;
        tracing::info!(
            server = %self.name,
            protocol = %result.protocol_version,
            server_name = ?result.server_info.as_ref().map(|i| i.name.as_str()),
            "MCP server initialized"
        );
        self.notify("notifications/initialized", None).await?;
        Ok(result)
    }

    /// List every tool, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ToolsListResult = self.request("tools/list", params).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        tracing::info!(server = %self.name, count = tools.len(), "MCP tools listed");
        Ok(tools)
    }

    /// Invoke a tool.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        let arguments = if arguments.is_null() { json!({}) } else { arguments };
        self.request("tools/call", Some(json!({ "name": name, "arguments": arguments })))
            .await
    }

    /// Stop the receive loop and the server process.
    pub async fn shutdown(&self) {
        self.reader.abort();
        self.transport.shutdown().await;
        let mut pending = self.pending.lock().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(McpError::Closed("client shut down".to_string())));
        }
        tracing::info!(server = %self.name, "MCP server stopped");
    }

    async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<R, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&McpRequest::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        tracing::debug!(server = %self.name, id, method, "MCP request");
        if let Err(e) = self.transport.send(&json).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let value = rx
            .await
            .map_err(|_| McpError::Closed("response channel dropped".to_string()))??;
        Ok(serde_json::from_value(value)?)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let json = serde_json::to_string(&McpNotification {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
        })?;
        self.transport.send(&json).await
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn receive_loop(name: String, transport: Arc<StdioTransport>, pending: Pending) {
    loop {
        match transport.receive().await {
            Ok(line) => {
                if let Err(e) = dispatch(&line, &pending).await {
                    tracing::warn!(server = %name, "Unreadable MCP message: {}", e);
                }
            }
            Err(e) => {
                tracing::error!(server = %name, "MCP receive error: {}", e);
                let mut pending = pending.lock().await;
                for (_, tx) in pending.drain() {
                    let _ = tx.send(Err(McpError::Closed(e.to_string())));
                }
                break;
            }
        }
    }
}

async fn dispatch(line: &str, pending: &Pending) -> Result<(), McpError> {
    let message: McpMessage = serde_json::from_str(line)?;
    match message.id {
        Some(id) => {
            if let Some(tx) = pending.lock().await.remove(&id) {
                let outcome = match message.error {
                    Some(err) => Err(McpError::Rpc {
                        code: err.code,
                        message: err.message,
                    }),
                    None => Ok(message.result.unwrap_or(Value::Null)),
                };
                let _ = tx.send(outcome);
            }
        }
        None => {
            if let Some(method) = message.method {
                tracing::debug!("MCP notification: {}", method);
            }
        }
    }
    Ok(())
}
