use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::client::McpClient;
use super::protocol::McpToolDef;
use crate::tools::Tool;

/// A tool served by an MCP server, exposed under its raw name.
pub struct McpTool {
    def: McpToolDef,
    description: String,
    client: Arc<McpClient>,
}

impl McpTool {
    pub fn new(def: McpToolDef, client: Arc<McpClient>) -> Self {
        let description = def.description.clone().unwrap_or_default();
        Self {
            def,
            description,
            client,
        }
    }

    pub fn server(&self) -> &str {
        self.client.name()
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        if self.def.input_schema.is_object() {
            self.def.input_schema.clone()
        } else {
            json!({"type": "object", "properties": {}})
        }
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        tracing::debug!(server = %self.server(), tool = %self.def.name, "Calling MCP tool");
        let result = self.client.call_tool(&self.def.name, args).await?;
        let text = result.to_text();
        if result.is_error {
            anyhow::bail!("{}", text);
        }
        Ok(text)
    }
}
