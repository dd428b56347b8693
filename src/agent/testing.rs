//! Scripted collaborators shared by the agent, executor and server tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use super::ReactAgent;
use crate::llm::{ChatRequest, ChunkStream, LlmClient, LlmError, ModelChunk, ToolCall};
use crate::profile::AgentProfile;
use crate::tools::{Tool, ToolRegistry};

/// Model whose completions are replayed from a script.
#[derive(Default)]
pub struct ScriptedLlm {
    streams: Mutex<VecDeque<Result<Vec<Result<ModelChunk, LlmError>>, LlmError>>>,
    structured: Mutex<VecDeque<Result<Value, LlmError>>>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a streamed completion made of text deltas.
    pub fn text(self, deltas: &[&str]) -> Self {
        let chunks = deltas
            .iter()
            .map(|d| Ok(ModelChunk::Text(d.to_string())))
            .collect();
        self.chunks(chunks)
    }

    /// Queue a streamed completion that requests one tool call.
    pub fn tool_call(self, name: &str, args: Value) -> Self {
        self.chunks(vec![Ok(ModelChunk::ToolCall(ToolCall {
            id: format!("call_{}", name),
            name: name.to_string(),
            args,
        }))])
    }

    pub fn chunks(self, chunks: Vec<Result<ModelChunk, LlmError>>) -> Self {
        self.streams.lock().expect("lock").push_back(Ok(chunks));
        self
    }

    /// Queue a completion that fails before streaming anything.
    pub fn stream_error(self, error: LlmError) -> Self {
        self.streams.lock().expect("lock").push_back(Err(error));
        self
    }

    /// Queue the structured response for the next finished turn.
    pub fn structured(self, status: &str, message: &str) -> Self {
        self.structured_value(json!({"status": status, "message": message}))
    }

    pub fn structured_value(self, value: Value) -> Self {
        self.structured.lock().expect("lock").push_back(Ok(value));
        self
    }

}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn stream_completion(&self, request: &ChatRequest) -> Result<ChunkStream, LlmError> {
        self.requests.lock().expect("lock").push(request.clone());
        let next = self
            .streams
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))?;
        Ok(Box::pin(futures::stream::iter(next)))
    }

    async fn structured_completion(
        &self,
        request: &ChatRequest,
        _schema: &Value,
    ) -> Result<Value, LlmError> {
        self.requests.lock().expect("lock").push(request.clone());
        self.structured
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}

/// Model that never answers. `started` is notified on every call.
#[derive(Default)]
pub struct PendingLlm {
    pub started: Arc<Notify>,
}

#[async_trait]
impl LlmClient for PendingLlm {
    async fn stream_completion(&self, _request: &ChatRequest) -> Result<ChunkStream, LlmError> {
        self.started.notify_one();
        futures::future::pending().await
    }

    async fn structured_completion(
        &self,
        _request: &ChatRequest,
        _schema: &Value,
    ) -> Result<Value, LlmError> {
        self.started.notify_one();
        futures::future::pending().await
    }
}

/// Tool that answers with a fixed string, or fails when built with [`StaticTool::failing`].
pub struct StaticTool {
    name: &'static str,
    output: Result<&'static str, &'static str>,
}

impl StaticTool {
    pub fn new(name: &'static str, output: &'static str) -> Self {
        Self {
            name,
            output: Ok(output),
        }
    }

    pub fn failing(name: &'static str, error: &'static str) -> Self {
        Self {
            name,
            output: Err(error),
        }
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Static test tool"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<String> {
        match self.output {
            Ok(out) => Ok(out.to_string()),
            Err(e) => Err(anyhow::anyhow!(e)),
        }
    }
}

/// Agent over a scripted model and a single `search_listings` tool.
pub fn scripted_agent(llm: ScriptedLlm, profile: &AgentProfile) -> (Arc<ReactAgent>, Arc<ScriptedLlm>) {
    let llm = Arc::new(llm);
    (agent_with(llm.clone(), profile), llm)
}

/// Agent over any model and a single `search_listings` tool.
pub fn agent_with(llm: Arc<dyn LlmClient>, profile: &AgentProfile) -> Arc<ReactAgent> {
    let tools = ToolRegistry::new(vec![Arc::new(StaticTool::new("search_listings", "3 results"))]);
    Arc::new(ReactAgent::new(llm, tools, profile, 25).expect("agent"))
}
