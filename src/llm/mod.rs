//! LLM client abstraction.
//!
//! The agent loop talks to models through [`LlmClient`]; [`GeminiClient`] is
//! the production implementation for both the Gemini API and Vertex AI.

mod gemini;
mod schema;
mod types;
mod vertex;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use thiserror::Error;

pub use gemini::GeminiClient;
pub use schema::sanitize_schema;
pub use types::{ChatMessage, ChatRequest, ModelChunk, Role, ToolCall, ToolSchema};
pub use vertex::VertexToken;

/// Errors raised while talking to a model endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {status}")]
    Http { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Failed to decode model response: {0}")]
    Decode(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Model returned no candidates")]
    EmptyResponse,
}

/// Stream of incremental model output for one completion.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ModelChunk, LlmError>> + Send>>;

/// A chat model that can stream tool-aware completions and produce JSON.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Stream a completion for the request, offering the request's tools.
    async fn stream_completion(&self, request: &ChatRequest) -> Result<ChunkStream, LlmError>;

    /// Ask for a single JSON object matching `schema` (no tools offered).
    async fn structured_completion(
        &self,
        request: &ChatRequest,
        schema: &Value,
    ) -> Result<Value, LlmError>;
}
