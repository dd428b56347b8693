//! Gemini chat client (Gemini API and Vertex AI).

use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::schema::sanitize_schema;
use super::types::{ChatMessage, ChatRequest, ModelChunk, Role, ToolCall};
use super::vertex::VertexToken;
use super::{ChunkStream, LlmClient, LlmError};
use crate::config::{ModelBackend, ModelConfig};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

enum Auth {
    ApiKey(String),
    Bearer(VertexToken),
}

/// Gemini client selected by [`ModelConfig`].
pub struct GeminiClient {
    http: reqwest::Client,
    model_url: String,
    auth: Auth,
}

impl GeminiClient {
    pub fn new(config: &ModelConfig) -> Self {
        let (model_url, auth) = match &config.backend {
            ModelBackend::GeminiApi { api_key } => (
                format!("{}/models/{}", GEMINI_API_BASE, config.model),
                Auth::ApiKey(api_key.clone()),
            ),
            ModelBackend::VertexAi {
                project,
                location,
                access_token,
            } => (
                format!(
                    "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}",
                    location = location,
                    project = project,
                    model = config.model
                ),
                Auth::Bearer(VertexToken::new(access_token.clone())),
            ),
        };
        tracing::info!(model = %config.model, url = %model_url, "Gemini client initialized");

        Self {
            http: reqwest::Client::new(),
            model_url,
            auth,
        }
    }

    async fn post(&self, method: &str, body: &Value) -> Result<reqwest::RequestBuilder, LlmError> {
        let url = format!("{}:{}", self.model_url, method);
        let builder = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        Ok(match &self.auth {
            Auth::ApiKey(key) => builder.header("x-goog-api-key", key),
            Auth::Bearer(token) => builder.bearer_auth(token.get().await?),
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn stream_completion(&self, request: &ChatRequest) -> Result<ChunkStream, LlmError> {
        let body = build_request_body(request, None);
        let builder = self.post("streamGenerateContent?alt=sse", &body).await?;
        let mut source =
            EventSource::new(builder).map_err(|e| LlmError::Transport(e.to_string()))?;

        let stream = async_stream::stream! {
            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(message)) => {
                        match serde_json::from_str::<GenerateContentResponse>(&message.data) {
                            Ok(response) => {
                                for chunk in response_chunks(response) {
                                    yield Ok::<ModelChunk, LlmError>(chunk);
                                }
                            }
                            Err(e) => {
                                source.close();
                                yield Err(LlmError::Decode(e.to_string()));
                                break;
                            }
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => {
                        source.close();
                        break;
                    }
                    Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                        source.close();
                        let body = response.text().await.unwrap_or_default();
                        tracing::warn!(status = status.as_u16(), body = %body, "Gemini request rejected");
                        yield Err(LlmError::Http { status: status.as_u16(), body });
                        break;
                    }
                    Err(e) => {
                        source.close();
                        yield Err(LlmError::Transport(e.to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn structured_completion(
        &self,
        request: &ChatRequest,
        schema: &Value,
    ) -> Result<Value, LlmError> {
        let body = build_request_body(request, Some(schema));
        let response = self
            .post("generateContent", &body)
            .await?
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Gemini request rejected");
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        let text: String = response_chunks(response)
            .into_iter()
            .filter_map(|chunk| match chunk {
                ModelChunk::Text(t) => Some(t),
                ModelChunk::ToolCall(_) => None,
            })
            .collect();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        serde_json::from_str(&text).map_err(|e| LlmError::Decode(e.to_string()))
    }
}

// ── Wire format ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
    /// Reasoning summaries are not part of the answer.
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

fn response_chunks(response: GenerateContentResponse) -> Vec<ModelChunk> {
    let Some(content) = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
    else {
        return Vec::new();
    };

    content
        .parts
        .into_iter()
        .filter(|part| part.thought != Some(true))
        .filter_map(|part| {
            if let Some(call) = part.function_call {
                Some(ModelChunk::ToolCall(ToolCall {
                    id: call
                        .id
                        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple())),
                    name: call.name,
                    args: if call.args.is_null() {
                        Value::Object(Map::new())
                    } else {
                        call.args
                    },
                }))
            } else {
                part.text
                    .filter(|t| !t.is_empty())
                    .map(ModelChunk::Text)
            }
        })
        .collect()
}

/// Build a `generateContent` body. With `schema` the model is put in JSON
/// mode and no tools are offered.
fn build_request_body(request: &ChatRequest, schema: Option<&Value>) -> Value {
    let mut body = Map::new();
    body.insert("contents".to_string(), Value::Array(build_contents(&request.messages)));

    if let Some(system) = &request.system {
        body.insert(
            "systemInstruction".to_string(),
            json!({ "parts": [{ "text": system }] }),
        );
    }

    match schema {
        Some(schema) => {
            let mut generation = json!({ "responseMimeType": "application/json" });
            if let Some(schema) = sanitize_schema(schema) {
                generation["responseSchema"] = schema;
            }
            body.insert("generationConfig".to_string(), generation);
        }
        None if !request.tools.is_empty() => {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    let mut decl = json!({
                        "name": tool.name,
                        "description": tool.description,
                    });
                    if let Some(params) = sanitize_schema(&tool.parameters) {
                        decl["parameters"] = params;
                    }
                    decl
                })
                .collect();
            body.insert(
                "tools".to_string(),
                json!([{ "functionDeclarations": declarations }]),
            );
        }
        None => {}
    }

    Value::Object(body)
}

/// Convert the conversation into Gemini `contents`, merging consecutive
/// entries with the same wire role (parallel tool results share one turn).
fn build_contents(messages: &[ChatMessage]) -> Vec<Value> {
    let mut contents: Vec<(&'static str, Vec<Value>)> = Vec::new();

    for message in messages {
        let (role, parts) = match message.role {
            Role::User => (
                "user",
                vec![json!({ "text": message.content.clone().unwrap_or_default() })],
            ),
            Role::Assistant => {
                let mut parts = Vec::new();
                if let Some(text) = message.content.as_deref().filter(|t| !t.is_empty()) {
                    parts.push(json!({ "text": text }));
                }
                for call in &message.tool_calls {
                    parts.push(json!({
                        "functionCall": { "name": call.name, "args": call.args }
                    }));
                }
                if parts.is_empty() {
                    continue;
                }
                ("model", parts)
            }
            Role::Tool => (
                "user",
                vec![json!({
                    "functionResponse": {
                        "name": message.name.clone().unwrap_or_default(),
                        "response": { "content": message.content.clone().unwrap_or_default() }
                    }
                })],
            ),
        };

        match contents.last_mut() {
            Some((last_role, last_parts)) if *last_role == role => last_parts.extend(parts),
            _ => contents.push((role, parts)),
        }
    }

    contents
        .into_iter()
        .map(|(role, parts)| json!({ "role": role, "parts": parts }))
        .collect()
}
