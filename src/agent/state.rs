use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::llm::{ChatMessage, Role};

/// Conversation state for one session.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    pub messages: Vec<ChatMessage>,
    /// Raw structured response from the last finished turn, if the model gave one
    pub structured_response: Option<Value>,
}

impl AgentState {
    /// The structured response, if present and well-formed.
    pub fn structured(&self) -> Option<StructuredResponse> {
        let value = self.structured_response.as_ref()?;
        match serde_json::from_value(value.clone()) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::debug!("Ignoring malformed structured response: {}", e);
                None
            }
        }
    }

    /// Text of the last message when it was written by the model.
    pub fn last_model_text(&self) -> Option<&str> {
        let last = self.messages.last()?;
        if last.role != Role::Assistant {
            return None;
        }
        last.content.as_deref().filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    InputRequired,
    Completed,
    Error,
}

/// Status the model declares at the end of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredResponse {
    #[serde(default)]
    pub status: ResponseStatus,
    pub message: String,
}

/// JSON Schema requested from the model for [`StructuredResponse`].
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "status": {
                "type": "string",
                "enum": ["input_required", "completed", "error"],
                "default": "input_required"
            },
            "message": {"type": "string"}
        },
        "required": ["status", "message"]
    })
}
