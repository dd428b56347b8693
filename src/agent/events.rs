use serde_json::Value;

use super::state::AgentState;

/// Execution events emitted by the reactive agent loop.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A tool is about to run.
    ToolStart { name: String, args: Value },
    /// A tool finished; `output` is what the model will see.
    ToolEnd { name: String, output: String },
    /// Text delta streamed from the model.
    ModelStream { text: String },
    /// Conversation state after a step.
    StateSnapshot(AgentState),
}
