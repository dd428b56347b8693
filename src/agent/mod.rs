//! Agent module - the reactive tool-use loop and its adapters.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Append the user query to the session's conversation
//! 2. Stream a model completion with the available tools
//! 3. If the model requests tool calls, execute them and feed the results back
//! 4. Otherwise ask the model for a structured status and finish
//!
//! [`StreamingAdapter`] turns the loop's events into [`AgentTurnResult`]s and
//! [`classify`] decides how a finished turn ends.

mod agent_loop;
mod classifier;
mod events;
mod memory;
mod state;
mod streaming;

#[cfg(test)]
pub(crate) mod testing;

pub use agent_loop::{AgentEventStream, ReactAgent};
pub use classifier::{classify, AgentTurnResult};
pub use events::AgentEvent;
pub use memory::ConversationMemory;
pub use state::{response_schema, AgentState, ResponseStatus, StructuredResponse};
pub use streaming::{adapt, StreamingAdapter, TurnStream};

use thiserror::Error;

use crate::llm::LlmError;

/// Failures that end an agent turn.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("No tools available; the agent cannot be created")]
    NoTools,

    #[error("Max iterations ({0}) reached without completion")]
    MaxIterations(usize),
}
