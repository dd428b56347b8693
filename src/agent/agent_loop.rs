//! Core agent loop implementation.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};

use crate::llm::{ChatMessage, ChatRequest, LlmClient, ModelChunk};
use crate::profile::AgentProfile;
use crate::tools::ToolRegistry;

use super::events::AgentEvent;
use super::memory::ConversationMemory;
use super::state::{response_schema, AgentState};
use super::AgentError;

/// Events of one agent turn, ending after the structured response or an error.
pub type AgentEventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send>>;

/// The reactive tool-use agent.
pub struct ReactAgent {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    memory: ConversationMemory,
    system_instruction: String,
    response_format_instruction: String,
    max_iterations: usize,
}

impl ReactAgent {
    /// Create an agent. Fails when there are no tools to offer the model.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        profile: &AgentProfile,
        max_iterations: usize,
    ) -> Result<Self, AgentError> {
        if tools.is_empty() {
            return Err(AgentError::NoTools);
        }
        tracing::info!(
            agent = profile.name,
            tools = tools.len(),
            max_iterations,
            "Agent created"
        );
        Ok(Self {
            llm,
            tools,
            memory: ConversationMemory::new(),
            system_instruction: profile.system_instruction.to_string(),
            response_format_instruction: profile.response_format_instruction.to_string(),
            max_iterations,
        })
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one turn for `query` in the conversation `session_id`.
    ///
    /// The session is locked for the whole turn. If the turn fails, the
    /// conversation is restored to its pre-turn length.
    pub fn run(self: Arc<Self>, query: String, session_id: String) -> AgentEventStream {
        Box::pin(async_stream::stream! {
            let mut state = self.memory.checkout(&session_id).await;
            let checkpoint = state.messages.len();
            state.structured_response = None;
            state.messages.push(ChatMessage::user(query));

            let tool_schemas = self.tools.get_tool_schemas();

            for iteration in 0..self.max_iterations {
                tracing::debug!(session = %session_id, "Agent iteration {}", iteration + 1);

                let request = ChatRequest {
                    system: Some(self.system_instruction.clone()),
                    messages: state.messages.clone(),
                    tools: tool_schemas.clone(),
                };
                let mut chunks = match self.llm.stream_completion(&request).await {
                    Ok(chunks) => chunks,
                    Err(e) => {
                        rollback(&mut state, checkpoint);
                        yield Err(AgentError::Llm(e));
                        return;
                    }
                };

                let mut text = String::new();
                let mut tool_calls = Vec::new();
                let mut failure = None;
                while let Some(chunk) = chunks.next().await {
                    match chunk {
                        Ok(ModelChunk::Text(delta)) => {
                            if delta.is_empty() {
                                continue;
                            }
                            text.push_str(&delta);
                            yield Ok(AgentEvent::ModelStream { text: delta });
                        }
                        Ok(ModelChunk::ToolCall(call)) => tool_calls.push(call),
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
                if let Some(e) = failure {
                    rollback(&mut state, checkpoint);
                    yield Err(AgentError::Llm(e));
                    return;
                }

                let content = if text.is_empty() { None } else { Some(text) };
                state
                    .messages
                    .push(ChatMessage::assistant(content, tool_calls.clone()));
                yield Ok(AgentEvent::StateSnapshot(AgentState::clone(&state)));

                if !tool_calls.is_empty() {
                    for call in &tool_calls {
                        tracing::info!(session = %session_id, tool = %call.name, "Calling tool");
                        yield Ok(AgentEvent::ToolStart {
                            name: call.name.clone(),
                            args: call.args.clone(),
                        });

                        let output = match self.tools.execute(&call.name, call.args.clone()).await {
                            Ok(output) => output,
                            Err(e) => {
                                tracing::warn!(tool = %call.name, "Tool failed: {}", e);
                                format!("Error: {}", e)
                            }
                        };
                        state.messages.push(ChatMessage::tool_result(call, output.clone()));
                        yield Ok(AgentEvent::ToolEnd {
                            name: call.name.clone(),
                            output,
                        });
                    }
                    yield Ok(AgentEvent::StateSnapshot(AgentState::clone(&state)));
                    continue;
                }

                // No tool calls: ask for the structured status and finish.
                let request = ChatRequest {
                    system: Some(self.response_format_instruction.clone()),
                    messages: state.messages.clone(),
                    tools: Vec::new(),
                };
                match self.llm.structured_completion(&request, &response_schema()).await {
                    Ok(value) => {
                        state.structured_response = Some(value);
                        yield Ok(AgentEvent::StateSnapshot(AgentState::clone(&state)));
                    }
                    Err(e) => {
                        rollback(&mut state, checkpoint);
                        yield Err(AgentError::Llm(e));
                    }
                }
                return;
            }

            tracing::warn!(session = %session_id, "Max iterations ({}) reached", self.max_iterations);
            rollback(&mut state, checkpoint);
            yield Err(AgentError::MaxIterations(self.max_iterations));
        })
    }
}

fn rollback(state: &mut AgentState, checkpoint: usize) {
    state.messages.truncate(checkpoint);
    state.structured_response = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{scripted_agent, ScriptedLlm, StaticTool};
    use crate::llm::{LlmError, Role};
    use serde_json::json;

    async fn collect(stream: AgentEventStream) -> Vec<Result<AgentEvent, AgentError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn text_turn_streams_deltas_and_stores_structured_response() {
        let profile = AgentProfile::study_planner();
        let llm = ScriptedLlm::new()
            .text(&["Week 1: ", "grammar"])
            .structured("completed", "Plan ready");
        let (agent, llm) = scripted_agent(llm, &profile);

        let events = collect(agent.clone().run("Plan TOEIC".into(), "s1".into())).await;
        let deltas: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                Ok(AgentEvent::ModelStream { text }) => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(deltas, vec!["Week 1: ", "grammar"]);

        match events.last() {
            Some(Ok(AgentEvent::StateSnapshot(state))) => {
                assert_eq!(state.structured_response, Some(json!({"status": "completed", "message": "Plan ready"})));
                assert_eq!(state.last_model_text(), Some("Week 1: grammar"));
            }
            other => panic!("unexpected last event {:?}", other),
        }

        let requests = llm.requests.lock().expect("lock");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].system.as_deref(), Some(profile.system_instruction));
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(requests[1].system.as_deref(), Some(profile.response_format_instruction));
        assert!(requests[1].tools.is_empty());
    }

    #[tokio::test]
    async fn tool_calls_feed_results_back_to_the_model() {
        let profile = AgentProfile::study_planner();
        let llm = ScriptedLlm::new()
            .tool_call("search_listings", json!({"q": "toeic"}))
            .text(&["Found 3"])
            .structured("completed", "Found 3");
        let (agent, _llm) = scripted_agent(llm, &profile);

        let events = collect(agent.clone().run("Find".into(), "s1".into())).await;
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                Ok(AgentEvent::ToolStart { .. }) => "start",
                Ok(AgentEvent::ToolEnd { .. }) => "end",
                Ok(AgentEvent::ModelStream { .. }) => "text",
                Ok(AgentEvent::StateSnapshot(_)) => "state",
                Err(_) => "error",
            })
            .collect();
        assert_eq!(kinds, vec!["state", "start", "end", "state", "text", "state", "state"]);

        let state = agent.memory().snapshot("s1").await.expect("session");
        let roles: Vec<Role> = state.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(state.messages[2].content.as_deref(), Some("3 results"));
    }

    #[tokio::test]
    async fn tool_failure_is_reported_to_the_model() {
        let profile = AgentProfile::study_planner();
        let llm = Arc::new(
            ScriptedLlm::new()
                .tool_call("broken", json!({}))
                .text(&["Sorry"])
                .structured("error", "Tool unavailable"),
        );
        let tools = ToolRegistry::new(vec![Arc::new(StaticTool::failing("broken", "boom"))]);
        let agent = Arc::new(ReactAgent::new(llm, tools, &profile, 5).expect("agent"));

        let events = collect(agent.clone().run("Go".into(), "s1".into())).await;
        assert!(events.iter().all(|e| e.is_ok()));
        let output = events.iter().find_map(|e| match e {
            Ok(AgentEvent::ToolEnd { output, .. }) => Some(output.clone()),
            _ => None,
        });
        assert_eq!(output.as_deref(), Some("Error: boom"));
    }

    #[tokio::test]
    async fn failed_turn_rolls_back_the_conversation() {
        let profile = AgentProfile::study_planner();
        let llm = ScriptedLlm::new()
            .text(&["Hello"])
            .structured("input_required", "Which exam?")
            .chunks(vec![
                Ok(ModelChunk::Text("partial".into())),
                Err(LlmError::Http { status: 500, body: String::new() }),
            ]);
        let (agent, _llm) = scripted_agent(llm, &profile);

        collect(agent.clone().run("Hi".into(), "s1".into())).await;
        let events = collect(agent.clone().run("TOEIC".into(), "s1".into())).await;
        assert!(matches!(events.last(), Some(Err(AgentError::Llm(LlmError::Http { status: 500, .. })))));

        let state = agent.memory().snapshot("s1").await.expect("session");
        assert_eq!(state.messages.len(), 2);
        assert!(state.structured_response.is_none());
    }

    #[tokio::test]
    async fn max_iterations_is_an_error() {
        let profile = AgentProfile::study_planner();
        let llm = Arc::new(
            ScriptedLlm::new()
                .tool_call("search_listings", json!({}))
                .tool_call("search_listings", json!({})),
        );
        let tools = ToolRegistry::new(vec![Arc::new(StaticTool::new("search_listings", "ok"))]);
        let agent = Arc::new(ReactAgent::new(llm, tools, &profile, 2).expect("agent"));

        let events = collect(agent.clone().run("Loop".into(), "s1".into())).await;
        assert!(matches!(events.last(), Some(Err(AgentError::MaxIterations(2)))));
        assert!(agent.memory().snapshot("s1").await.expect("session").messages.is_empty());
    }

    #[test]
    fn agent_requires_tools() {
        let profile = AgentProfile::exercise_generator();
        let result = ReactAgent::new(Arc::new(ScriptedLlm::new()), ToolRegistry::default(), &profile, 25);
        assert!(matches!(result, Err(AgentError::NoTools)));
    }
}
