use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};

use super::agent_loop::ReactAgent;
use super::classifier::{classify, AgentTurnResult};
use super::events::AgentEvent;
use super::state::AgentState;
use super::AgentError;
use crate::profile::AgentProfile;

/// Turn results for one query; always ends with exactly one terminal result.
pub type TurnStream = Pin<Box<dyn Stream<Item = AgentTurnResult> + Send>>;

/// Runs agent turns and reports them as [`AgentTurnResult`]s.
#[derive(Clone)]
pub struct StreamingAdapter {
    agent: Arc<ReactAgent>,
    profile: Arc<AgentProfile>,
}

impl StreamingAdapter {
    pub fn new(agent: Arc<ReactAgent>, profile: Arc<AgentProfile>) -> Self {
        Self { agent, profile }
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// Stream one turn of `query` in conversation `session_id`.
    pub fn stream(&self, query: &str, session_id: &str) -> TurnStream {
        let upstream = Arc::clone(&self.agent).run(query.to_string(), session_id.to_string());
        adapt(upstream, Arc::clone(&self.profile))
    }
}

/// Map agent events to turn results and append the classified outcome.
///
/// Tool starts become a notice naming the tool and non-empty text deltas pass
/// through; other events are dropped. An upstream error ends the stream with
/// a completed result describing it.
pub fn adapt<S>(upstream: S, profile: Arc<AgentProfile>) -> TurnStream
where
    S: Stream<Item = Result<AgentEvent, AgentError>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut upstream = Box::pin(upstream);
        let mut last_state: Option<AgentState> = None;

        while let Some(event) = upstream.next().await {
            match event {
                Ok(AgentEvent::ToolStart { name, .. }) => {
                    yield AgentTurnResult::partial(profile.tool_notice_for(&name));
                }
                Ok(AgentEvent::ModelStream { text }) => {
                    if !text.is_empty() {
                        yield AgentTurnResult::partial(text);
                    }
                }
                Ok(AgentEvent::StateSnapshot(state)) => last_state = Some(state),
                Ok(AgentEvent::ToolEnd { .. }) => {}
                Err(e) => {
                    tracing::error!("Agent turn failed: {}", e);
                    yield AgentTurnResult::complete(profile.stream_error(&e));
                    return;
                }
            }
        }

        let state = last_state.unwrap_or_default();
        yield classify(&state, &profile);
    })
}
