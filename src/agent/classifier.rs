use serde::Serialize;

use super::state::{AgentState, ResponseStatus};
use crate::profile::AgentProfile;

/// One increment of a streamed turn, or its final outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentTurnResult {
    pub is_task_complete: bool,
    pub require_user_input: bool,
    pub content: String,
}

impl AgentTurnResult {
    /// Mid-stream progress.
    pub fn partial(content: impl Into<String>) -> Self {
        Self {
            is_task_complete: false,
            require_user_input: false,
            content: content.into(),
        }
    }

    pub fn complete(content: impl Into<String>) -> Self {
        Self {
            is_task_complete: true,
            require_user_input: false,
            content: content.into(),
        }
    }

    pub fn input_required(content: impl Into<String>) -> Self {
        Self {
            is_task_complete: false,
            require_user_input: true,
            content: content.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.is_task_complete || self.require_user_input
    }
}

/// Decide how a finished turn ends.
///
/// A well-formed structured response wins; an `error` status is reported as a
/// completed turn carrying the message. Without one, a plain-text final model
/// message completes the turn. Anything else asks the user to try again.
pub fn classify(state: &AgentState, profile: &AgentProfile) -> AgentTurnResult {
    if let Some(response) = state.structured() {
        return match response.status {
            ResponseStatus::InputRequired => AgentTurnResult::input_required(response.message),
            ResponseStatus::Completed | ResponseStatus::Error => {
                AgentTurnResult::complete(response.message)
            }
        };
    }

    if let Some(text) = state.last_model_text() {
        return AgentTurnResult::complete(text);
    }

    AgentTurnResult::input_required(profile.fallback_message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use serde_json::json;

    fn state_with(structured: Option<serde_json::Value>, messages: Vec<ChatMessage>) -> AgentState {
        AgentState {
            messages,
            structured_response: structured,
        }
    }

    #[test]
    fn structured_status_maps_to_turn_result() {
        let profile = AgentProfile::study_planner();
        let history = vec![ChatMessage::assistant(Some("raw text".into()), vec![])];

        let completed = state_with(Some(json!({"status": "completed", "message": "Done"})), history.clone());
        assert_eq!(classify(&completed, &profile), AgentTurnResult::complete("Done"));

        let input = state_with(Some(json!({"status": "input_required", "message": "Which exam?"})), history.clone());
        let result = classify(&input, &profile);
        assert!(result.require_user_input);
        assert!(!result.is_task_complete);
        assert_eq!(result.content, "Which exam?");

        let error = state_with(Some(json!({"status": "error", "message": "Cannot plan"})), history);
        assert_eq!(classify(&error, &profile), AgentTurnResult::complete("Cannot plan"));
    }

    #[test]
    fn malformed_structured_response_falls_back_to_last_message() {
        let profile = AgentProfile::study_planner();
        let state = state_with(
            Some(json!({"status": "finished"})),
            vec![ChatMessage::user("q"), ChatMessage::assistant(Some("X".into()), vec![])],
        );
        assert_eq!(classify(&state, &profile), AgentTurnResult::complete("X"));
    }

    #[test]
    fn nothing_usable_returns_profile_fallback() {
        for profile in [AgentProfile::study_planner(), AgentProfile::exercise_generator()] {
            let empty = AgentState::default();
            let result = classify(&empty, &profile);
            assert_eq!(result, AgentTurnResult::input_required(profile.fallback_message));

            let user_last = state_with(None, vec![ChatMessage::user("hello")]);
            assert!(classify(&user_last, &profile).require_user_input);
        }
    }

    #[test]
    fn terminal_results_set_exactly_one_flag() {
        assert!(!AgentTurnResult::partial("x").is_terminal());
        for result in [AgentTurnResult::complete("a"), AgentTurnResult::input_required("b")] {
            assert!(result.is_terminal());
            assert!(result.is_task_complete != result.require_user_input);
        }
    }
}
