//! Task executor: maps streamed agent turn results onto task lifecycle events.

use futures::StreamExt;
use thiserror::Error;
use uuid::Uuid;

use super::event_queue::{EventQueue, QueueClosed};
use super::types::{
    Artifact, Message, Part, Task, TaskArtifactUpdateEvent, TaskEvent, TaskState, TaskStatus,
    TaskStatusUpdateEvent,
};
use crate::agent::{AgentTurnResult, StreamingAdapter};
use crate::profile::ArtifactMode;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("No message provided")]
    MissingMessage,

    #[error("cancel not supported")]
    CancelNotSupported,

    #[error(transparent)]
    QueueClosed(#[from] QueueClosed),
}

/// Everything the executor knows about the request it is serving.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub task_id: String,
    pub context_id: String,
    pub message: Option<Message>,
    /// Existing task when the request continues one
    pub current_task: Option<Task>,
}

impl RequestContext {
    /// Text of the user message, or an empty string.
    pub fn user_input(&self) -> String {
        self.message.as_ref().map(Message::text).unwrap_or_default()
    }
}

/// Publishes lifecycle events for one task.
struct TaskUpdater<'a> {
    queue: &'a EventQueue,
    task_id: &'a str,
    context_id: &'a str,
}

impl TaskUpdater<'_> {
    fn status(&self, state: TaskState, message: Option<String>, is_final: bool) -> Result<(), QueueClosed> {
        let message = message.map(|text| Message::agent_text(text, self.context_id, self.task_id));
        self.queue.enqueue(TaskEvent::StatusUpdate(TaskStatusUpdateEvent {
            task_id: self.task_id.to_string(),
            context_id: self.context_id.to_string(),
            status: TaskStatus::new(state, message),
            is_final,
        }))
    }

    fn artifact(&self, name: &str, description: &str, text: String) -> Result<(), QueueClosed> {
        self.queue.enqueue(TaskEvent::ArtifactUpdate(TaskArtifactUpdateEvent {
            task_id: self.task_id.to_string(),
            context_id: self.context_id.to_string(),
            artifact: Artifact {
                artifact_id: Uuid::new_v4().to_string(),
                name: Some(name.to_string()),
                description: Some(description.to_string()),
                parts: vec![Part::text(text)],
            },
            append: Some(false),
            last_chunk: Some(true),
        }))
    }
}

/// Drives one agent turn per request and reports it as task events.
#[derive(Clone)]
pub struct TaskExecutor {
    adapter: StreamingAdapter,
}

impl TaskExecutor {
    pub fn new(adapter: StreamingAdapter) -> Self {
        Self { adapter }
    }

    /// Run the turn for `ctx`, publishing events to `queue`.
    ///
    /// Fails with [`ExecutorError::MissingMessage`] before publishing anything
    /// when the request has no message.
    pub async fn execute(&self, ctx: RequestContext, queue: &EventQueue) -> Result<(), ExecutorError> {
        let message = ctx.message.as_ref().ok_or(ExecutorError::MissingMessage)?;
        let query = ctx.user_input();

        if ctx.current_task.is_none() {
            queue.enqueue(TaskEvent::Task(Task::submitted(
                &ctx.task_id,
                &ctx.context_id,
                message.clone(),
            )))?;
        }

        let profile = self.adapter.profile();
        let updater = TaskUpdater {
            queue,
            task_id: &ctx.task_id,
            context_id: &ctx.context_id,
        };

        tracing::info!(task_id = %ctx.task_id, context_id = %ctx.context_id, "Executing task");

        let mut accumulated = String::new();
        let mut results = self.adapter.stream(&query, &ctx.context_id);
        while let Some(result) = results.next().await {
            let AgentTurnResult {
                is_task_complete,
                require_user_input,
                content,
            } = result;

            if is_task_complete {
                let text = match profile.artifact_mode {
                    ArtifactMode::FinalOnly => content,
                    ArtifactMode::Accumulate => {
                        accumulated.push_str(&content);
                        accumulated.clone()
                    }
                };
                updater.artifact(profile.artifact_name, profile.artifact_description, text)?;
                updater.status(TaskState::Completed, None, true)?;
                tracing::info!(task_id = %ctx.task_id, "Task completed");
            } else if require_user_input {
                updater.status(TaskState::InputRequired, Some(content), true)?;
                tracing::info!(task_id = %ctx.task_id, "Task requires input");
            } else {
                if profile.artifact_mode == ArtifactMode::Accumulate {
                    accumulated.push_str(&content);
                }
                updater.status(TaskState::Working, Some(content), false)?;
            }
        }

        Ok(())
    }

    /// Cancellation is not supported; the task is left untouched.
    pub async fn cancel(&self, ctx: RequestContext, _queue: &EventQueue) -> Result<(), ExecutorError> {
        tracing::warn!(task_id = %ctx.task_id, "Cancel requested but not supported");
        Err(ExecutorError::CancelNotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{scripted_agent, ScriptedLlm};
    use crate::llm::LlmError;
    use crate::profile::AgentProfile;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn executor(llm: ScriptedLlm, profile: AgentProfile) -> TaskExecutor {
        let (agent, _llm) = scripted_agent(llm, &profile);
        TaskExecutor::new(StreamingAdapter::new(agent, Arc::new(profile)))
    }

    fn context(text: Option<&str>) -> RequestContext {
        RequestContext {
            task_id: "t1".into(),
            context_id: "s1".into(),
            message: text.map(Message::user_text),
            current_task: None,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<TaskEvent>) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn status_of(event: &TaskEvent) -> Option<(TaskState, bool, String)> {
        match event {
            TaskEvent::StatusUpdate(u) => Some((
                u.status.state,
                u.is_final,
                u.status.message.as_ref().map(Message::text).unwrap_or_default(),
            )),
            _ => None,
        }
    }

    fn artifact_text(event: &TaskEvent) -> Option<String> {
        match event {
            TaskEvent::ArtifactUpdate(u) => Some(
                u.artifact
                    .parts
                    .iter()
                    .map(|p| match p {
                        Part::Text { text } => text.clone(),
                        _ => String::new(),
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    #[tokio::test]
    async fn study_plan_turn_emits_working_then_artifact_then_completed() {
        let llm = ScriptedLlm::new()
            .text(&["Week 1: ...", "Week 2: ..."])
            .structured("completed", "4-week TOEIC plan");
        let executor = executor(llm, AgentProfile::study_planner());
        let (queue, mut rx) = EventQueue::new();

        executor
            .execute(context(Some("Plan my TOEIC study for 4 weeks")), &queue)
            .await
            .expect("execute");
        let events = drain(&mut rx);

        assert_eq!(events.len(), 5);
        match &events[0] {
            TaskEvent::Task(task) => {
                assert_eq!(task.id, "t1");
                assert_eq!(task.context_id, "s1");
                assert_eq!(task.status.state, TaskState::Submitted);
            }
            other => panic!("expected task, got {:?}", other),
        }
        assert_eq!(
            status_of(&events[1]),
            Some((TaskState::Working, false, "Week 1: ...".to_string()))
        );
        assert_eq!(
            status_of(&events[2]),
            Some((TaskState::Working, false, "Week 2: ...".to_string()))
        );
        assert_eq!(artifact_text(&events[3]).as_deref(), Some("4-week TOEIC plan"));
        match &events[3] {
            TaskEvent::ArtifactUpdate(u) => {
                assert_eq!(u.artifact.name.as_deref(), Some("study_plan"));
                assert_eq!(u.append, Some(false));
                assert_eq!(u.last_chunk, Some(true));
            }
            other => panic!("expected artifact, got {:?}", other),
        }
        assert_eq!(status_of(&events[4]), Some((TaskState::Completed, true, String::new())));
    }

    #[tokio::test]
    async fn exercise_turn_accumulates_streamed_content_into_the_artifact() {
        let llm = ScriptedLlm::new()
            .text(&["def a(): ", "pass\n"])
            .structured("completed", "# done");
        let executor = executor(llm, AgentProfile::exercise_generator());
        let (queue, mut rx) = EventQueue::new();

        executor
            .execute(context(Some("Viết bài tập đệ quy")), &queue)
            .await
            .expect("execute");
        let events = drain(&mut rx);

        let artifact = events.iter().find_map(artifact_text).expect("artifact");
        assert_eq!(artifact, "def a(): pass\n# done");
        match events.iter().find(|e| matches!(e, TaskEvent::ArtifactUpdate(_))) {
            Some(TaskEvent::ArtifactUpdate(u)) => {
                assert_eq!(u.artifact.name.as_deref(), Some("generate_assignment"));
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn input_required_ends_the_turn_without_artifact() {
        let llm = ScriptedLlm::new()
            .text(&["Which exam?"])
            .structured("input_required", "Which exam are you preparing for?");
        let executor = executor(llm, AgentProfile::study_planner());
        let (queue, mut rx) = EventQueue::new();

        executor.execute(context(Some("Plan my study")), &queue).await.expect("execute");
        let events = drain(&mut rx);

        assert!(events.iter().all(|e| !matches!(e, TaskEvent::ArtifactUpdate(_))));
        assert_eq!(
            events.last().and_then(status_of),
            Some((TaskState::InputRequired, true, "Which exam are you preparing for?".to_string()))
        );
    }

    #[tokio::test]
    async fn continuing_task_does_not_publish_a_new_task() {
        let llm = ScriptedLlm::new().text(&["ok"]).structured("completed", "ok");
        let executor = executor(llm, AgentProfile::study_planner());
        let (queue, mut rx) = EventQueue::new();

        let mut ctx = context(Some("TOEIC"));
        ctx.current_task = Some(Task::submitted("t1", "s1", Message::user_text("Plan")));
        executor.execute(ctx, &queue).await.expect("execute");

        let events = drain(&mut rx);
        assert!(events.iter().all(|e| !matches!(e, TaskEvent::Task(_))));
    }

    #[tokio::test]
    async fn upstream_failure_completes_with_the_error_text() {
        let llm = ScriptedLlm::new().stream_error(LlmError::Http {
            status: 429,
            body: String::new(),
        });
        let executor = executor(llm, AgentProfile::study_planner());
        let (queue, mut rx) = EventQueue::new();

        executor.execute(context(Some("Plan")), &queue).await.expect("execute");
        let events = drain(&mut rx);
        assert_eq!(
            events.iter().find_map(artifact_text).as_deref(),
            Some("Error during streaming: HTTP error: 429")
        );
        assert_eq!(events.last().and_then(status_of).map(|s| s.0), Some(TaskState::Completed));
    }

    #[tokio::test]
    async fn missing_message_aborts_before_any_event() {
        let llm = ScriptedLlm::new();
        let executor = executor(llm, AgentProfile::study_planner());
        let (queue, mut rx) = EventQueue::new();

        let err = executor.execute(context(None), &queue).await.unwrap_err();
        assert!(matches!(err, ExecutorError::MissingMessage));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn cancel_always_fails_without_events() {
        let executor = executor(ScriptedLlm::new(), AgentProfile::study_planner());
        let (queue, mut rx) = EventQueue::new();

        let err = executor.cancel(context(Some("x")), &queue).await.unwrap_err();
        assert!(matches!(err, ExecutorError::CancelNotSupported));
        assert!(drain(&mut rx).is_empty());
    }
}
