//! JSON-RPC method handlers on top of the task executor and store.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::event_queue::EventQueue;
use super::executor::{ExecutorError, RequestContext, TaskExecutor};
use super::jsonrpc::RpcError;
use super::task_store::TaskStore;
use super::types::{MessageSendParams, Task, TaskEvent, TaskIdParams, TaskQueryParams};

/// Events of one streamed turn, in emission order.
pub type EventStream = Pin<Box<dyn Stream<Item = TaskEvent> + Send>>;

/// Serves the task methods.
#[derive(Clone)]
pub struct RequestHandler {
    executor: TaskExecutor,
    store: Arc<dyn TaskStore>,
}

impl RequestHandler {
    pub fn new(executor: TaskExecutor, store: Arc<dyn TaskStore>) -> Self {
        Self { executor, store }
    }

    /// `message/send`: run the turn to the end and return the task.
    pub async fn on_message_send(&self, params: MessageSendParams) -> Result<Task, RpcError> {
        let history_length = params
            .configuration
            .as_ref()
            .and_then(|c| c.history_length);
        let mut events = self.on_message_stream(params).await?;

        let mut task_id = None;
        while let Some(event) = events.next().await {
            if task_id.is_none() {
                task_id = event_task_id(&event);
            }
        }

        let task_id = task_id.ok_or_else(|| RpcError::Internal("turn produced no events".into()))?;
        let task = self
            .store
            .get(&task_id)
            .await
            .map_err(|e| RpcError::Internal(e.to_string()))?
            .ok_or(RpcError::TaskNotFound(task_id))?;
        Ok(trim_history(task, history_length))
    }

    /// `message/stream`: start the turn and stream its events.
    ///
    /// Events are applied to the store by a background task, so the turn
    /// completes and is recorded even if the caller goes away.
    pub async fn on_message_stream(&self, params: MessageSendParams) -> Result<EventStream, RpcError> {
        let ctx = self.prepare(params).await?;
        let task_id = ctx.task_id.clone();
        let (queue, mut rx) = EventQueue::new();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = store.apply(&event).await {
                    tracing::warn!("Failed to record task event: {}", e);
                }
                let _ = out_tx.send(event);
            }
        });

        let executor = self.executor.clone();
        tokio::spawn(async move {
            if let Err(e) = executor.execute(ctx, &queue).await {
                tracing::error!(task_id = %task_id, "Task execution failed: {}", e);
            }
        });

        Ok(Box::pin(async_stream::stream! {
            while let Some(event) = out_rx.recv().await {
                yield event;
            }
        }))
    }

    /// `tasks/get`
    pub async fn on_get_task(&self, params: TaskQueryParams) -> Result<Task, RpcError> {
        let task = self.load(&params.id).await?;
        Ok(trim_history(task, params.history_length))
    }

    /// `tasks/cancel`: always fails for known tasks, leaving them unchanged.
    pub async fn on_cancel_task(&self, params: TaskIdParams) -> Result<Task, RpcError> {
        let task = self.load(&params.id).await?;
        let ctx = RequestContext {
            task_id: task.id.clone(),
            context_id: task.context_id.clone(),
            message: None,
            current_task: Some(task),
        };
        let (queue, _rx) = EventQueue::new();
        match self.executor.cancel(ctx, &queue).await {
            Ok(()) => self.load(&params.id).await,
            Err(ExecutorError::CancelNotSupported) => Err(RpcError::TaskNotCancelable(params.id)),
            Err(e) => Err(RpcError::Internal(e.to_string())),
        }
    }

    async fn load(&self, task_id: &str) -> Result<Task, RpcError> {
        self.store
            .get(task_id)
            .await
            .map_err(|e| RpcError::Internal(e.to_string()))?
            .ok_or_else(|| RpcError::TaskNotFound(task_id.to_string()))
    }

    /// Resolve task and context ids for an inbound message.
    async fn prepare(&self, params: MessageSendParams) -> Result<RequestContext, RpcError> {
        let mut message = params.message;
        if message.parts.is_empty() {
            return Err(RpcError::InvalidParams("message has no parts".into()));
        }

        let current_task = match message.task_id.as_deref() {
            Some(task_id) => {
                let task = self.load(task_id).await?;
                if task.status.state.is_terminal() {
                    return Err(RpcError::InvalidParams(format!(
                        "Task {} is in terminal state: {:?}",
                        task.id, task.status.state
                    )));
                }
                Some(task)
            }
            None => None,
        };

        let (task_id, context_id) = match &current_task {
            Some(task) => (task.id.clone(), task.context_id.clone()),
            None => (
                Uuid::new_v4().to_string(),
                message
                    .context_id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
            ),
        };
        message.task_id = Some(task_id.clone());
        message.context_id = Some(context_id.clone());

        if current_task.is_some() {
            self.store
                .append_history(&task_id, message.clone())
                .await
                .map_err(|e| RpcError::Internal(e.to_string()))?;
        }

        Ok(RequestContext {
            task_id,
            context_id,
            message: Some(message),
            current_task,
        })
    }
}

fn event_task_id(event: &TaskEvent) -> Option<String> {
    match event {
        TaskEvent::Task(task) => Some(task.id.clone()),
        TaskEvent::StatusUpdate(u) => Some(u.task_id.clone()),
        TaskEvent::ArtifactUpdate(u) => Some(u.task_id.clone()),
        TaskEvent::Message(m) => m.task_id.clone(),
    }
}

fn trim_history(mut task: Task, history_length: Option<usize>) -> Task {
    if let Some(limit) = history_length {
        let excess = task.history.len().saturating_sub(limit);
        task.history.drain(..excess);
    }
    task
}
