//! Task persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use super::types::{Message, Task, TaskEvent};

#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("Task not found: {0}")]
    NotFound(String),
}

/// Storage for tasks served by the request handler.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, task_id: &str) -> Result<Option<Task>, TaskStoreError>;

    /// Insert or replace a task.
    async fn save(&self, task: Task) -> Result<(), TaskStoreError>;

    /// Append a message to a task's history.
    async fn append_history(&self, task_id: &str, message: Message) -> Result<(), TaskStoreError> {
        let mut task = self
            .get(task_id)
            .await?
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))?;
        task.history.push(message);
        self.save(task).await
    }

    /// Fold an executor event into the stored task.
    async fn apply(&self, event: &TaskEvent) -> Result<(), TaskStoreError> {
        match event {
            TaskEvent::Task(task) => self.save(task.clone()).await,
            TaskEvent::StatusUpdate(update) => {
                let mut task = self
                    .get(&update.task_id)
                    .await?
                    .ok_or_else(|| TaskStoreError::NotFound(update.task_id.clone()))?;
                if let Some(message) = &update.status.message {
                    task.history.push(message.clone());
                }
                task.status = update.status.clone();
                self.save(task).await
            }
            TaskEvent::ArtifactUpdate(update) => {
                let mut task = self
                    .get(&update.task_id)
                    .await?
                    .ok_or_else(|| TaskStoreError::NotFound(update.task_id.clone()))?;
                let incoming = &update.artifact;
                match task
                    .artifacts
                    .iter_mut()
                    .find(|a| a.artifact_id == incoming.artifact_id)
                {
                    Some(existing) if update.append == Some(true) => {
                        existing.parts.extend(incoming.parts.iter().cloned());
                    }
                    Some(existing) => *existing = incoming.clone(),
                    None => task.artifacts.push(incoming.clone()),
                }
                self.save(task).await
            }
            TaskEvent::Message(_) => Ok(()),
        }
    }
}

/// In-memory task store (non-persistent). Tasks are kept until the process exits.
#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get(&self, task_id: &str) -> Result<Option<Task>, TaskStoreError> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }

    async fn save(&self, task: Task) -> Result<(), TaskStoreError> {
        self.tasks.write().await.insert(task.id.clone(), task);
        Ok(())
    }
}
