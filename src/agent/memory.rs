use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::state::AgentState;

/// In-process conversation store keyed by context id.
///
/// Each session has its own lock. A turn holds it from start to finish, so
/// turns of one session run one at a time while other sessions proceed.
///
/// Sessions are never evicted; they live as long as the process.
#[derive(Debug, Default)]
pub struct ConversationMemory {
    sessions: RwLock<HashMap<String, Arc<Mutex<AgentState>>>>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock a session's state, creating it on first use.
    pub async fn checkout(&self, session_id: &str) -> OwnedMutexGuard<AgentState> {
        let existing = self.sessions.read().await.get(session_id).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => {
                let mut sessions = self.sessions.write().await;
                Arc::clone(sessions.entry(session_id.to_string()).or_default())
            }
        };
        slot.lock_owned().await
    }

    /// Copy of a session's state, waiting for any running turn to finish.
    pub async fn snapshot(&self, session_id: &str) -> Option<AgentState> {
        let slot = self.sessions.read().await.get(session_id).cloned()?;
        let state = slot.lock().await;
        Some(state.clone())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
