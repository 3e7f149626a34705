use anyhow::Result;
use tracing::warn;

use super::{entities::RunningSession, kv_storage::KeyValueStorage};

pub const RUNNING_SESSION_KEY: &str = "timetracker-running";

/// Persists the running task so a later process can pick it up again.
pub struct SessionStore<S> {
    storage: S,
}

impl<S: KeyValueStorage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// A stored value that doesn't look like a session is ignored rather than reported. It can't
    /// be resumed either way.
    pub async fn load(&self) -> Result<Option<RunningSession>> {
        let Some(value) = self.storage.get(RUNNING_SESSION_KEY).await? else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }
        match serde_json::from_value::<RunningSession>(value) {
            Ok(session) if !session.task_name.trim().is_empty() => Ok(Some(session)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("Stored running session is unreadable {e}");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, session: &RunningSession) -> Result<()> {
        self.storage
            .set(RUNNING_SESSION_KEY, serde_json::to_value(session)?)
            .await
    }

    pub async fn remove(&self) -> Result<()> {
        self.storage.remove(RUNNING_SESSION_KEY).await
    }
}
