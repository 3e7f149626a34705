use chrono::{DateTime, Utc};

use crate::{storage::entities::RunningSession, utils::time::DayKey};

use super::error::TrackerError;

/// What [SessionState::stop] hands back for committing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoppedTask {
    pub task_name: String,
    pub elapsed_ms: u64,
    pub notes: String,
    pub owner_day: DayKey,
}

/// At most one task is timed at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Running(RunningSession),
}

impl SessionState {
    pub fn running(&self) -> Option<&RunningSession> {
        match self {
            SessionState::Idle => None,
            SessionState::Running(session) => Some(session),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running(_))
    }

    /// Begins timing `task_name`. The caller has to stop a running session first.
    pub fn start(
        &mut self,
        task_name: &str,
        day: DayKey,
        now: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        let task_name = task_name.trim();
        if task_name.is_empty() {
            return Err(TrackerError::EmptyTaskName);
        }
        debug_assert!(!self.is_running(), "previous session must be stopped first");
        self.resume(RunningSession {
            task_name: task_name.to_string(),
            started_at: now,
            draft_notes: String::new(),
            owner_day: day,
        });
        Ok(())
    }

    pub fn resume(&mut self, session: RunningSession) {
        *self = SessionState::Running(session);
    }

    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<StoppedTask> {
        match std::mem::take(self) {
            SessionState::Idle => None,
            SessionState::Running(session) => Some(StoppedTask {
                elapsed_ms: session.elapsed_ms(now),
                task_name: session.task_name,
                notes: session.draft_notes,
                owner_day: session.owner_day,
            }),
        }
    }

    pub fn record_draft_note(&mut self, text: &str) -> Result<&RunningSession, TrackerError> {
        match self {
            SessionState::Idle => Err(TrackerError::NoRunningTask),
            SessionState::Running(session) => {
                session.draft_notes = text.to_string();
                Ok(session)
            }
        }
    }

    /// Follows a ledger rename of `old` on `day`. Only the name changes.
    pub fn rename(&mut self, day: DayKey, old: &str, new: &str) -> Option<&RunningSession> {
        match self {
            SessionState::Running(session)
                if session.owner_day == day && session.task_name == old =>
            {
                session.task_name = new.to_string();
                Some(session)
            }
            _ => None,
        }
    }
}
