use thiserror::Error;

/// Rejections of user intents. Storage trouble never shows up here, it's logged and degraded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("task name can't be empty")]
    EmptyTaskName,
    #[error("note can't be empty")]
    EmptyNote,
    #[error("invalid duration {0:?}, expected HH:MM:SS")]
    InvalidDuration(String),
    #[error("no task is running")]
    NoRunningTask,
    #[error("task {0:?} is already running")]
    AlreadyRunning(String),
    #[error("time of {0:?} couldn't be saved, it keeps running")]
    UncommittedTask(String),
    #[error("task {task:?} has no note #{index}")]
    NoSuchNote { task: String, index: usize },
}
