//! The reconciliation engine. [Tracker] owns the running session and applies every user intent
//! to the day ledgers, keeping both consistent with what's persisted.
//!
//! Every mutating intent takes `&mut self`, so intents are applied one after another and each
//! one finishes its read, modify, write cycle before the next can observe the ledger.

pub mod error;
pub mod export;
pub mod session;
pub mod summary;
pub mod ticker;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use error::TrackerError;
use futures::StreamExt;
use session::{SessionState, StoppedTask};
use summary::{DayTotal, day_range};
use ticker::{TICK_PERIOD, Ticker};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    storage::{
        entities::{Ledger, Note, RunningSession},
        kv_storage::KeyValueStorage,
        ledger_store::LedgerStore,
        preferences::{PreferenceStore, Theme},
        session_store::SessionStore,
    },
    utils::{
        clock::Clock,
        time::{DayKey, format_ms, parse_hms},
    },
};

const NOTE_TIMESTAMP_FORMAT: &str = "%H:%M:%S";

/// Result of an intent aimed at a task of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// The task isn't in the ledger (anymore). Callers should reload what they show.
    Missing,
    /// Storage failed. Nothing was changed, the failure is in the logs.
    StorageUnavailable,
}

/// A stopped task together with what happened to its time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stopped {
    pub task: StoppedTask,
    /// [Outcome::Applied] once the time is in the ledger.
    pub outcome: Outcome,
}

pub struct Tracker<S> {
    ledgers: LedgerStore<Arc<S>>,
    sessions: SessionStore<Arc<S>>,
    preferences: PreferenceStore<Arc<S>>,
    clock: Arc<dyn Clock>,
    selected_day: DayKey,
    state: SessionState,
    ticker: Option<Ticker>,
    elapsed: Arc<watch::Sender<u64>>,
}

impl<S: KeyValueStorage> Tracker<S> {
    pub fn new(storage: S, clock: Arc<dyn Clock>) -> Self {
        let storage = Arc::new(storage);
        let (elapsed, _) = watch::channel(0);
        Self {
            ledgers: LedgerStore::new(storage.clone()),
            sessions: SessionStore::new(storage.clone()),
            preferences: PreferenceStore::new(storage),
            selected_day: clock.today(),
            clock,
            state: SessionState::Idle,
            ticker: None,
            elapsed: Arc::new(elapsed),
        }
    }

    pub fn selected_day(&self) -> DayKey {
        self.selected_day
    }

    pub fn select_day(&mut self, day: DayKey) {
        debug!("Selecting {day}");
        self.selected_day = day;
    }

    /// Moves the selection by `days`, staying put if that would leave the calendar.
    pub fn shift_day(&mut self, days: i64) -> DayKey {
        if let Some(day) = self.selected_day.offset(days) {
            self.select_day(day);
        }
        self.selected_day
    }

    pub fn running_session(&self) -> Option<&RunningSession> {
        self.state.running()
    }

    /// Elapsed milliseconds of the running session, refreshed once per second while it runs.
    pub fn ticks(&self) -> watch::Receiver<u64> {
        self.elapsed.subscribe()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|ticker| !ticker.is_finished())
    }

    /// Whatever session is persisted, regardless of its day.
    pub async fn pending_session(&self) -> Option<RunningSession> {
        self.sessions
            .load()
            .await
            .inspect_err(|e| warn!("Couldn't load running session {e:?}"))
            .ok()
            .flatten()
    }

    /// Offers the persisted session for resumption, but only if it belongs to the selected day.
    /// The caller either [resumes](Self::resume) it or [discards](Self::discard) it.
    pub async fn try_resume(&self) -> Option<RunningSession> {
        if self.state.is_running() {
            return None;
        }
        let session = self.pending_session().await?;
        if session.owner_day != self.selected_day {
            info!(
                "Not offering session {:?} from {} while {} is selected",
                session.task_name, session.owner_day, self.selected_day
            );
            return None;
        }
        Some(session)
    }

    /// Continues a persisted session. Refused while another session runs, since that one would
    /// be dropped without being committed.
    pub fn resume(&mut self, session: RunningSession) -> Result<(), TrackerError> {
        if let Some(running) = self.state.running() {
            return Err(TrackerError::AlreadyRunning(running.task_name.clone()));
        }
        info!("Resuming {:?} started at {}", session.task_name, session.started_at);
        self.run_session(session);
        Ok(())
    }

    /// Drops the running or persisted session without committing any time.
    pub async fn discard(&mut self) -> Option<RunningSession> {
        self.ticker = None;
        let discarded = match std::mem::take(&mut self.state) {
            SessionState::Running(session) => Some(session),
            SessionState::Idle => self.pending_session().await,
        };
        self.remove_persisted_session().await;
        if let Some(session) = &discarded {
            info!("Discarded session {:?}", session.task_name);
        }
        discarded
    }

    /// Starts timing a task on the selected day. A task that is already running is stopped and
    /// committed first, and returned. When that commit fails the previous task keeps running and
    /// nothing new is started.
    pub async fn start(&mut self, task_name: &str) -> Result<Option<Stopped>, TrackerError> {
        if task_name.trim().is_empty() {
            return Err(TrackerError::EmptyTaskName);
        }

        let previous = match self.state.running().cloned() {
            Some(session) => match self.stop().await {
                Some(stopped) if stopped.outcome != Outcome::Applied => {
                    self.run_session(session);
                    return Err(TrackerError::UncommittedTask(stopped.task.task_name));
                }
                stopped => stopped,
            },
            None => None,
        };

        let now = self.now();
        self.state.start(task_name, self.selected_day, now)?;
        self.start_ticker(now);
        self.persist_session().await;

        if let Some(session) = self.state.running() {
            info!("Started {:?} on {}", session.task_name, session.owner_day);
        }
        Ok(previous)
    }

    /// Stops the running task and commits its time into the ledger of the day it started on.
    /// The persisted session is only removed once the commit went through, otherwise it stays
    /// around to be resumed and stopped again.
    pub async fn stop(&mut self) -> Option<Stopped> {
        let task = self.state.stop(self.now())?;
        self.ticker = None;
        let outcome = self.commit(&task).await;
        if outcome == Outcome::Applied {
            self.remove_persisted_session().await;
            info!("Stopped {:?} after {}", task.task_name, format_ms(task.elapsed_ms));
        } else {
            warn!("Keeping session of {:?}, its time wasn't committed", task.task_name);
        }
        Some(Stopped { task, outcome })
    }

    /// Adds a stopped task to its ledger. Repeated commits for one name accumulate.
    pub async fn commit(&self, stopped: &StoppedTask) -> Outcome {
        let draft = stopped.notes.trim();
        let note = (!draft.is_empty()).then(|| {
            Note::new(
                draft,
                self.note_timestamp(),
                Some(format_ms(stopped.elapsed_ms)),
            )
        });

        match self
            .ledgers
            .record(stopped.owner_day, &stopped.task_name, stopped.elapsed_ms, note)
            .await
        {
            Ok(_) => Outcome::Applied,
            Err(e) => {
                warn!("Couldn't commit {:?}: {e:?}", stopped.task_name);
                Outcome::StorageUnavailable
            }
        }
    }

    /// Replaces the draft note of the running task.
    pub async fn record_draft_note(&mut self, text: &str) -> Result<(), TrackerError> {
        self.state.record_draft_note(text)?;
        self.persist_session().await;
        Ok(())
    }

    /// Renames a task of the selected day, merging into `new` when it already exists. `notes`
    /// replaces the notes of `old`. A running task with the old name follows the rename.
    pub async fn rename(
        &mut self,
        old: &str,
        new: &str,
        notes: Option<Vec<Note>>,
    ) -> Result<Outcome, TrackerError> {
        let new = new.trim();
        if new.is_empty() {
            return Err(TrackerError::EmptyTaskName);
        }
        let notes = notes.map(|notes| {
            notes
                .into_iter()
                .filter(|note| !note.text.trim().is_empty())
                .collect::<Vec<_>>()
        });

        let day = self.selected_day;
        let kind = match self.ledgers.rename(day, old, new, notes).await {
            Ok(Some(kind)) => kind,
            Ok(None) => {
                debug!("Nothing to rename, {old:?} is not tracked on {day}");
                return Ok(Outcome::Missing);
            }
            Err(e) => {
                warn!("Couldn't rename {old:?}: {e:?}");
                return Ok(Outcome::StorageUnavailable);
            }
        };
        info!("Renamed {old:?} to {new:?} on {day} ({kind:?})");

        if self.state.rename(day, old, new).is_some() {
            self.persist_session().await;
        }
        Ok(Outcome::Applied)
    }

    /// Overwrites the time of a task with a `HH:MM:SS` duration.
    pub async fn adjust_time(
        &mut self,
        task_name: &str,
        duration: &str,
    ) -> Result<Outcome, TrackerError> {
        let time = parse_hms(duration)
            .ok_or_else(|| TrackerError::InvalidDuration(duration.to_string()))?;

        match self
            .ledgers
            .adjust_time(self.selected_day, task_name, time)
            .await
        {
            Ok(true) => {
                info!("Adjusted {task_name:?} to {}", format_ms(time));
                Ok(Outcome::Applied)
            }
            Ok(false) => Ok(Outcome::Missing),
            Err(e) => {
                warn!("Couldn't adjust {task_name:?}: {e:?}");
                Ok(Outcome::StorageUnavailable)
            }
        }
    }

    /// Appends a note without a duration to a tracked task.
    pub async fn add_note(&mut self, task_name: &str, text: &str) -> Result<Outcome, TrackerError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TrackerError::EmptyNote);
        }
        let Some(ledger) = self.load_ledger(self.selected_day).await else {
            return Ok(Outcome::StorageUnavailable);
        };
        let Some(entry) = ledger.get(task_name) else {
            return Ok(Outcome::Missing);
        };

        let mut notes = entry.notes.clone();
        notes.push(Note::new(text, self.note_timestamp(), None));
        Ok(self.replace_notes(task_name, notes).await)
    }

    /// Removes the note at `index` (starting at 0) from a tracked task.
    pub async fn remove_note(
        &mut self,
        task_name: &str,
        index: usize,
    ) -> Result<Outcome, TrackerError> {
        let Some(ledger) = self.load_ledger(self.selected_day).await else {
            return Ok(Outcome::StorageUnavailable);
        };
        let Some(entry) = ledger.get(task_name) else {
            return Ok(Outcome::Missing);
        };
        if index >= entry.notes.len() {
            return Err(TrackerError::NoSuchNote {
                task: task_name.to_string(),
                index,
            });
        }

        let mut notes = entry.notes.clone();
        notes.remove(index);
        Ok(self.replace_notes(task_name, notes).await)
    }

    /// Read-through view of a day. Empty when storage fails.
    pub async fn ledger(&self, day: DayKey) -> Ledger {
        self.load_ledger(day).await.unwrap_or_default()
    }

    pub async fn total(&self, day: DayKey) -> u64 {
        self.ledger(day).await.total()
    }

    pub async fn to_markdown(&self, day: DayKey) -> String {
        export::ledger_to_markdown(day, &self.ledger(day).await)
    }

    /// Per-day totals between `from` and `to`, both inclusive.
    pub async fn summary(&self, from: DayKey, to: DayKey) -> Vec<DayTotal> {
        day_range(from, to)
            .map(move |day| async move { (day, self.ledger(day).await) })
            .buffered(4)
            .map(|(day, ledger)| DayTotal {
                day,
                total_ms: ledger.total(),
                tasks: ledger.len(),
            })
            .collect()
            .await
    }

    pub async fn theme(&self) -> Theme {
        self.preferences
            .theme()
            .await
            .inspect_err(|e| warn!("Couldn't load theme {e:?}"))
            .unwrap_or_default()
    }

    pub async fn set_theme(&mut self, theme: Theme) -> Outcome {
        match self.preferences.set_theme(theme).await {
            Ok(()) => Outcome::Applied,
            Err(e) => {
                warn!("Couldn't save theme {e:?}");
                Outcome::StorageUnavailable
            }
        }
    }

    pub async fn toggle_theme(&mut self) -> Theme {
        let theme = self.theme().await.toggled();
        self.set_theme(theme).await;
        theme
    }

    async fn replace_notes(&mut self, task_name: &str, notes: Vec<Note>) -> Outcome {
        match self
            .ledgers
            .rename(self.selected_day, task_name, task_name, Some(notes))
            .await
        {
            Ok(Some(_)) => Outcome::Applied,
            Ok(None) => Outcome::Missing,
            Err(e) => {
                warn!("Couldn't update notes of {task_name:?}: {e:?}");
                Outcome::StorageUnavailable
            }
        }
    }

    async fn load_ledger(&self, day: DayKey) -> Option<Ledger> {
        self.ledgers
            .load(day)
            .await
            .inspect_err(|e| warn!("Couldn't load ledger for {day}: {e:?}"))
            .ok()
    }

    async fn persist_session(&self) {
        if let Some(session) = self.state.running() {
            if let Err(e) = self.sessions.save(session).await {
                warn!("Couldn't persist running session {e:?}");
            }
        }
    }

    async fn remove_persisted_session(&self) {
        if let Err(e) = self.sessions.remove().await {
            warn!("Couldn't remove running session {e:?}");
        }
    }

    fn run_session(&mut self, session: RunningSession) {
        self.start_ticker(session.started_at);
        self.state.resume(session);
    }

    fn start_ticker(&mut self, started_at: DateTime<Utc>) {
        self.elapsed.send_replace(0);
        self.ticker = Some(Ticker::spawn(
            started_at,
            self.clock.clone(),
            TICK_PERIOD,
            self.elapsed.clone(),
        ));
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }

    fn note_timestamp(&self) -> String {
        self.clock.now().format(NOTE_TIMESTAMP_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, bail};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::{Value, json};

    use crate::{
        storage::{
            entities::{Note, RunningSession, TaskEntry},
            kv_storage::{KeyValueStorage, MemoryStorage, MockKeyValueStorage},
            ledger_store::ledger_key,
            preferences::Theme,
            session_store::RUNNING_SESSION_KEY,
        },
        tracker::{Outcome, error::TrackerError, summary::DayTotal},
        utils::{
            clock::{Clock, testing::ManualClock},
            logging::TEST_LOGGING,
            time::DayKey,
        },
    };

    use super::Tracker;

    fn today() -> DayKey {
        "2025-11-19".parse().unwrap()
    }

    fn setup() -> (Arc<MemoryStorage>, Arc<ManualClock>, Tracker<Arc<MemoryStorage>>) {
        *TEST_LOGGING;
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::at(2025, 11, 19, 9, 0));
        let tracker = Tracker::new(storage.clone(), clock.clone());
        (storage, clock, tracker)
    }

    async fn seed(storage: &MemoryStorage, value: serde_json::Value) {
        storage.set(&ledger_key(today()), value).await.unwrap();
    }

    fn note(text: &str, timestamp: &str, duration: &str) -> Note {
        Note::new(text, timestamp, Some(duration.into()))
    }

    #[tokio::test]
    async fn test_stop_commit_is_additive() {
        let (_, clock, mut tracker) = setup();

        tracker.start("A").await.unwrap();
        tracker.record_draft_note("  first pass ").await.unwrap();
        clock.advance_ms(1000);
        let stopped = tracker.stop().await.unwrap();
        assert_eq!(stopped.task.elapsed_ms, 1000);
        assert_eq!(stopped.outcome, Outcome::Applied);

        tracker.start("A").await.unwrap();
        clock.advance_ms(2000);
        tracker.stop().await.unwrap();

        let ledger = tracker.ledger(today()).await;
        let entry = ledger.get("A").unwrap();
        assert_eq!(entry.time, 3000);
        assert_eq!(entry.notes, vec![note("first pass", "09:00:01", "00:00:01")]);
        assert!(tracker.running_session().is_none());
        assert!(tracker.pending_session().await.is_none());
    }

    #[tokio::test]
    async fn test_start_rejects_blank_names_without_stopping() {
        let (_, _, mut tracker) = setup();
        tracker.start("A").await.unwrap();

        assert_eq!(tracker.start("  ").await.err(), Some(TrackerError::EmptyTaskName));
        assert_eq!(tracker.running_session().unwrap().task_name, "A");
    }

    #[tokio::test]
    async fn test_switching_tasks_commits_the_previous_one_separately() {
        let (_, clock, mut tracker) = setup();

        tracker.start("A").await.unwrap();
        clock.advance_ms(1500);
        let previous = tracker.start("B").await.unwrap().unwrap();
        assert_eq!(previous.task.task_name, "A");
        assert_eq!(previous.outcome, Outcome::Applied);
        clock.advance_ms(500);
        tracker.stop().await.unwrap();

        let ledger = tracker.ledger(today()).await;
        assert_eq!(ledger.get("A").map(|entry| entry.time), Some(1500));
        assert_eq!(ledger.get("B").map(|entry| entry.time), Some(500));
    }

    #[tokio::test]
    async fn test_start_persists_session_immediately() {
        let (storage, _, mut tracker) = setup();
        tracker.start("Write docs").await.unwrap();

        let stored = storage.get(RUNNING_SESSION_KEY).await.unwrap().unwrap();
        assert_eq!(stored["task"], json!("Write docs"));
        assert_eq!(stored["date"], json!("2025-11-19"));
        assert_eq!(stored["notes"], json!(""));
    }

    #[tokio::test]
    async fn test_rename_merges_target_notes_first() {
        let (storage, _, mut tracker) = setup();
        seed(
            &storage,
            json!({
                "A": {
                    "time": 1000,
                    "notes": [{ "text": "n1", "timestamp": "09:00", "duration": "00:00:01" }],
                },
                "B": {
                    "time": 2000,
                    "notes": [{ "text": "n2", "timestamp": "10:00", "duration": "00:00:02" }],
                },
            }),
        )
        .await;
        let total = tracker.total(today()).await;

        assert_eq!(tracker.rename("A", "B", None).await, Ok(Outcome::Applied));

        let ledger = tracker.ledger(today()).await;
        assert!(!ledger.contains("A"));
        assert_eq!(
            ledger.get("B"),
            Some(&TaskEntry::new(
                3000,
                vec![note("n2", "10:00", "00:00:02"), note("n1", "09:00", "00:00:01")]
            ))
        );
        assert_eq!(tracker.total(today()).await, total);
    }

    #[tokio::test]
    async fn test_rename_of_running_task_follows_into_session() {
        let (storage, clock, mut tracker) = setup();
        seed(&storage, json!({ "C": { "time": 0, "notes": [] } })).await;

        tracker.start("C").await.unwrap();
        tracker.record_draft_note("halfway").await.unwrap();
        let before = tracker.running_session().unwrap().clone();

        assert_eq!(tracker.rename("C", "D", None).await, Ok(Outcome::Applied));

        let session = tracker.running_session().unwrap();
        assert_eq!(session.task_name, "D");
        assert_eq!(session.started_at, before.started_at);
        assert_eq!(session.draft_notes, "halfway");
        assert_eq!(
            tracker.pending_session().await.map(|session| session.task_name),
            Some("D".to_string())
        );

        clock.advance_ms(4000);
        tracker.stop().await.unwrap();
        let ledger = tracker.ledger(today()).await;
        assert!(!ledger.contains("C"));
        assert_eq!(ledger.get("D").map(|entry| entry.time), Some(4000));
    }

    #[tokio::test]
    async fn test_rename_of_missing_task_is_a_no_op() {
        let (storage, _, mut tracker) = setup();
        seed(&storage, json!({ "A": 1000 })).await;
        tracker.start("Z").await.unwrap();

        assert_eq!(tracker.rename("Z", "A", None).await, Ok(Outcome::Missing));
        assert_eq!(tracker.running_session().unwrap().task_name, "Z");
        assert_eq!(
            tracker.rename("A", "   ", None).await,
            Err(TrackerError::EmptyTaskName)
        );
        assert_eq!(tracker.ledger(today()).await.get("A").unwrap().time, 1000);
    }

    #[tokio::test]
    async fn test_rename_with_edited_notes_drops_blank_ones() {
        let (storage, _, mut tracker) = setup();
        seed(&storage, json!({ "A": { "time": 5, "notes": [] } })).await;

        let edited = vec![
            Note::new("kept", "09:00", None),
            Note::new("   ", "09:05", None),
        ];
        assert_eq!(
            tracker.rename("A", "A", Some(edited)).await,
            Ok(Outcome::Applied)
        );
        assert_eq!(
            tracker.ledger(today()).await.get("A").unwrap().notes,
            vec![Note::new("kept", "09:00", None)]
        );
    }

    #[tokio::test]
    async fn test_adjust_time() {
        let (storage, _, mut tracker) = setup();
        seed(
            &storage,
            json!({
                "A": {
                    "time": 1000,
                    "notes": [{ "text": "n", "timestamp": "", "duration": null }],
                },
            }),
        )
        .await;

        assert_eq!(
            tracker.adjust_time("A", "01:02:03").await,
            Ok(Outcome::Applied)
        );
        let entry = tracker.ledger(today()).await.get("A").cloned().unwrap();
        assert_eq!(entry.time, 3_723_000);
        assert_eq!(entry.notes.len(), 1);

        for invalid in ["1:2:3x", "25:61:00"] {
            assert_eq!(
                tracker.adjust_time("A", invalid).await,
                Err(TrackerError::InvalidDuration(invalid.to_string()))
            );
        }
        assert_eq!(tracker.ledger(today()).await.get("A").unwrap().time, 3_723_000);
        assert_eq!(
            tracker.adjust_time("B", "00:00:01").await,
            Ok(Outcome::Missing)
        );
        assert!(!tracker.ledger(today()).await.contains("B"));
    }

    #[tokio::test]
    async fn test_resume_is_only_offered_for_the_selected_day() {
        let (storage, clock, mut tracker) = setup();
        tracker.start("Yesterday's task").await.unwrap();
        drop(tracker);

        // Reload on the next day.
        clock.set(
            chrono::Local
                .with_ymd_and_hms(2025, 11, 20, 8, 0, 0)
                .single()
                .unwrap(),
        );
        let mut tracker = Tracker::new(storage.clone(), clock.clone());
        assert_eq!(tracker.selected_day().to_string(), "2025-11-20");
        assert!(tracker.try_resume().await.is_none());
        assert!(tracker.pending_session().await.is_some());

        // Going back to the owning day offers it again.
        tracker.shift_day(-1);
        let session = tracker.try_resume().await.unwrap();
        tracker.resume(session).unwrap();
        assert!(tracker.is_ticking());

        let stopped = tracker.stop().await.unwrap();
        assert_eq!(stopped.task.elapsed_ms, 23 * 3600 * 1000);
        assert_eq!(
            tracker.ledger(today()).await.get("Yesterday's task").unwrap().time,
            23 * 3600 * 1000
        );
    }

    #[tokio::test]
    async fn test_commit_goes_to_the_owner_day() {
        let (_, clock, mut tracker) = setup();
        tracker.start("A").await.unwrap();
        tracker.shift_day(-3);
        clock.advance_ms(1000);
        tracker.stop().await.unwrap();

        assert_eq!(tracker.total(today()).await, 1000);
        assert_eq!(tracker.total(tracker.selected_day()).await, 0);
    }

    #[tokio::test]
    async fn test_discard_drops_session_without_commit() {
        let (_, clock, mut tracker) = setup();
        tracker.start("A").await.unwrap();
        clock.advance_ms(1000);

        let discarded = tracker.discard().await.unwrap();
        assert_eq!(discarded.task_name, "A");
        assert!(!tracker.is_ticking());
        assert!(tracker.pending_session().await.is_none());
        assert!(tracker.ledger(today()).await.is_empty());
        assert!(tracker.stop().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_lives_as_long_as_the_session() {
        let (_, clock, mut tracker) = setup();
        let mut ticks = tracker.ticks();
        assert!(!tracker.is_ticking());

        tracker.start("A").await.unwrap();
        assert!(tracker.is_ticking());
        ticks.changed().await.unwrap();
        clock.advance_ms(1000);
        ticks.changed().await.unwrap();
        assert_eq!(*ticks.borrow_and_update(), 1000);

        tracker.stop().await.unwrap();
        assert!(!tracker.is_ticking());
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert!(!ticks.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_draft_note_needs_running_task() {
        let (_, _, mut tracker) = setup();
        assert_eq!(
            tracker.record_draft_note("hello").await,
            Err(TrackerError::NoRunningTask)
        );
    }

    #[tokio::test]
    async fn test_add_and_remove_notes() {
        let (storage, clock, mut tracker) = setup();
        seed(&storage, json!({ "A": { "time": 5, "notes": [] } })).await;
        clock.advance_ms(90_000);

        assert_eq!(tracker.add_note("A", " looked at logs ").await, Ok(Outcome::Applied));
        assert_eq!(tracker.add_note("A", "second").await, Ok(Outcome::Applied));
        assert_eq!(tracker.add_note("B", "nope").await, Ok(Outcome::Missing));
        assert_eq!(tracker.add_note("A", " ").await, Err(TrackerError::EmptyNote));

        assert_eq!(tracker.remove_note("A", 1).await, Ok(Outcome::Applied));
        assert_eq!(
            tracker.remove_note("A", 1).await,
            Err(TrackerError::NoSuchNote {
                task: "A".into(),
                index: 1
            })
        );
        assert_eq!(
            tracker.ledger(today()).await.get("A").unwrap().notes,
            vec![Note::new("looked at logs", "09:01:30", None)]
        );
    }

    #[tokio::test]
    async fn test_summary_and_markdown() {
        let (storage, _, tracker) = setup();
        seed(&storage, json!({ "A": 1000, "B": 2000 })).await;
        storage
            .set("tasks_2025-11-17", json!({ "C": 500 }))
            .await
            .unwrap();

        let summary = tracker
            .summary("2025-11-17".parse().unwrap(), today())
            .await;
        assert_eq!(
            summary,
            vec![
                DayTotal {
                    day: "2025-11-17".parse().unwrap(),
                    total_ms: 500,
                    tasks: 1
                },
                DayTotal {
                    day: "2025-11-18".parse().unwrap(),
                    total_ms: 0,
                    tasks: 0
                },
                DayTotal {
                    day: today(),
                    total_ms: 3000,
                    tasks: 2
                },
            ]
        );

        let markdown = tracker.to_markdown(today()).await;
        assert!(markdown.starts_with("# Tasks for 2025-11-19\n\n- **B** — 00:00:02\n"));
    }

    #[tokio::test]
    async fn test_theme_toggles() {
        let (_, _, mut tracker) = setup();
        assert_eq!(tracker.theme().await, Theme::Dark);
        assert_eq!(tracker.toggle_theme().await, Theme::Light);
        assert_eq!(tracker.theme().await, Theme::Light);
    }

    #[tokio::test]
    async fn test_unavailable_storage_degrades_to_no_ops() {
        *TEST_LOGGING;
        let mut storage = MockKeyValueStorage::new();
        storage
            .expect_get()
            .returning(|_| Err(anyhow!("storage unavailable")));
        storage
            .expect_set()
            .returning(|_, _| Err(anyhow!("storage unavailable")));
        storage
            .expect_remove()
            .returning(|_| Err(anyhow!("storage unavailable")));
        let clock = Arc::new(ManualClock::at(2025, 11, 19, 9, 0));
        let mut tracker = Tracker::new(storage, clock.clone());

        assert!(tracker.ledger(today()).await.is_empty());
        assert_eq!(tracker.total(today()).await, 0);
        assert!(tracker.try_resume().await.is_none());
        assert_eq!(tracker.theme().await, Theme::Dark);

        tracker.start("A").await.unwrap();
        clock.advance_ms(1000);
        let stopped = tracker.stop().await.unwrap();
        assert_eq!(stopped.task.elapsed_ms, 1000);
        assert_eq!(stopped.outcome, Outcome::StorageUnavailable);

        assert_eq!(
            tracker.rename("A", "B", None).await,
            Ok(Outcome::StorageUnavailable)
        );
        assert_eq!(
            tracker.adjust_time("A", "00:00:01").await,
            Ok(Outcome::StorageUnavailable)
        );
        assert_eq!(
            tracker.add_note("A", "note").await,
            Ok(Outcome::StorageUnavailable)
        );
    }

    /// Loses every ledger write, everything else works.
    struct LedgerWritesFail(MemoryStorage);

    #[async_trait]
    impl KeyValueStorage for LedgerWritesFail {
        async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
            if key.starts_with("tasks_") {
                bail!("disk full");
            }
            self.0.set(key, value).await
        }

        async fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.0.remove(key).await
        }
    }

    fn setup_failing_ledgers() -> (Arc<ManualClock>, Tracker<LedgerWritesFail>) {
        *TEST_LOGGING;
        let clock = Arc::new(ManualClock::at(2025, 11, 19, 9, 0));
        let tracker = Tracker::new(LedgerWritesFail(MemoryStorage::new()), clock.clone());
        (clock, tracker)
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_the_session_for_later() {
        let (clock, mut tracker) = setup_failing_ledgers();
        tracker.start("A").await.unwrap();
        tracker.record_draft_note("long one").await.unwrap();
        clock.advance_ms(3_600_000);

        let stopped = tracker.stop().await.unwrap();
        assert_eq!(stopped.task.elapsed_ms, 3_600_000);
        assert_eq!(stopped.outcome, Outcome::StorageUnavailable);
        assert!(tracker.running_session().is_none());
        assert!(tracker.ledger(today()).await.is_empty());

        let session = tracker.try_resume().await.unwrap();
        assert_eq!(session.task_name, "A");
        assert_eq!(session.draft_notes, "long one");
        tracker.resume(session).unwrap();
        clock.advance_ms(1000);
        let stopped = tracker.stop().await.unwrap();
        assert_eq!(stopped.task.elapsed_ms, 3_601_000);
        assert!(tracker.pending_session().await.is_some());
    }

    #[tokio::test]
    async fn test_switch_is_refused_when_previous_time_cannot_be_saved() {
        let (clock, mut tracker) = setup_failing_ledgers();
        tracker.start("A").await.unwrap();
        clock.advance_ms(1000);

        assert_eq!(
            tracker.start("B").await.err(),
            Some(TrackerError::UncommittedTask("A".into()))
        );

        let running = tracker.running_session().unwrap();
        assert_eq!(running.task_name, "A");
        assert_eq!(running.elapsed_ms(clock.now().with_timezone(&Utc)), 1000);
        assert!(tracker.is_ticking());
        assert_eq!(
            tracker.pending_session().await.map(|session| session.task_name),
            Some("A".to_string())
        );
    }

    #[tokio::test]
    async fn test_resume_is_refused_while_running() {
        let (_, clock, mut tracker) = setup();
        tracker.start("A").await.unwrap();
        let other = RunningSession {
            task_name: "B".into(),
            started_at: clock.now().with_timezone(&Utc),
            draft_notes: String::new(),
            owner_day: today(),
        };

        assert_eq!(
            tracker.resume(other),
            Err(TrackerError::AlreadyRunning("A".into()))
        );
        assert_eq!(tracker.running_session().unwrap().task_name, "A");
        assert_eq!(
            tracker.pending_session().await.map(|session| session.task_name),
            Some("A".to_string())
        );
    }

    #[tokio::test]
    async fn test_reload_shares_state_through_storage() {
        let (storage, clock, mut tracker) = setup();
        tracker.start("A").await.unwrap();
        tracker.record_draft_note("keep me").await.unwrap();
        drop(tracker);

        let mut reloaded = Tracker::new(storage.clone(), clock.clone());
        let session = reloaded.try_resume().await.unwrap();
        assert_eq!(
            session,
            RunningSession {
                task_name: "A".into(),
                started_at: clock.now().with_timezone(&Utc),
                draft_notes: "keep me".into(),
                owner_day: today(),
            }
        );
        reloaded.resume(session).unwrap();
        clock.advance_ms(60_000);
        let stopped = reloaded.stop().await.unwrap();
        assert_eq!(stopped.task.elapsed_ms, 60_000);
        assert_eq!(
            reloaded.ledger(today()).await.get("A").unwrap().notes,
            vec![note("keep me", "09:01:00", "00:01:00")]
        );
    }
}
