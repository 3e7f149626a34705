use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::utils::time::DayKey;

/// A note attached to a task. `duration` is only set for notes written at stop time; notes added
/// while editing a ledger carry no duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredNote")]
pub struct Note {
    pub text: String,
    pub timestamp: String,
    pub duration: Option<String>,
}

impl Note {
    pub fn new(
        text: impl Into<String>,
        timestamp: impl Into<String>,
        duration: Option<String>,
    ) -> Self {
        Self {
            text: text.into(),
            timestamp: timestamp.into(),
            duration,
        }
    }
}

/// Older ledgers sometimes kept notes as bare strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredNote {
    Text(String),
    Full {
        text: String,
        #[serde(default)]
        timestamp: Option<String>,
        #[serde(default)]
        duration: Option<String>,
    },
}

impl From<StoredNote> for Note {
    fn from(value: StoredNote) -> Self {
        match value {
            StoredNote::Text(text) => Note::new(text, "", None),
            StoredNote::Full {
                text,
                timestamp,
                duration,
            } => Note::new(text, timestamp.unwrap_or_default(), duration),
        }
    }
}

/// Accumulated time and notes of one task within one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredTaskEntry")]
pub struct TaskEntry {
    pub time: u64,
    pub notes: Vec<Note>,
}

impl TaskEntry {
    pub fn new(time: u64, notes: Vec<Note>) -> Self {
        Self { time, notes }
    }
}

/// The first ledgers mapped a task straight to its duration. They are upgraded on read so nothing
/// past deserialization has to care.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTaskEntry {
    Legacy(u64),
    Current {
        #[serde(default)]
        time: u64,
        #[serde(default)]
        notes: Option<Vec<Note>>,
    },
}

impl From<StoredTaskEntry> for TaskEntry {
    fn from(value: StoredTaskEntry) -> Self {
        match value {
            StoredTaskEntry::Legacy(time) => TaskEntry::new(time, vec![]),
            StoredTaskEntry::Current { time, notes } => {
                TaskEntry::new(time, notes.unwrap_or_default())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameKind {
    /// Target didn't exist, the entry moved under the new name.
    Renamed,
    /// Target existed, times were summed and notes concatenated.
    Merged,
    /// Old and new name are equal, only notes could change.
    NotesUpdated,
}

/// Every task tracked during one day. Keeps insertion order, which is the order tasks were first
/// seen and the tie breaker for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: IndexMap<String, TaskEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&TaskEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn total(&self) -> u64 {
        self.entries.values().map(|entry| entry.time).sum()
    }

    /// Entries by descending time. The sort is stable, so equal times keep insertion order.
    pub fn sorted(&self) -> Vec<(&str, &TaskEntry)> {
        let mut entries = self.iter().collect::<Vec<_>>();
        entries.sort_by(|left, right| right.1.time.cmp(&left.1.time));
        entries
    }

    /// Adds tracked time to a task, creating it when needed.
    pub fn record(&mut self, name: &str, elapsed_ms: u64, note: Option<Note>) {
        let entry = self.entries.entry(name.to_string()).or_default();
        entry.time = entry.time.saturating_add(elapsed_ms);
        entry.notes.extend(note);
    }

    /// Overwrites time of an existing task. Returns false if the task is absent.
    pub fn adjust_time(&mut self, name: &str, time: u64) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.time = time;
                true
            }
            None => false,
        }
    }

    /// Moves `old` under `new`, merging into `new` if it already exists. `notes` replaces the
    /// notes carried over from `old`. Returns [None] and leaves the ledger untouched when `old`
    /// is absent.
    pub fn rename(&mut self, old: &str, new: &str, notes: Option<Vec<Note>>) -> Option<RenameKind> {
        if old == new {
            let entry = self.entries.get_mut(old)?;
            if let Some(notes) = notes {
                entry.notes = notes;
            }
            return Some(RenameKind::NotesUpdated);
        }

        let mut source = self.entries.shift_remove(old)?;
        if let Some(notes) = notes {
            source.notes = notes;
        }

        match self.entries.get_mut(new) {
            Some(target) => {
                // Target notes stay first.
                target.time = target.time.saturating_add(source.time);
                target.notes.append(&mut source.notes);
                Some(RenameKind::Merged)
            }
            None => {
                self.entries.insert(new.to_string(), source);
                Some(RenameKind::Renamed)
            }
        }
    }
}

impl<K: Into<String>> FromIterator<(K, TaskEntry)> for Ledger {
    fn from_iter<T: IntoIterator<Item = (K, TaskEntry)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// The persisted shape of the task currently being timed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningSession {
    #[serde(rename = "task")]
    pub task_name: String,
    #[serde(rename = "startTime", with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "notes", default)]
    pub draft_notes: String,
    #[serde(rename = "date")]
    pub owner_day: DayKey,
}

impl RunningSession {
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        (now - self.started_at).num_milliseconds().max(0) as u64
    }
}
