use anyhow::Result;
use tracing::debug;

use crate::utils::time::DayKey;

use super::{
    entities::{Ledger, Note, RenameKind},
    kv_storage::KeyValueStorage,
};

pub fn ledger_key(day: DayKey) -> String {
    format!("tasks_{day}")
}

/// Reads and writes one [Ledger] per day. Every mutation is a full read, modify, overwrite cycle.
pub struct LedgerStore<S> {
    storage: S,
}

impl<S: KeyValueStorage> LedgerStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Missing ledgers load as empty ones.
    pub async fn load(&self, day: DayKey) -> Result<Ledger> {
        match self.storage.get(&ledger_key(day)).await? {
            Some(value) if !value.is_null() => Ok(serde_json::from_value(value)?),
            _ => Ok(Ledger::new()),
        }
    }

    pub async fn save(&self, day: DayKey, ledger: &Ledger) -> Result<()> {
        debug!("Saving {} tasks for {day}", ledger.len());
        self.storage
            .set(&ledger_key(day), serde_json::to_value(ledger)?)
            .await
    }

    pub async fn record(
        &self,
        day: DayKey,
        task_name: &str,
        elapsed_ms: u64,
        note: Option<Note>,
    ) -> Result<Ledger> {
        let mut ledger = self.load(day).await?;
        ledger.record(task_name, elapsed_ms, note);
        self.save(day, &ledger).await?;
        Ok(ledger)
    }

    /// Returns false without writing when the task is absent.
    pub async fn adjust_time(&self, day: DayKey, task_name: &str, time: u64) -> Result<bool> {
        let mut ledger = self.load(day).await?;
        if !ledger.adjust_time(task_name, time) {
            return Ok(false);
        }
        self.save(day, &ledger).await?;
        Ok(true)
    }

    /// See [Ledger::rename]. Nothing is written when `old` is absent.
    pub async fn rename(
        &self,
        day: DayKey,
        old: &str,
        new: &str,
        notes: Option<Vec<Note>>,
    ) -> Result<Option<RenameKind>> {
        let mut ledger = self.load(day).await?;
        let Some(kind) = ledger.rename(old, new, notes) else {
            return Ok(None);
        };
        self.save(day, &ledger).await?;
        Ok(Some(kind))
    }
}
