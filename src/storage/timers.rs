//! Storage adapter for the active timers and the completion history
//!
//! Both collections live under fixed keys as JSON arrays and are read and
//! rewritten in full on every change. Reads that fail for any reason come
//! back empty; writes that fail are logged and dropped.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

use super::KeyValueStore;
use crate::{
    error::StorageError,
    state::{CompletedTimerRecord, Timer},
};

/// Key of the active timer collection
pub const TIMERS_KEY: &str = "timers";
/// Key of the completion history
pub const COMPLETED_TIMERS_KEY: &str = "completedTimers";

/// Best-effort persistence of timers and history over a [`KeyValueStore`]
#[derive(Debug, Clone)]
pub struct TimerStorage {
    store: Arc<dyn KeyValueStore>,
}

impl TimerStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load every stored timer, or nothing if the value is missing or corrupt
    pub async fn load_timers(&self) -> Vec<Timer> {
        match self.read_list::<Timer>(TIMERS_KEY).await {
            Ok(timers) => timers.into_iter().map(Timer::normalized).collect(),
            Err(e) => {
                warn!("Failed to fetch timers: {}", e);
                Vec::new()
            }
        }
    }

    /// Insert `timer`, replacing a stored timer with the same name
    pub async fn save_timer(&self, timer: &Timer) {
        if let Err(e) = self.upsert(std::slice::from_ref(timer)).await {
            error!("Failed to store timer {}: {}", timer.name, e);
        }
    }

    /// Upsert a batch of timers in one read-modify-write
    pub async fn save_timers(&self, timers: &[Timer]) {
        if timers.is_empty() {
            return;
        }
        if let Err(e) = self.upsert(timers).await {
            error!("Failed to store {} timers: {}", timers.len(), e);
        }
    }

    /// Load the completion history, or nothing if it is missing or corrupt
    pub async fn load_history(&self) -> Vec<CompletedTimerRecord> {
        match self.read_list(COMPLETED_TIMERS_KEY).await {
            Ok(history) => history,
            Err(e) => {
                warn!("Failed to fetch completed timers: {}", e);
                Vec::new()
            }
        }
    }

    /// Append one record to the completion history
    pub async fn append_history(&self, record: CompletedTimerRecord) {
        let name = record.name.clone();
        if let Err(e) = self.push_history(record).await {
            error!("Failed to store completed timer {}: {}", name, e);
        }
    }

    /// Pretty-printed JSON of the whole history, `None` when it is empty
    pub async fn export_history(&self) -> Option<String> {
        let history = self.load_history().await;
        if history.is_empty() {
            return None;
        }

        match serde_json::to_string_pretty(&history) {
            Ok(json) => Some(json),
            Err(e) => {
                error!("Failed to export completed timers: {}", e);
                None
            }
        }
    }

    async fn upsert(&self, updated: &[Timer]) -> Result<(), StorageError> {
        let mut timers = self.read_list::<Timer>(TIMERS_KEY).await?;

        for timer in updated {
            match timers.iter_mut().find(|t| t.name == timer.name) {
                Some(existing) => *existing = timer.clone(),
                None => timers.push(timer.clone()),
            }
        }

        self.write_list(TIMERS_KEY, &timers).await
    }

    async fn push_history(&self, record: CompletedTimerRecord) -> Result<(), StorageError> {
        let mut history = self.read_list::<CompletedTimerRecord>(COMPLETED_TIMERS_KEY).await?;
        history.push(record);
        self.write_list(COMPLETED_TIMERS_KEY, &history).await
    }

    /// Read a JSON array. A missing key is an empty list; a corrupt value is
    /// an error for the caller to mask.
    async fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StorageError> {
        match self.store.get_item(key).await? {
            Some(raw) if !raw.trim().is_empty() && raw.trim() != "null" => {
                Ok(serde_json::from_str(&raw)?)
            }
            _ => {
                debug!("Nothing stored under {}", key);
                Ok(Vec::new())
            }
        }
    }

    async fn write_list<T: Serialize>(&self, key: &str, items: &[T]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(items)?;
        self.store.set_item(key, raw).await
    }
}
