//! Completed-timer history entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One finished countdown, appended when a timer reaches zero
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTimerRecord {
    pub name: String,
    /// Moment the countdown hit zero, stored as epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub completion_time: DateTime<Utc>,
}

impl CompletedTimerRecord {
    pub fn new(name: impl Into<String>, completion_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            completion_time,
        }
    }

    /// Completion time as epoch milliseconds
    pub fn completion_millis(&self) -> i64 {
        self.completion_time.timestamp_millis()
    }
}
