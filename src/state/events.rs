//! Notifications published while timers change state

use serde::{Deserialize, Serialize};

use super::CompletedTimerRecord;

/// Event emitted by a timer transition.
///
/// `Halfway` and `Completed` are the alerts a presentation layer shows;
/// `Reset` tells it to dismiss any completion dialog for that timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TimerEvent {
    Started { name: String, remaining_time: u64 },
    Paused { name: String, remaining_time: u64 },
    Reset { name: String },
    Halfway { name: String, remaining_time: u64 },
    Completed { record: CompletedTimerRecord },
}

impl TimerEvent {
    /// Name of the timer the event belongs to
    pub fn timer_name(&self) -> &str {
        match self {
            TimerEvent::Started { name, .. }
            | TimerEvent::Paused { name, .. }
            | TimerEvent::Reset { name }
            | TimerEvent::Halfway { name, .. } => name,
            TimerEvent::Completed { record } => &record.name,
        }
    }

    /// Whether the event should be surfaced to the user as an alert
    pub fn is_alert(&self) -> bool {
        matches!(self, TimerEvent::Halfway { .. } | TimerEvent::Completed { .. })
    }
}
