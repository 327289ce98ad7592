//! Timer entity and its countdown lifecycle
//!
//! A timer moves between three states:
//!
//! ```text
//! Paused --start--> Running --tick (remaining hits 0)--> Completed
//!   ^                  |                                     |
//!   +------pause-------+                                     |
//!   +------------------------reset---------------------------+
//! ```
//!
//! The entity holds no clock of its own. The owner calls [`Timer::tick`] once
//! per elapsed second while the timer is running.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CompletedTimerRecord, TimerEvent};

/// Categories offered when creating a timer. Grouping accepts any string.
pub const DEFAULT_CATEGORIES: [&str; 3] = ["Workout", "Study", "Break"];

/// Lifecycle status of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerStatus {
    Paused,
    Running,
    Completed,
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimerStatus::Paused => "Paused",
            TimerStatus::Running => "Running",
            TimerStatus::Completed => "Completed",
        };
        f.write_str(label)
    }
}

/// Lifecycle action that can be applied to one timer or a whole category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerAction {
    Start,
    Pause,
    Reset,
}

impl FromStr for TimerAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(TimerAction::Start),
            "pause" => Ok(TimerAction::Pause),
            "reset" => Ok(TimerAction::Reset),
            other => Err(format!("unknown timer action: {}", other)),
        }
    }
}

/// A named countdown timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub name: String,
    /// Total seconds of a fresh run
    pub duration: u64,
    pub category: String,
    pub status: TimerStatus,
    /// Seconds left in the current run, within `0..=duration`
    pub remaining_time: u64,
    #[serde(skip)]
    halfway_notified: bool,
    #[serde(skip)]
    run: u64,
}

impl Timer {
    /// Create a paused timer with its full duration remaining
    pub fn new(name: impl Into<String>, duration: u64, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration,
            category: category.into(),
            status: TimerStatus::Paused,
            remaining_time: duration,
            halfway_notified: false,
            run: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn is_completed(&self) -> bool {
        self.status == TimerStatus::Completed
    }

    /// Generation of the current run, bumped on every successful start
    pub fn run(&self) -> u64 {
        self.run
    }

    /// Remaining time at which the halfway notification fires
    pub fn halfway_mark(&self) -> u64 {
        self.duration / 2
    }

    /// Fraction of the duration already elapsed, in `0.0..=1.0`
    pub fn progress(&self) -> f64 {
        if self.duration == 0 {
            return if self.is_completed() { 1.0 } else { 0.0 };
        }
        1.0 - (self.remaining_time as f64 / self.duration as f64)
    }

    /// Elapsed share of the duration as a rounded percentage
    pub fn percent_complete(&self) -> u8 {
        (self.progress() * 100.0).round().clamp(0.0, 100.0) as u8
    }

    /// Begin or resume the countdown.
    ///
    /// Returns `None` when the timer is already running or has completed.
    /// A timer with nothing left to count completes on the spot.
    pub fn start(&mut self, now: DateTime<Utc>) -> Option<TimerEvent> {
        if self.status != TimerStatus::Paused {
            return None;
        }

        self.status = TimerStatus::Running;
        self.halfway_notified = false;
        self.run = self.run.wrapping_add(1);

        if self.remaining_time == 0 {
            return Some(self.complete(now));
        }

        Some(TimerEvent::Started {
            name: self.name.clone(),
            remaining_time: self.remaining_time,
        })
    }

    /// Suspend a running countdown, keeping the remaining time
    pub fn pause(&mut self) -> Option<TimerEvent> {
        if self.status != TimerStatus::Running {
            return None;
        }

        self.status = TimerStatus::Paused;
        Some(TimerEvent::Paused {
            name: self.name.clone(),
            remaining_time: self.remaining_time,
        })
    }

    /// Return to a paused timer with the full duration. Valid in any state.
    pub fn reset(&mut self) -> TimerEvent {
        self.status = TimerStatus::Paused;
        self.remaining_time = self.duration;
        self.halfway_notified = false;
        TimerEvent::Reset {
            name: self.name.clone(),
        }
    }

    /// Apply `action` with the semantics of [`start`](Self::start),
    /// [`pause`](Self::pause) or [`reset`](Self::reset).
    pub fn apply(&mut self, action: TimerAction, now: DateTime<Utc>) -> Option<TimerEvent> {
        match action {
            TimerAction::Start => self.start(now),
            TimerAction::Pause => self.pause(),
            TimerAction::Reset => Some(self.reset()),
        }
    }

    /// Count down one second.
    ///
    /// Yields [`TimerEvent::Halfway`] the first time the remaining time
    /// reaches the halfway mark in this run, and [`TimerEvent::Completed`]
    /// when it reaches zero. Ticks on a timer that is not running are ignored.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<TimerEvent> {
        if self.status != TimerStatus::Running {
            return None;
        }

        if self.remaining_time <= 1 {
            return Some(self.complete(now));
        }

        let previous = self.remaining_time;
        self.remaining_time -= 1;

        let mark = self.halfway_mark();
        if !self.halfway_notified && previous > mark && self.remaining_time <= mark {
            self.halfway_notified = true;
            return Some(TimerEvent::Halfway {
                name: self.name.clone(),
                remaining_time: self.remaining_time,
            });
        }

        None
    }

    /// Clamp a loaded timer back into its invariants
    pub(crate) fn normalized(mut self) -> Self {
        self.remaining_time = self.remaining_time.min(self.duration);
        match self.status {
            TimerStatus::Completed => self.remaining_time = 0,
            // Only a completed timer may sit at zero
            TimerStatus::Paused if self.remaining_time == 0 => {
                self.remaining_time = self.duration;
            }
            _ => {}
        }
        self
    }

    fn complete(&mut self, now: DateTime<Utc>) -> TimerEvent {
        self.remaining_time = 0;
        self.status = TimerStatus::Completed;
        TimerEvent::Completed {
            record: CompletedTimerRecord::new(self.name.clone(), now),
        }
    }
}

/// Raw input for a new timer, as typed into a creation form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerDraft {
    pub name: String,
    pub duration: String,
    pub category: String,
}

impl TimerDraft {
    pub fn new(
        name: impl Into<String>,
        duration: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            duration: duration.into(),
            category: category.into(),
        }
    }

    /// Build a paused timer, or `None` when a field is empty or the duration
    /// is not a positive whole number of seconds.
    pub fn build(&self) -> Option<Timer> {
        let name = self.name.trim();
        let category = self.category.trim();
        if name.is_empty() || category.is_empty() {
            return None;
        }

        let duration = self.duration.trim().parse::<u64>().ok().filter(|d| *d > 0)?;
        Some(Timer::new(name, duration, category))
    }
}
