//! State management module
//!
//! This module contains the timer entity, its lifecycle events, the
//! completion history record, and the board that owns the active timers.

pub mod board;
pub mod events;
pub mod history;
pub mod timer;

// Re-export main types
pub use board::TimerBoard;
pub use events::TimerEvent;
pub use history::CompletedTimerRecord;
pub use timer::{Timer, TimerAction, TimerDraft, TimerStatus, DEFAULT_CATEGORIES};
