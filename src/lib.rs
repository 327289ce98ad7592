//! Countdown Timers - named countdown timers grouped by category
//!
//! This library provides the timer lifecycle (start, pause, reset, halfway
//! and completion notifications), grouping and bulk actions by category, and
//! best-effort persistence of the active timers and the completion history.

pub mod categories;
pub mod config;
pub mod error;
pub mod state;
pub mod storage;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use categories::{bulk_action, group_by_category, CategoryGroups, CollapsedCategories};
pub use config::Config;
pub use error::{BoardError, StorageError};
pub use state::{
    CompletedTimerRecord, Timer, TimerAction, TimerBoard, TimerDraft, TimerEvent, TimerStatus,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore, TimerStorage};
pub use utils::signals::shutdown_signal;
