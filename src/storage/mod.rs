//! Persistence module
//!
//! This module holds the key-value backends and the adapter that stores the
//! active timers and the completion history on top of them.

pub mod kv;
pub mod timers;

// Re-export main types
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use timers::{TimerStorage, COMPLETED_TIMERS_KEY, TIMERS_KEY};
