//! Helpers for the host binary: shutdown signals and human-readable times.

pub mod format;
pub mod signals;

pub use format::{format_completion_time, format_seconds};
pub use signals::shutdown_signal;
