//! Background tasks module
//!
//! This module contains the per-timer countdown tasks that run while timers
//! are counting down.

pub mod countdown;

// Re-export main types
pub use countdown::CountdownRegistry;
