//! Per-timer countdown tasks
//!
//! Each running timer owns one task that ticks once per second until the
//! timer completes or the task is cancelled. Tasks are keyed by timer name;
//! starting a new countdown for a name cancels the previous one.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info};

use crate::state::TimerBoard;

/// Interval between countdown ticks
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Countdown {
    run: u64,
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Live countdown tasks keyed by timer name
#[derive(Debug, Default)]
pub struct CountdownRegistry {
    tasks: Mutex<HashMap<String, Countdown>>,
}

impl CountdownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the countdown for run `run` of timer `name`, replacing any
    /// countdown already registered for that name.
    pub fn spawn(&self, board: Arc<TimerBoard>, name: &str, run: u64) {
        let (cancel, cancel_rx) = oneshot::channel();
        let task_name = name.to_string();
        let handle = tokio::spawn(async move {
            countdown_task(board, task_name, run, cancel_rx).await;
        });

        let previous = match self.tasks.lock() {
            Ok(mut tasks) => tasks.insert(name.to_string(), Countdown { run, cancel, handle }),
            Err(e) => {
                error!("Failed to lock countdown registry: {}", e);
                handle.abort();
                return;
            }
        };

        if let Some(previous) = previous {
            debug!("Replacing countdown for {} (run {})", name, previous.run);
            let _ = previous.cancel.send(());
        }
    }

    /// Stop the countdown for `name`. Returns whether one was running.
    pub fn cancel(&self, name: &str) -> bool {
        let removed = match self.tasks.lock() {
            Ok(mut tasks) => tasks.remove(name),
            Err(e) => {
                error!("Failed to lock countdown registry: {}", e);
                None
            }
        };

        match removed {
            Some(countdown) => {
                debug!("Cancelling countdown for {} (run {})", name, countdown.run);
                let _ = countdown.cancel.send(());
                true
            }
            None => false,
        }
    }

    /// Drop the registration of a countdown that ended on its own, leaving a
    /// newer run of the same timer untouched.
    pub(crate) fn finish(&self, name: &str, run: u64) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if tasks.get(name).is_some_and(|c| c.run == run) {
                tasks.remove(name);
            }
        }
    }

    /// Stop every countdown, returning how many were running
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(String, Countdown)> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain().collect(),
            Err(e) => {
                error!("Failed to lock countdown registry: {}", e);
                return 0;
            }
        };

        let count = drained.len();
        for (name, countdown) in drained {
            debug!("Cancelling countdown for {}", name);
            let _ = countdown.cancel.send(());
        }
        count
    }

    /// Whether a countdown task is registered for `name`
    pub fn is_active(&self, name: &str) -> bool {
        self.tasks
            .lock()
            .map(|tasks| tasks.get(name).is_some_and(|c| !c.handle.is_finished()))
            .unwrap_or(false)
    }

    /// Number of registered countdowns
    pub fn len(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tick `name` once per [`TICK_PERIOD`] until the board says the run is over
/// or the countdown is cancelled.
async fn countdown_task(
    board: Arc<TimerBoard>,
    name: String,
    run: u64,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    info!("Starting countdown for {} (run {})", name, run);

    let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        tokio::select! {
            biased;

            // Cancelled, or the registry dropped us
            _ = &mut cancel_rx => {
                debug!("Countdown for {} (run {}) cancelled", name, run);
                break;
            }

            _ = interval.tick() => {
                if !board.tick(&name, run).await {
                    debug!("Countdown for {} (run {}) finished", name, run);
                    break;
                }
            }
        }
    }
}
