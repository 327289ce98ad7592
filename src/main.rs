//! Countdown Timers - headless host for the timer board
//!
//! Opens the stored timers, keeps running countdowns ticking, and logs the
//! halfway and completion alerts until a shutdown signal arrives.

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use countdown_timers::{
    config::Config,
    state::{TimerBoard, TimerEvent},
    storage::{FileStore, TimerStorage},
    utils::{format_completion_time, format_seconds, shutdown_signal},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countdown_timers={}", config.log_level()))
        .init();

    let dir = config.storage_dir();
    let storage = TimerStorage::new(Arc::new(FileStore::new(&dir)));

    if config.export_history {
        match storage.export_history().await {
            Some(json) => println!("{}", json),
            None => println!("There are no completed timers to export."),
        }
        return Ok(());
    }

    info!("Starting countdown-timers v{}", env!("CARGO_PKG_VERSION"));
    info!("Storing timers in {}", dir.display());

    let board = TimerBoard::open(storage).await;
    for (category, timers) in board.grouped()? {
        info!("{}: {} timers", category, timers.len());
        for timer in timers {
            info!(
                "  {} [{}] {} remaining ({}% completed)",
                timer.name,
                timer.status,
                format_seconds(timer.remaining_time),
                timer.percent_complete()
            );
        }
    }

    let mut events = board.subscribe();
    let alerts = async {
        loop {
            match events.recv().await {
                Ok(TimerEvent::Halfway { name, remaining_time }) => {
                    info!(
                        "Halfway Alert: {} has reached the halfway mark ({} left)",
                        name,
                        format_seconds(remaining_time)
                    );
                }
                Ok(TimerEvent::Completed { record }) => {
                    info!(
                        "Timer Completed: {} has finished at {}",
                        record.name,
                        format_completion_time(record.completion_time)
                    );
                }
                Ok(event) => tracing::debug!("Timer event: {:?}", event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} timer events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    tokio::select! {
        _ = alerts => {}
        result = shutdown_signal() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for shutdown signals: {}", e);
            }
            info!("Shutdown signal received");
        }
    }

    board.detach();
    info!("Shutdown complete");
    Ok(())
}
