//! Shared owner of the active timers

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::{CompletedTimerRecord, Timer, TimerAction, TimerDraft, TimerEvent};
use crate::{
    categories::{apply_to_category, group_by_category, CategoryGroups},
    error::BoardError,
    storage::TimerStorage,
    tasks::CountdownRegistry,
};

/// Capacity of the event channel before slow subscribers start lagging
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// In-memory active timers, their countdowns and their persistence.
///
/// Every mutation is written back through [`TimerStorage`] after the lock on
/// the collection has been released, and announced on the event channel.
#[derive(Debug)]
pub struct TimerBoard {
    timers: Mutex<Vec<Timer>>,
    storage: TimerStorage,
    countdowns: CountdownRegistry,
    event_tx: broadcast::Sender<TimerEvent>,
}

impl TimerBoard {
    /// Load the stored timers and resume the countdown of every timer that
    /// was running when it was last saved.
    pub async fn open(storage: TimerStorage) -> Arc<Self> {
        let timers = storage.load_timers().await;
        info!("Loaded {} timers", timers.len());

        let board = Arc::new(Self::with_timers(storage, timers));
        board.attach();
        board
    }

    fn with_timers(storage: TimerStorage, timers: Vec<Timer>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            timers: Mutex::new(timers),
            storage,
            countdowns: CountdownRegistry::new(),
            event_tx,
        }
    }

    /// Spawn a countdown for every running timer that has none, e.g. after
    /// [`detach`](Self::detach). Returns how many were started.
    pub fn attach(self: &Arc<Self>) -> usize {
        let running: Vec<(String, u64)> = match self.lock_timers() {
            Ok(timers) => timers
                .iter()
                .filter(|t| t.is_running())
                .map(|t| (t.name.clone(), t.run()))
                .collect(),
            Err(e) => {
                error!("Failed to resume countdowns: {}", e);
                return 0;
            }
        };

        let mut resumed = 0;
        for (name, run) in running {
            if self.countdowns.is_active(&name) {
                continue;
            }
            info!("Resuming countdown for {}", name);
            self.countdowns.spawn(Arc::clone(self), &name, run);
            resumed += 1;
        }
        resumed
    }

    /// Subscribe to timer events
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.event_tx.subscribe()
    }

    /// Storage adapter the board writes through
    pub fn storage(&self) -> &TimerStorage {
        &self.storage
    }

    /// Snapshot of every active timer, in creation order
    pub fn timers(&self) -> Result<Vec<Timer>, BoardError> {
        Ok(self.lock_timers()?.clone())
    }

    /// Snapshot of one timer
    pub fn timer(&self, name: &str) -> Result<Timer, BoardError> {
        self.lock_timers()?
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| BoardError::UnknownTimer(name.to_string()))
    }

    /// Active timers grouped by category
    pub fn grouped(&self) -> Result<CategoryGroups, BoardError> {
        Ok(group_by_category(&self.lock_timers()?))
    }

    /// Whether a countdown task is running for `name`
    pub fn is_counting_down(&self, name: &str) -> bool {
        self.countdowns.is_active(name)
    }

    pub async fn history(&self) -> Vec<CompletedTimerRecord> {
        self.storage.load_history().await
    }

    /// Pretty-printed history for copy-out, `None` when nothing has completed
    pub async fn export_history(&self) -> Option<String> {
        self.storage.export_history().await
    }

    /// Create a timer from form input.
    ///
    /// Incomplete or invalid drafts are ignored and yield `None`. A draft
    /// named like an existing timer replaces it.
    pub async fn add_timer(&self, draft: &TimerDraft) -> Result<Option<Timer>, BoardError> {
        let Some(timer) = draft.build() else {
            debug!("Ignoring incomplete timer draft {:?}", draft);
            return Ok(None);
        };

        {
            let mut timers = self.lock_timers()?;
            match timers.iter_mut().find(|t| t.name == timer.name) {
                Some(existing) => *existing = timer.clone(),
                None => timers.push(timer.clone()),
            }
        }

        self.countdowns.cancel(&timer.name);
        self.storage.save_timer(&timer).await;

        info!(
            "Added timer {} ({}s, {})",
            timer.name, timer.duration, timer.category
        );
        Ok(Some(timer))
    }

    /// Start or resume `name`. `None` when it was already running or completed.
    pub async fn start(self: &Arc<Self>, name: &str) -> Result<Option<TimerEvent>, BoardError> {
        self.transition(name, TimerAction::Start).await
    }

    /// Pause `name`. `None` when it was not running.
    pub async fn pause(self: &Arc<Self>, name: &str) -> Result<Option<TimerEvent>, BoardError> {
        self.transition(name, TimerAction::Pause).await
    }

    /// Reset `name` to its full duration
    pub async fn reset(self: &Arc<Self>, name: &str) -> Result<Option<TimerEvent>, BoardError> {
        self.transition(name, TimerAction::Reset).await
    }

    /// Apply `action` to every timer in `category` and return the whole
    /// updated collection.
    pub async fn bulk_action(
        self: &Arc<Self>,
        category: &str,
        action: TimerAction,
    ) -> Result<Vec<Timer>, BoardError> {
        let (changes, all) = {
            let mut timers = self.lock_timers()?;
            let events = apply_to_category(&mut timers, category, action, Utc::now());
            let changes: Vec<(Timer, TimerEvent)> = events
                .into_iter()
                .map(|(index, event)| (timers[index].clone(), event))
                .collect();
            (changes, timers.clone())
        };

        info!(
            "Bulk {:?} on {} changed {} timers",
            action,
            category,
            changes.len()
        );

        for (timer, event) in &changes {
            self.settle(timer, event).await;
        }

        if action == TimerAction::Start {
            for timer in all.iter().filter(|t| t.category == category && t.is_running()) {
                if !self.countdowns.is_active(&timer.name) {
                    info!("Resuming countdown for {}", timer.name);
                    self.countdowns.spawn(Arc::clone(self), &timer.name, timer.run());
                }
            }
        }

        let affected: Vec<Timer> = changes.iter().map(|(timer, _)| timer.clone()).collect();
        self.storage.save_timers(&affected).await;

        for (_, event) in changes {
            self.publish(event);
        }

        Ok(all)
    }

    /// Cancel every countdown without touching timer state, e.g. when the
    /// view that drives the board goes away. Returns how many were stopped.
    pub fn detach(&self) -> usize {
        let stopped = self.countdowns.cancel_all();
        info!("Detached {} countdowns", stopped);
        stopped
    }

    /// Advance run `run` of `name` by one second. Returns `false` once the
    /// countdown should stop.
    pub(crate) async fn tick(self: &Arc<Self>, name: &str, run: u64) -> bool {
        let (event, snapshot) = {
            let mut timers = match self.lock_timers() {
                Ok(timers) => timers,
                Err(e) => {
                    error!("Failed to tick {}: {}", name, e);
                    return false;
                }
            };
            let Some(timer) = timers.iter_mut().find(|t| t.name == name) else {
                warn!("Countdown running for unknown timer {}", name);
                return false;
            };
            if timer.run() != run || !timer.is_running() {
                return false;
            }
            (timer.tick(Utc::now()), timer.clone())
        };

        let Some(event) = event else {
            return true;
        };

        let finished = matches!(event, TimerEvent::Completed { .. });
        if finished {
            info!("Timer {} completed", name);
            self.settle(&snapshot, &event).await;
            self.storage.save_timer(&snapshot).await;
        } else {
            info!("Timer {} reached the halfway mark", name);
        }

        self.publish(event);
        !finished
    }

    async fn transition(
        self: &Arc<Self>,
        name: &str,
        action: TimerAction,
    ) -> Result<Option<TimerEvent>, BoardError> {
        let (event, snapshot) = {
            let mut timers = self.lock_timers()?;
            let timer = timers
                .iter_mut()
                .find(|t| t.name == name)
                .ok_or_else(|| BoardError::UnknownTimer(name.to_string()))?;
            (timer.apply(action, Utc::now()), timer.clone())
        };

        let Some(event) = event else {
            // A running timer whose countdown was detached picks it back up
            if action == TimerAction::Start
                && snapshot.is_running()
                && !self.countdowns.is_active(name)
            {
                info!("Resuming countdown for {}", name);
                self.countdowns.spawn(Arc::clone(self), name, snapshot.run());
            } else {
                debug!("{:?} on {} had no effect ({})", action, name, snapshot.status);
            }
            return Ok(None);
        };

        self.settle(&snapshot, &event).await;
        self.storage.save_timer(&snapshot).await;
        self.publish(event.clone());
        Ok(Some(event))
    }

    /// Bring countdowns and history in line with a transition of `timer`
    async fn settle(self: &Arc<Self>, timer: &Timer, event: &TimerEvent) {
        match event {
            TimerEvent::Started { .. } => {
                self.countdowns.spawn(Arc::clone(self), &timer.name, timer.run());
            }
            TimerEvent::Paused { .. } | TimerEvent::Reset { .. } => {
                self.countdowns.cancel(&timer.name);
            }
            TimerEvent::Completed { record } => {
                self.countdowns.finish(&timer.name, timer.run());
                self.storage.append_history(record.clone()).await;
            }
            TimerEvent::Halfway { .. } => {}
        }
    }

    fn publish(&self, event: TimerEvent) {
        if let Err(e) = self.event_tx.send(event) {
            debug!("No subscribers for timer event: {:?}", e.0);
        }
    }

    fn lock_timers(&self) -> Result<MutexGuard<'_, Vec<Timer>>, BoardError> {
        self.timers.lock().map_err(|_| BoardError::Poisoned("timers"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        state::TimerStatus,
        storage::{KeyValueStore, MemoryStore, TIMERS_KEY},
    };
    use std::time::Duration;
    use tokio::time::sleep;

    async fn board_with(timers: &[Timer]) -> (TimerStorage, Arc<TimerBoard>) {
        let storage = TimerStorage::new(Arc::new(MemoryStore::new()));
        storage.save_timers(timers).await;
        let board = TimerBoard::open(storage.clone()).await;
        (storage, board)
    }

    fn drain(rx: &mut broadcast::Receiver<TimerEvent>) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_completes_and_records_history() {
        let (storage, board) = board_with(&[Timer::new("Read", 10, "Study")]).await;
        let mut rx = board.subscribe();

        board.start("Read").await.unwrap();
        assert!(board.is_counting_down("Read"));

        sleep(Duration::from_millis(5_500)).await;
        assert_eq!(board.timer("Read").unwrap().remaining_time, 5);

        sleep(Duration::from_secs(10)).await;
        let timer = board.timer("Read").unwrap();
        assert_eq!(timer.status, TimerStatus::Completed);
        assert_eq!(timer.remaining_time, 0);
        assert!(!board.is_counting_down("Read"));

        let events = drain(&mut rx);
        assert!(matches!(events[0], TimerEvent::Started { .. }));
        assert_eq!(
            events[1],
            TimerEvent::Halfway {
                name: "Read".to_string(),
                remaining_time: 5
            }
        );
        assert!(matches!(events[2], TimerEvent::Completed { .. }));
        assert_eq!(events.len(), 3);

        let history = storage.load_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].name, "Read");
        assert_eq!(storage.load_timers().await[0].status, TimerStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_the_countdown() {
        let (storage, board) = board_with(&[Timer::new("Read", 10, "Study")]).await;

        board.start("Read").await.unwrap();
        sleep(Duration::from_millis(3_500)).await;
        board.pause("Read").await.unwrap();
        assert!(!board.is_counting_down("Read"));

        sleep(Duration::from_secs(20)).await;
        let timer = board.timer("Read").unwrap();
        assert_eq!(timer.status, TimerStatus::Paused);
        assert_eq!(timer.remaining_time, 7);

        let stored = storage.load_timers().await;
        assert_eq!(stored[0].remaining_time, 7);
        assert!(storage.load_history().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn toggling_before_halfway_notifies_once() {
        let (_, board) = board_with(&[Timer::new("Read", 10, "Study")]).await;
        let mut rx = board.subscribe();

        board.start("Read").await.unwrap();
        for _ in 0..3 {
            sleep(Duration::from_millis(1_500)).await;
            board.pause("Read").await.unwrap();
            board.start("Read").await.unwrap();
        }
        sleep(Duration::from_secs(20)).await;

        let events = drain(&mut rx);
        let halfway = events
            .iter()
            .filter(|e| matches!(e, TimerEvent::Halfway { .. }))
            .count();
        let completed = events
            .iter()
            .filter(|e| matches!(e, TimerEvent::Completed { .. }))
            .count();
        assert_eq!(halfway, 1);
        assert_eq!(completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_and_restores_duration() {
        let (_, board) = board_with(&[Timer::new("Read", 10, "Study")]).await;

        board.start("Read").await.unwrap();
        sleep(Duration::from_millis(2_500)).await;
        let event = board.reset("Read").await.unwrap();
        assert_eq!(
            event,
            Some(TimerEvent::Reset {
                name: "Read".to_string()
            })
        );

        sleep(Duration::from_secs(5)).await;
        let timer = board.timer("Read").unwrap();
        assert_eq!(timer.status, TimerStatus::Paused);
        assert_eq!(timer.remaining_time, 10);
        assert!(!board.is_counting_down("Read"));
    }

    #[tokio::test]
    async fn start_twice_is_a_no_op() {
        let (_, board) = board_with(&[Timer::new("Read", 10, "Study")]).await;
        assert!(board.start("Read").await.unwrap().is_some());
        assert_eq!(board.start("Read").await.unwrap(), None);
        board.detach();
    }

    #[tokio::test]
    async fn unknown_timer_is_an_error() {
        let (_, board) = board_with(&[]).await;
        assert!(matches!(
            board.start("Ghost").await,
            Err(BoardError::UnknownTimer(name)) if name == "Ghost"
        ));
    }

    #[tokio::test]
    async fn zero_duration_completes_on_start() {
        let (storage, board) = board_with(&[Timer::new("Instant", 0, "Break")]).await;

        let event = board.start("Instant").await.unwrap();
        assert!(matches!(event, Some(TimerEvent::Completed { .. })));
        assert!(!board.is_counting_down("Instant"));
        assert_eq!(storage.load_history().await.len(), 1);
    }

    #[tokio::test]
    async fn invalid_draft_creates_nothing() {
        let (storage, board) = board_with(&[]).await;

        let added = board
            .add_timer(&TimerDraft::new("Read", "abc", "Study"))
            .await
            .unwrap();
        assert_eq!(added, None);
        assert!(board.timers().unwrap().is_empty());
        assert!(storage.load_timers().await.is_empty());
    }

    #[tokio::test]
    async fn add_timer_persists_and_upserts() {
        let (storage, board) = board_with(&[]).await;

        board
            .add_timer(&TimerDraft::new("Read", "60", "Study"))
            .await
            .unwrap();
        board
            .add_timer(&TimerDraft::new("Read", "90", "Study"))
            .await
            .unwrap();

        assert_eq!(board.timers().unwrap(), vec![Timer::new("Read", 90, "Study")]);
        assert_eq!(storage.load_timers().await, vec![Timer::new("Read", 90, "Study")]);
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_start_runs_only_the_category() {
        let (storage, board) = board_with(&[
            Timer::new("A", 10, "Study"),
            Timer::new("B", 10, "Break"),
        ])
        .await;

        let updated = board.bulk_action("Study", TimerAction::Start).await.unwrap();
        assert_eq!(updated[0].status, TimerStatus::Running);
        assert_eq!(updated[1].status, TimerStatus::Paused);
        assert!(board.is_counting_down("A"));
        assert!(!board.is_counting_down("B"));

        let stored = storage.load_timers().await;
        assert_eq!(stored[0].status, TimerStatus::Running);
        assert_eq!(stored[1].status, TimerStatus::Paused);

        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(board.timer("A").unwrap().remaining_time, 8);
        assert_eq!(board.timer("B").unwrap().remaining_time, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_pause_and_reset_cancel_countdowns() {
        let (_, board) = board_with(&[
            Timer::new("A", 10, "Study"),
            Timer::new("C", 20, "Study"),
        ])
        .await;

        board.bulk_action("Study", TimerAction::Start).await.unwrap();
        sleep(Duration::from_millis(1_500)).await;

        let paused = board.bulk_action("Study", TimerAction::Pause).await.unwrap();
        assert!(paused.iter().all(|t| t.status == TimerStatus::Paused));
        assert_eq!(paused[0].remaining_time, 9);
        assert!(!board.is_counting_down("A"));
        assert!(!board.is_counting_down("C"));

        let reset = board.bulk_action("Study", TimerAction::Reset).await.unwrap();
        assert_eq!(reset[0].remaining_time, 10);
        assert_eq!(reset[1].remaining_time, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn running_timers_resume_on_open() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_item(
                TIMERS_KEY,
                r#"[{"name":"A","duration":10,"category":"Study","status":"Running","remainingTime":3}]"#
                    .to_string(),
            )
            .await
            .unwrap();

        let storage = TimerStorage::new(store);
        let board = TimerBoard::open(storage.clone()).await;
        assert!(board.is_counting_down("A"));

        sleep(Duration::from_millis(3_500)).await;
        assert_eq!(board.timer("A").unwrap().status, TimerStatus::Completed);
        assert_eq!(storage.load_history().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn detach_stops_countdowns_but_keeps_status() {
        let (_, board) = board_with(&[Timer::new("A", 10, "Study")]).await;
        board.start("A").await.unwrap();

        assert_eq!(board.detach(), 1);
        sleep(Duration::from_secs(3)).await;

        let timer = board.timer("A").unwrap();
        assert_eq!(timer.status, TimerStatus::Running);
        assert_eq!(timer.remaining_time, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn start_after_detach_resumes_the_countdown() {
        let (storage, board) = board_with(&[Timer::new("A", 10, "Study")]).await;
        board.start("A").await.unwrap();
        board.detach();

        assert_eq!(board.start("A").await.unwrap(), None);
        assert!(board.is_counting_down("A"));

        sleep(Duration::from_secs(30)).await;
        assert_eq!(board.timer("A").unwrap().status, TimerStatus::Completed);
        assert_eq!(storage.load_history().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_start_resumes_detached_timers() {
        let (_, board) = board_with(&[
            Timer::new("A", 10, "Study"),
            Timer::new("B", 10, "Break"),
        ])
        .await;
        board.start("A").await.unwrap();
        board.start("B").await.unwrap();
        board.detach();

        board.bulk_action("Study", TimerAction::Start).await.unwrap();
        assert!(board.is_counting_down("A"));
        assert!(!board.is_counting_down("B"));
        board.detach();
    }

    #[tokio::test(start_paused = true)]
    async fn attach_restarts_detached_countdowns_once() {
        let (storage, board) = board_with(&[
            Timer::new("A", 10, "Study"),
            Timer::new("B", 5, "Break"),
        ])
        .await;
        board.start("A").await.unwrap();
        board.detach();

        assert_eq!(board.attach(), 1);
        assert_eq!(board.attach(), 0);
        assert!(board.is_counting_down("A"));
        assert!(!board.is_counting_down("B"));

        sleep(Duration::from_secs(30)).await;
        assert_eq!(board.timer("A").unwrap().status, TimerStatus::Completed);
        assert_eq!(storage.load_history().await.len(), 1);
    }

    #[tokio::test]
    async fn grouped_follows_first_appearance() {
        let (_, board) = board_with(&[
            Timer::new("A", 10, "Study"),
            Timer::new("B", 10, "Break"),
            Timer::new("C", 10, "Study"),
        ])
        .await;

        let groups = board.grouped().unwrap();
        let categories: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(categories, vec!["Study", "Break"]);
        assert_eq!(groups["Study"].len(), 2);
    }
}
