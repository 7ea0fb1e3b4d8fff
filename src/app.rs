/*
Shared engine state for the widget host.

All engine state sits behind a single mutex. Handlers and background loops
take the lock for a whole read-modify-write, so saves always reflect the
latest load. Timer callbacks never take the lock; they hand the fired tasks
to run_reminder_loop over a channel.
*/

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as TimeDelta;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::board::Board;
use crate::clock::TimeService;
use crate::config::WidgetConfig;
use crate::error::ValidationError;
use crate::models::{Task, TaskInput, TaskStatus};
use crate::notify::{NotificationScheduler, Reminder, ReminderInbox, ScheduledReminder, TimerSlot, TokioTimer};
use crate::store::{JsonFileBackend, TaskBackend};
use crate::tasks::TaskStore;

pub type FiredReceiver = mpsc::UnboundedReceiver<Vec<Task>>;

pub struct Engine<T: TimerSlot = TokioTimer> {
    pub store: TaskStore,
    pub scheduler: NotificationScheduler<T>,
    pub inbox: ReminderInbox,
    fired_tx: mpsc::UnboundedSender<Vec<Task>>,
    upcoming_count: usize,
    reminder_timeout: TimeDelta,
}

impl<T: TimerSlot> Engine<T> {
    pub fn new(store: TaskStore, timer: T) -> (Self, FiredReceiver) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let reminder_timeout = store.expiry_grace();
        let engine = Self {
            store,
            scheduler: NotificationScheduler::new(timer),
            inbox: ReminderInbox::new(),
            fired_tx,
            upcoming_count: 5,
            reminder_timeout,
        };
        (engine, fired_rx)
    }

    pub fn with_upcoming_count(mut self, count: usize) -> Self {
        self.upcoming_count = count;
        self
    }

    pub fn with_reminder_timeout(mut self, timeout: TimeDelta) -> Self {
        self.reminder_timeout = timeout;
        self
    }

    pub fn time(&self) -> &TimeService {
        self.store.time()
    }

    pub fn upcoming_count(&self) -> usize {
        self.upcoming_count
    }

    // Arm the timer for the next reminder.
    pub fn rearm(&mut self) -> Option<ScheduledReminder> {
        let on_fire = forward_fired(self.fired_tx.clone());
        self.scheduler.schedule_next(&mut self.store, on_fire)
    }

    // Full refresh: sweep, re-arm and build every list.
    pub fn board(&mut self) -> Board {
        let on_fire = forward_fired(self.fired_tx.clone());
        Board::build(&mut self.store, &mut self.scheduler, self.upcoming_count, on_fire)
    }

    pub fn create_task(&mut self, input: &TaskInput) -> Result<Task, ValidationError> {
        let task = self.store.create_task(input)?;
        self.rearm();
        Ok(task)
    }

    pub fn delete_task(&mut self, id: Uuid) -> usize {
        let removed = self.store.delete_task(id);
        self.inbox.take(id);
        self.rearm();
        removed
    }

    // Pull a task back into the form; its reminder goes with it.
    pub fn edit_task(&mut self, id: Uuid) -> Option<TaskInput> {
        let form = self.store.edit_task(id)?;
        self.inbox.take(id);
        self.rearm();
        Some(form)
    }

    pub fn change_task_status(&mut self, id: Uuid, status: TaskStatus) -> Option<Task> {
        let updated = self.store.change_task_status(id, status);
        if updated.is_some() && status.is_terminal() {
            self.inbox.take(id);
        }
        self.rearm();
        updated
    }

    // Periodic housekeeping: drop reminders that have been on screen long
    // enough, expire overdue tasks and re-arm.
    pub fn sweep(&mut self) -> Vec<Task> {
        let now_ms = self.time().now_ms();
        let stale = self
            .inbox
            .drain_stale(now_ms, self.reminder_timeout.num_milliseconds());
        if !stale.is_empty() {
            debug!(count = stale.len(), "reminders timed out");
        }

        let expired = self.store.check_for_expired_tasks();
        if !expired.is_empty() {
            info!(count = expired.len(), "tasks expired");
        }
        self.rearm();
        expired
    }

    // Put fired tasks on screen and arm the following reminder.
    pub fn deliver(&mut self, tasks: Vec<Task>) -> usize {
        let now_ms = self.time().now_ms();
        let added = self.inbox.push(tasks, now_ms);
        self.rearm();
        added
    }

    pub fn reminders(&self) -> &[Reminder] {
        self.inbox.pending()
    }

    // Acknowledge a reminder by completing its task.
    pub fn complete_reminder(&mut self, id: Uuid) -> Option<Task> {
        self.acknowledge(id, TaskStatus::Completed)
    }

    // Close a reminder without doing the task; the task expires.
    pub fn dismiss_reminder(&mut self, id: Uuid) -> Option<Task> {
        self.acknowledge(id, TaskStatus::Expired)
    }

    fn acknowledge(&mut self, id: Uuid, status: TaskStatus) -> Option<Task> {
        self.inbox.take(id)?;
        self.change_task_status(id, status)
    }
}

// Timer callback: hand the fired set to the reminder loop
fn forward_fired(tx: mpsc::UnboundedSender<Vec<Task>>) -> impl FnOnce(Vec<Task>) + Send + 'static {
    move |tasks| {
        if tx.send(tasks).is_err() {
            warn!("reminder fired after the reminder loop stopped");
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<Engine>>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    // Build the engine described by `config` on the JSON file backend.
    //
    // Must be called inside a tokio runtime; the reminder timer runs on it.
    pub fn from_config(config: &WidgetConfig, time: TimeService) -> (Self, FiredReceiver) {
        let backend: Box<dyn TaskBackend> = Box::new(JsonFileBackend::new(&config.data_dir));
        let grace = config.expiry.grace(time.now().instant);
        let store = TaskStore::new(backend, config.storage_key.clone(), time).with_expiry_grace(grace);
        let timer = TokioTimer::new(tokio::runtime::Handle::current());

        let (engine, fired_rx) = Engine::new(store, timer);
        let engine = engine
            .with_upcoming_count(config.upcoming_count)
            .with_reminder_timeout(config.reminder_timeout(grace));
        info!(
            data_dir = %config.data_dir.display(),
            key = %config.storage_key,
            grace_ms = grace.num_milliseconds(),
            "engine ready"
        );
        (Self::new(engine), fired_rx)
    }
}

// Deliver fired reminders until every sender is gone.
pub async fn run_reminder_loop(state: AppState, mut fired_rx: FiredReceiver) {
    while let Some(tasks) = fired_rx.recv().await {
        let added = state.engine.lock().deliver(tasks);
        debug!(added, "reminders delivered");
    }
}

// Sweep on a fixed interval, forever.
pub async fn run_sweep_loop(state: AppState, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        state.engine.lock().sweep();
    }
}
