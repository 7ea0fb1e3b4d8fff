/*
Reminder scheduling.

NotificationScheduler keeps at most one timer armed, for the earliest
reminder that has not fired yet. Nothing re-arms it automatically: callers
call NotificationScheduler::schedule_next again after every change that
could move the next reminder (create, delete, status change, expiry sweep).
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::Task;
use crate::tasks::TaskStore;

// Work run when a timer elapses.
pub type FireCallback = Box<dyn FnOnce() + Send + 'static>;

// A timer with room for exactly one pending callback.
pub trait TimerSlot: Send {
    // Run `callback` after `delay`. A zero delay fires as soon as possible.
    fn arm(&mut self, delay: Duration, callback: FireCallback);

    // Drop the pending callback, if any.
    fn cancel(&mut self);

    fn is_armed(&self) -> bool;
}

// Tokio-backed timer: a spawned sleep, cancelled by aborting the task
pub struct TokioTimer {
    runtime: tokio::runtime::Handle,
    pending: Option<tokio::task::JoinHandle<()>>,
}

impl TokioTimer {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self {
            runtime,
            pending: None,
        }
    }
}

impl TimerSlot for TokioTimer {
    fn arm(&mut self, delay: Duration, callback: FireCallback) {
        self.cancel();
        self.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        }));
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    fn is_armed(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// Timer that only fires when told to. Records what it was asked to do.
#[derive(Default)]
pub struct ManualTimer {
    pending: Option<(Duration, FireCallback)>,
    armed_count: usize,
    cancelled_count: usize,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_delay(&self) -> Option<Duration> {
        self.pending.as_ref().map(|(delay, _)| *delay)
    }

    // Run the pending callback now; false if nothing was armed
    pub fn fire(&mut self) -> bool {
        match self.pending.take() {
            Some((_, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }

    pub fn armed_count(&self) -> usize {
        self.armed_count
    }

    // Pending callbacks that were dropped without firing
    pub fn cancelled_count(&self) -> usize {
        self.cancelled_count
    }
}

impl TimerSlot for ManualTimer {
    fn arm(&mut self, delay: Duration, callback: FireCallback) {
        self.cancel();
        self.pending = Some((delay, callback));
        self.armed_count += 1;
    }

    fn cancel(&mut self) {
        if self.pending.take().is_some() {
            self.cancelled_count += 1;
        }
    }

    fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

// What the scheduler armed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledReminder {
    pub fire_at_ms: i64,
    pub delay_ms: u64,
    pub task_ids: Vec<Uuid>,
}

pub struct NotificationScheduler<T: TimerSlot> {
    timer: T,
    // notification timestamp of the last set that fired, 0 before the first
    fired_through: Arc<AtomicI64>,
    armed: Option<ScheduledReminder>,
}

impl<T: TimerSlot> NotificationScheduler<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            fired_through: Arc::new(AtomicI64::new(0)),
            armed: None,
        }
    }

    // Cancel the pending reminder and arm one for the next due set.
    //
    // `on_fire` receives every task sharing the earliest reminder instant.
    // A reminder already in the past is armed with a zero delay. Returns
    // `None` when nothing is left to remind about.
    pub fn schedule_next<F>(&mut self, store: &mut TaskStore, on_fire: F) -> Option<ScheduledReminder>
    where
        F: FnOnce(Vec<Task>) + Send + 'static,
    {
        self.cancel();

        let tasks = match self.fired_through() {
            None => store.get_next_upcoming_notification(),
            Some(watermark) => store.next_notification_after(Some(watermark)),
        };
        let fire_at_ms = tasks.first()?.notification_timestamp;

        let now_ms = store.time().now_ms();
        let delay_ms = u64::try_from(fire_at_ms.saturating_sub(now_ms)).unwrap_or(0);
        let reminder = ScheduledReminder {
            fire_at_ms,
            delay_ms,
            task_ids: tasks.iter().map(|t| t.id).collect(),
        };

        let fired_through = Arc::clone(&self.fired_through);
        self.timer.arm(
            Duration::from_millis(delay_ms),
            Box::new(move || {
                fired_through.fetch_max(fire_at_ms, Ordering::SeqCst);
                info!(count = tasks.len(), fire_at_ms, "reminder fired");
                on_fire(tasks);
            }),
        );
        debug!(fire_at_ms, delay_ms, tasks = reminder.task_ids.len(), "reminder armed");

        self.armed = Some(reminder.clone());
        Some(reminder)
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
        self.armed = None;
    }

    // The reminder currently waiting to fire.
    pub fn armed(&self) -> Option<&ScheduledReminder> {
        self.armed.as_ref().filter(|_| self.timer.is_armed())
    }

    pub fn fired_through(&self) -> Option<i64> {
        match self.fired_through.load(Ordering::SeqCst) {
            0 => None,
            ts => Some(ts),
        }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}

// A fired reminder waiting to be acknowledged
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub task: Task,
    pub shown_at_ms: i64,
}

// On-screen reminders, oldest first. A task is only listed once at a time.
#[derive(Debug, Default)]
pub struct ReminderInbox {
    pending: Vec<Reminder>,
}

impl ReminderInbox {
    pub fn new() -> Self {
        Self::default()
    }

    // Queue fired tasks, skipping any already pending. Returns how many were added.
    pub fn push(&mut self, tasks: Vec<Task>, now_ms: i64) -> usize {
        let mut added = 0;
        for task in tasks {
            if self.contains(task.id) {
                continue;
            }
            self.pending.push(Reminder {
                task,
                shown_at_ms: now_ms,
            });
            added += 1;
        }
        added
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.pending.iter().any(|r| r.task.id == id)
    }

    pub fn pending(&self) -> &[Reminder] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn take(&mut self, id: Uuid) -> Option<Reminder> {
        let index = self.pending.iter().position(|r| r.task.id == id)?;
        Some(self.pending.remove(index))
    }

    // Drop reminders shown at least `timeout_ms` ago and return them.
    pub fn drain_stale(&mut self, now_ms: i64, timeout_ms: i64) -> Vec<Reminder> {
        let (stale, fresh): (Vec<Reminder>, Vec<Reminder>) = self
            .pending
            .drain(..)
            .partition(|r| now_ms.saturating_sub(r.shown_at_ms) >= timeout_ms);
        self.pending = fresh;
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, TimeService};
    use crate::models::{StatusFilter, TaskInput, TaskStatus};
    use crate::store::MemoryBackend;
    use crate::tasks::DEFAULT_STORAGE_KEY;
    use chrono::{FixedOffset, TimeZone};
    use parking_lot::Mutex;

    fn store() -> (Arc<FixedClock>, TaskStore) {
        let offset = FixedOffset::east_opt(0).unwrap();
        let clock = Arc::new(FixedClock::new(offset.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()));
        let store = TaskStore::new(
            Box::new(MemoryBackend::new()),
            DEFAULT_STORAGE_KEY,
            TimeService::new(clock.clone()),
        );
        (clock, store)
    }

    fn remind(store: &mut TaskStore, content: &str, time: &str, offset: u32) -> Task {
        store
            .create_task(&TaskInput {
                content: content.to_string(),
                due_date: Some("2026-10-18".to_string()),
                due_time: Some(time.to_string()),
                priority: 1,
                wants_notification: true,
                notification_offset_minutes: offset,
            })
            .unwrap()
    }

    fn collector() -> (Arc<Mutex<Vec<Vec<Uuid>>>>, impl Fn() -> Box<dyn FnOnce(Vec<Task>) + Send>) {
        let fired: Arc<Mutex<Vec<Vec<Uuid>>>> = Arc::default();
        let sink = Arc::clone(&fired);
        let make = move || {
            let sink = Arc::clone(&sink);
            Box::new(move |tasks: Vec<Task>| {
                sink.lock().push(tasks.iter().map(|t| t.id).collect());
            }) as Box<dyn FnOnce(Vec<Task>) + Send>
        };
        (fired, make)
    }

    #[test]
    fn arms_nothing_without_reminders() {
        let (_clock, mut store) = store();
        let mut scheduler = NotificationScheduler::new(ManualTimer::new());

        assert!(scheduler.schedule_next(&mut store, |_| {}).is_none());
        assert!(!scheduler.timer().is_armed());
        assert!(scheduler.armed().is_none());
    }

    #[test]
    fn arms_for_the_earliest_tie_set() {
        let (_clock, mut store) = store();
        let a = remind(&mut store, "a", "13:00", 30);
        let b = remind(&mut store, "b", "12:45", 15);
        remind(&mut store, "c", "14:00", 0);
        let (fired, make) = collector();
        let mut scheduler = NotificationScheduler::new(ManualTimer::new());

        let armed = scheduler.schedule_next(&mut store, make()).unwrap();
        assert_eq!(armed.delay_ms, 30 * 60 * 1000);
        assert_eq!(armed.task_ids, [a.id, b.id]);
        assert_eq!(scheduler.timer().pending_delay(), Some(Duration::from_secs(30 * 60)));

        assert!(scheduler.timer_mut().fire());
        assert_eq!(*fired.lock(), vec![vec![a.id, b.id]]);
        assert_eq!(scheduler.fired_through(), Some(armed.fire_at_ms));
    }

    #[test]
    fn rearming_cancels_the_previous_timer() {
        let (_clock, mut store) = store();
        remind(&mut store, "a", "13:00", 0);
        let mut scheduler = NotificationScheduler::new(ManualTimer::new());

        scheduler.schedule_next(&mut store, |_| {});
        let earlier = remind(&mut store, "earlier", "12:30", 0);
        let armed = scheduler.schedule_next(&mut store, |_| {}).unwrap();

        assert_eq!(armed.task_ids, [earlier.id]);
        assert_eq!(scheduler.timer().armed_count(), 2);
        assert_eq!(scheduler.timer().cancelled_count(), 1);
    }

    #[test]
    fn fired_set_is_not_armed_again() {
        let (_clock, mut store) = store();
        let first = remind(&mut store, "first", "12:30", 0);
        let second = remind(&mut store, "second", "13:30", 0);
        let (fired, make) = collector();
        let mut scheduler = NotificationScheduler::new(ManualTimer::new());

        scheduler.schedule_next(&mut store, make());
        scheduler.timer_mut().fire();

        let armed = scheduler.schedule_next(&mut store, make()).unwrap();
        assert_eq!(armed.task_ids, [second.id]);
        scheduler.timer_mut().fire();

        assert!(scheduler.schedule_next(&mut store, make()).is_none());
        assert_eq!(*fired.lock(), vec![vec![first.id], vec![second.id]]);
    }

    #[test]
    fn overdue_reminder_fires_immediately() {
        let (clock, mut store) = store();
        remind(&mut store, "a", "12:30", 10);
        clock.advance(chrono::Duration::hours(1));
        let mut scheduler = NotificationScheduler::new(ManualTimer::new());

        let armed = scheduler.schedule_next(&mut store, |_| {}).unwrap();
        assert_eq!(armed.delay_ms, 0);
        assert_eq!(scheduler.timer().pending_delay(), Some(Duration::ZERO));
    }

    #[test]
    fn out_of_range_stored_timestamps_are_skipped() {
        let (clock, _) = store();
        let backend = MemoryBackend::new();
        let mut store = TaskStore::new(
            Box::new(backend.clone()),
            DEFAULT_STORAGE_KEY,
            TimeService::new(clock.clone()),
        );
        remind(&mut store, "a", "12:30", 0);

        let mut records: serde_json::Value =
            serde_json::from_str(&backend.raw(DEFAULT_STORAGE_KEY).unwrap()).unwrap();
        records[0]["notificationTimestamp"] = serde_json::json!(i64::MIN);
        let _ = backend.clone().with_raw(DEFAULT_STORAGE_KEY, &records.to_string());

        let mut scheduler = NotificationScheduler::new(ManualTimer::new());
        assert!(scheduler.schedule_next(&mut store, |_| {}).is_none());

        records[0]["notificationTimestamp"] = serde_json::json!(i64::MAX);
        let _ = backend.clone().with_raw(DEFAULT_STORAGE_KEY, &records.to_string());
        let armed = scheduler.schedule_next(&mut store, |_| {}).unwrap();
        assert_eq!(armed.fire_at_ms, i64::MAX);
    }

    #[test]
    fn completed_tasks_are_not_reminded() {
        let (_clock, mut store) = store();
        let task = remind(&mut store, "a", "12:30", 0);
        store.change_task_status(task.id, TaskStatus::Completed);
        let mut scheduler = NotificationScheduler::new(ManualTimer::new());

        assert!(scheduler.schedule_next(&mut store, |_| {}).is_none());
        assert_eq!(store.get_tasks_by_status(StatusFilter::All).len(), 1);
    }

    #[test]
    fn inbox_skips_duplicates_and_drains_stale() {
        let (_clock, mut store) = store();
        let a = remind(&mut store, "a", "12:30", 0);
        let b = remind(&mut store, "b", "12:30", 0);
        let mut inbox = ReminderInbox::new();

        assert_eq!(inbox.push(vec![a.clone()], 1_000), 1);
        assert_eq!(inbox.push(vec![a.clone(), b.clone()], 5_000), 1);
        assert_eq!(inbox.len(), 2);

        let stale = inbox.drain_stale(60_000, 59_000);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].task.id, a.id);
        assert!(inbox.contains(b.id));

        assert_eq!(inbox.take(b.id).map(|r| r.task.id), Some(b.id));
        assert!(inbox.take(b.id).is_none());
        assert!(inbox.is_empty());
    }
}
