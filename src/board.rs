// --------------------------------------------------
// Board: everything the widget draws on one refresh.
//
// A refresh mirrors the widget's render pass:
// 1) expire overdue tasks
// 2) re-arm the reminder timer
// 3) active tasks sorted soonest first, completed and expired latest first
// 4) the upcoming list with countdown text
// -------------------------------------------------

use serde::Serialize;
use uuid::Uuid;

use crate::clock::{TimeDifference, TimeSnapshot};
use crate::models::{StatusFilter, Task, TaskStatus};
use crate::notify::{NotificationScheduler, ScheduledReminder, TimerSlot};
use crate::tasks::TaskStore;

// A task plus its countdown ("3 hours left" / "2 days passed")
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardEntry {
    pub task: Task,
    pub countdown: Option<TimeDifference>, // None when undated or completed
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub now: TimeSnapshot,
    pub active: Vec<BoardEntry>,
    pub completed: Vec<BoardEntry>,
    pub expired: Vec<BoardEntry>,
    pub upcoming: Option<Vec<BoardEntry>>,
    pub newly_expired: Vec<Uuid>,
    pub next_reminder: Option<ScheduledReminder>,
}

impl Board {
    pub fn build<T, F>(
        store: &mut TaskStore,
        scheduler: &mut NotificationScheduler<T>,
        upcoming_count: usize,
        on_fire: F,
    ) -> Self
    where
        T: TimerSlot,
        F: FnOnce(Vec<Task>) + Send + 'static,
    {
        let newly_expired = store.check_for_expired_tasks().iter().map(|t| t.id).collect();
        let next_reminder = scheduler.schedule_next(store, on_fire);

        let mut list = |status: TaskStatus| {
            let ascending = status == TaskStatus::Active;
            let sorted = store.get_sorted_tasks(StatusFilter::Only(status), ascending);
            entries(store, sorted.all)
        };
        let active = list(TaskStatus::Active);
        let completed = list(TaskStatus::Completed);
        let expired = list(TaskStatus::Expired);

        let upcoming = store
            .get_upcoming_tasks(upcoming_count)
            .map(|tasks| entries(store, tasks));

        Board {
            now: store.time().now(),
            active,
            completed,
            expired,
            upcoming,
            newly_expired,
            next_reminder,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.completed.is_empty() && self.expired.is_empty()
    }
}

fn entries(store: &TaskStore, tasks: Vec<Task>) -> Vec<BoardEntry> {
    tasks
        .into_iter()
        .map(|task| {
            let countdown = match (task.status, task.due_at()) {
                (TaskStatus::Completed, _) | (_, None) => None,
                (_, Some(due)) => Some(store.time().time_difference(due.date(), due.time())),
            };
            BoardEntry { task, countdown }
        })
        .collect()
}
