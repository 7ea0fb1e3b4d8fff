/*
The task collection and its lifecycle.

TaskStore is the only writer of the collection. Listing queries reload
from the backend first (read-through); every mutation saves the whole list
back (write-through).
*/

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::clock::TimeService;
use crate::error::ValidationError;
use crate::logic;
use crate::models::{end_of_day, Priority, SortedTasks, StatusFilter, Task, TaskInput, TaskStatus};
use crate::store::TaskBackend;

pub const DEFAULT_STORAGE_KEY: &str = "userTasks";

// How long after its due instant an active task is left alone before the
// expiry sweep marks it expired.
pub const DEFAULT_EXPIRY_GRACE_MS: i64 = 59_000;

pub struct TaskStore {
    backend: Box<dyn TaskBackend>,
    storage_key: String,
    time: TimeService,
    expiry_grace: Duration,
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new(backend: Box<dyn TaskBackend>, storage_key: impl Into<String>, time: TimeService) -> Self {
        let storage_key = storage_key.into();
        let tasks = backend.load(&storage_key);
        debug!(key = %storage_key, count = tasks.len(), "task store opened");
        Self {
            backend,
            storage_key,
            time,
            expiry_grace: Duration::milliseconds(DEFAULT_EXPIRY_GRACE_MS),
            tasks,
        }
    }

    pub fn with_expiry_grace(mut self, grace: Duration) -> Self {
        self.expiry_grace = grace;
        self
    }

    pub fn time(&self) -> &TimeService {
        &self.time
    }

    pub fn expiry_grace(&self) -> Duration {
        self.expiry_grace
    }

    fn reload(&mut self) {
        self.tasks = self.backend.load(&self.storage_key);
    }

    // A failed write is logged and the in-memory state kept; the next
    // read-through shows whatever the backend still holds.
    fn persist(&self) {
        if let Err(e) = self.backend.save(&self.storage_key, &self.tasks) {
            error!(key = %self.storage_key, error = %e, "failed to save tasks");
        }
    }

    // Validate the form input and append the resulting task.
    pub fn create_task(&mut self, input: &TaskInput) -> Result<Task, ValidationError> {
        let task = self.validate(input)?;
        self.tasks.push(task.clone());
        self.persist();
        info!(id = %task.id, due = ?task.due_at(), "task created");
        Ok(task)
    }

    // Resolution rules:
    // - date without time -> due at 23:59 that day
    // - time without date -> due today
    // - neither -> no deadline
    // The resolved due instant must be strictly in the future, and so must
    // not be the reminder instant when a reminder is requested.
    fn validate(&self, input: &TaskInput) -> Result<Task, ValidationError> {
        let content = input.content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyContent);
        }

        let priority =
            Priority::from_ordinal(input.priority).ok_or(ValidationError::InvalidPriority(input.priority))?;

        let now = self.time.now();
        let due_date = parse_date(input.due_date.as_deref())?;
        let due_time = parse_time(input.due_time.as_deref())?;

        let (due_date, due_time) = match (due_date, due_time) {
            (Some(d), Some(t)) => (Some(d), Some(t)),
            (Some(d), None) => (Some(d), Some(end_of_day())),
            (None, Some(t)) => (Some(now.date()), Some(t)),
            (None, None) => (None, None),
        };

        if let (Some(d), Some(t)) = (due_date, due_time) {
            if self.time.resolve(d, t).timestamp_millis() <= now.timestamp_ms {
                return Err(ValidationError::DueNotInFuture);
            }
        }

        let (notification_offset, notification_timestamp) = if input.wants_notification {
            let (Some(d), Some(t)) = (due_date, due_time) else {
                return Err(ValidationError::NotificationWithoutDue);
            };
            let offset = input.notification_offset_minutes;
            let at = self.time.notification_time(d, t, offset);
            if at.timestamp_ms < now.timestamp_ms {
                return Err(ValidationError::NotificationInPast);
            }
            (offset, at.timestamp_ms)
        } else {
            (0, 0)
        };

        Ok(Task {
            id: Uuid::new_v4(),
            content: content.to_string(),
            creation_date: now.date(),
            creation_time: now.time(),
            due_date,
            due_time,
            priority,
            get_notified: input.wants_notification,
            notification_offset,
            notification_timestamp,
            status: TaskStatus::Active,
            modification_date: now.date(),
            completion_date: None,
            completion_time: None,
        })
    }

    pub fn get_tasks_by_status(&mut self, filter: StatusFilter) -> Vec<Task> {
        self.reload();
        logic::filter_by_status(&self.tasks, filter)
    }

    // Lookup in the cached collection, without reloading.
    pub fn get_task_by_id(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    // Remove every task with this id. Never fails; returns how many went.
    pub fn delete_task(&mut self, id: Uuid) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        let removed = before - self.tasks.len();
        self.persist();
        if removed == 0 {
            debug!(%id, "delete: no such task");
        } else {
            info!(%id, "task deleted");
        }
        removed
    }

    // Take a task back into the form for editing.
    //
    // The task is removed; submitting the returned input creates its
    // replacement. `None` for an unknown id.
    pub fn edit_task(&mut self, id: Uuid) -> Option<TaskInput> {
        let task = self.get_task_by_id(id)?;
        let time_format = |t: NaiveTime| {
            let pattern = if t.second() == 0 { "%H:%M" } else { "%H:%M:%S" };
            t.format(pattern).to_string()
        };
        let input = TaskInput {
            content: task.content.clone(),
            due_date: task.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
            due_time: task.due_time.map(time_format),
            priority: task.priority.ordinal(),
            wants_notification: task.get_notified,
            notification_offset_minutes: if task.get_notified { task.notification_offset } else { 0 },
        };

        self.delete_task(id);
        Some(input)
    }

    // Move a task to `status` and save.
    //
    // Unknown ids are a silent no-op: `None` comes back and nothing is
    // written.
    pub fn change_task_status(&mut self, id: Uuid, status: TaskStatus) -> Option<Task> {
        let Some(index) = self.tasks.iter().position(|t| t.id == id) else {
            debug!(%id, ?status, "status change: no such task");
            return None;
        };

        let now = self.time.now();
        let task = &mut self.tasks[index];
        task.status = status;
        if status == TaskStatus::Completed {
            task.completion_date = Some(now.date());
            task.completion_time = Some(now.time());
        }
        task.modification_date = now.date();

        let updated = task.clone();
        self.persist();
        info!(%id, ?status, "task status changed");
        Some(updated)
    }

    pub fn get_sorted_tasks(&mut self, filter: StatusFilter, ascending: bool) -> SortedTasks {
        let tasks = self.get_tasks_by_status(filter);
        logic::sort_tasks(tasks, ascending, &self.time)
    }

    // Earliest active tasks with a deadline; `None` when there are none.
    pub fn get_upcoming_tasks(&mut self, count: usize) -> Option<Vec<Task>> {
        let sorted = self.get_sorted_tasks(StatusFilter::Only(TaskStatus::Active), true);
        logic::take_upcoming(sorted.with_due_date, count)
    }

    // Active tasks sharing the earliest armed reminder.
    pub fn get_next_upcoming_notification(&mut self) -> Vec<Task> {
        self.next_notification_after(None)
    }

    // Like get_next_upcoming_notification,
    // ignoring reminders at or before `watermark`.
    pub fn next_notification_after(&mut self, watermark: Option<i64>) -> Vec<Task> {
        let active = self.get_tasks_by_status(StatusFilter::Only(TaskStatus::Active));
        logic::next_notification_set(&active, watermark)
    }

    // Expire every active task whose due instant is at least the grace
    // period old, returning the tasks that were expired.
    //
    // This writes to the backend; it is a command, not a query.
    pub fn check_for_expired_tasks(&mut self) -> Vec<Task> {
        let active = self.get_tasks_by_status(StatusFilter::Only(TaskStatus::Active));
        let now_ms = self.time.now_ms();
        let ids = logic::expired_ids(&active, now_ms, self.expiry_grace, &self.time);

        ids.into_iter()
            .filter_map(|id| self.change_task_status(id, TaskStatus::Expired))
            .collect()
    }
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, ValidationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ValidationError::InvalidDueDate(s.to_string())),
    }
}

// Accepts "HH:MM" as sent by time inputs, and "HH:MM:SS"
fn parse_time(raw: Option<&str>) -> Result<Option<NaiveTime>, ValidationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map(Some)
            .map_err(|_| ValidationError::InvalidDueTime(s.to_string())),
    }
}
