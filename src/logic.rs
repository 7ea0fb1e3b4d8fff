/*
Ordering and selection rules for the task collection.
Module is independent of persistence so the rules can be tested on plain slices.
*/

use chrono::Duration;
use std::cmp::Ordering;
use uuid::Uuid;

use crate::clock::TimeService;
use crate::models::{SortedTasks, StatusFilter, Task};

pub fn filter_by_status(tasks: &[Task], filter: StatusFilter) -> Vec<Task> {
    tasks.iter().filter(|t| filter.matches(t)).cloned().collect()
}

// Due instant in epoch milliseconds, None for tasks without a deadline
pub fn due_timestamp(task: &Task, time: &TimeService) -> Option<i64> {
    let due = task.due_at()?;
    Some(time.resolve(due.date(), due.time()).timestamp_millis())
}

// Split tasks by deadline and order both halves.
//
// Rules:
// - With due date: by due instant, earliest first when `ascending`,
//   latest first otherwise
// - Same due instant: higher priority first, whatever the direction
// - Without due date: higher priority first, direction ignored
// - `all` lists every dated task before every undated one
// Sorting is stable, so equal keys keep insertion order.
pub fn sort_tasks(tasks: Vec<Task>, ascending: bool, time: &TimeService) -> SortedTasks {
    let mut dated: Vec<(i64, Task)> = Vec::new();
    let mut no_due_date: Vec<Task> = Vec::new();

    for task in tasks {
        match due_timestamp(&task, time) {
            Some(due) => dated.push((due, task)),
            None => no_due_date.push(task),
        }
    }

    dated.sort_by(|(due_a, a), (due_b, b)| {
        let by_due = if ascending {
            due_a.cmp(due_b)
        } else {
            due_b.cmp(due_a)
        };
        by_due.then_with(|| by_priority_desc(a, b))
    });
    no_due_date.sort_by(by_priority_desc);

    let with_due_date: Vec<Task> = dated.into_iter().map(|(_, t)| t).collect();
    let all = with_due_date.iter().chain(no_due_date.iter()).cloned().collect();

    SortedTasks {
        with_due_date,
        no_due_date,
        all,
    }
}

fn by_priority_desc(a: &Task, b: &Task) -> Ordering {
    b.priority.cmp(&a.priority)
}

// Leading `count` tasks of an already sorted list.
// A count of zero still yields one task; an empty list yields None.
pub fn take_upcoming(sorted: Vec<Task>, count: usize) -> Option<Vec<Task>> {
    if sorted.is_empty() {
        return None;
    }
    Some(sorted.into_iter().take(count.max(1)).collect())
}

// Every active task sharing the earliest armed notification timestamp.
// Timestamps at or before the epoch count as unset.
// With `after`, only timestamps strictly later than it are considered.
pub fn next_notification_set(tasks: &[Task], after: Option<i64>) -> Vec<Task> {
    let armed = || {
        tasks
            .iter()
            .filter(|t| t.is_active() && t.notification_timestamp > 0)
            .filter(move |t| after.is_none_or(|w| t.notification_timestamp > w))
    };

    let Some(earliest) = armed().map(|t| t.notification_timestamp).min() else {
        return Vec::new();
    };

    armed()
        .filter(|t| t.notification_timestamp == earliest)
        .cloned()
        .collect()
}

// Ids of active, dated tasks whose due instant is at least `grace` behind `now_ms`
pub fn expired_ids(tasks: &[Task], now_ms: i64, grace: Duration, time: &TimeService) -> Vec<Uuid> {
    let grace_ms = grace.num_milliseconds();
    tasks
        .iter()
        .filter(|t| t.is_active())
        .filter_map(|t| {
            let due = due_timestamp(t, time)?;
            (now_ms.saturating_sub(due) >= grace_ms).then_some(t.id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{Priority, TaskStatus};
    use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone};
    use std::sync::Arc;

    fn time() -> TimeService {
        let offset = FixedOffset::east_opt(0).unwrap();
        let now = offset.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        TimeService::new(Arc::new(FixedClock::new(now)))
    }

    fn task(content: &str, due: Option<(u32, u32, u32)>, priority: Priority) -> Task {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        Task {
            id: Uuid::new_v4(),
            content: content.to_string(),
            creation_date: today,
            creation_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            due_date: due.map(|(d, _, _)| NaiveDate::from_ymd_opt(2026, 10, d).unwrap()),
            due_time: due.map(|(_, h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap()),
            priority,
            get_notified: false,
            notification_offset: 0,
            notification_timestamp: 0,
            status: TaskStatus::Active,
            modification_date: today,
            completion_date: None,
            completion_time: None,
        }
    }

    fn notified(content: &str, at: i64) -> Task {
        let mut t = task(content, Some((20, 9, 0)), Priority::Low);
        t.get_notified = true;
        t.notification_timestamp = at;
        t
    }

    fn contents(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.content.as_str()).collect()
    }

    #[test]
    fn dated_ties_break_by_priority_in_both_directions() {
        let tasks = vec![
            task("medium", Some((19, 9, 0)), Priority::Medium),
            task("later", Some((20, 9, 0)), Priority::Low),
            task("high", Some((19, 9, 0)), Priority::High),
        ];

        let asc = sort_tasks(tasks.clone(), true, &time());
        assert_eq!(contents(&asc.with_due_date), ["high", "medium", "later"]);

        let desc = sort_tasks(tasks, false, &time());
        assert_eq!(contents(&desc.with_due_date), ["later", "high", "medium"]);
    }

    #[test]
    fn undated_tasks_sort_by_priority_only() {
        let tasks = vec![
            task("low", None, Priority::Low),
            task("very high", None, Priority::VeryHigh),
            task("medium", None, Priority::Medium),
        ];

        for ascending in [true, false] {
            let sorted = sort_tasks(tasks.clone(), ascending, &time());
            assert_eq!(contents(&sorted.no_due_date), ["very high", "medium", "low"]);
            assert!(sorted.with_due_date.is_empty());
        }
    }

    #[test]
    fn all_puts_dated_before_undated() {
        let tasks = vec![
            task("undated urgent", None, Priority::VeryHigh),
            task("dated", Some((25, 9, 0)), Priority::Low),
        ];

        let sorted = sort_tasks(tasks, false, &time());
        assert_eq!(contents(&sorted.all), ["dated", "undated urgent"]);
    }

    #[test]
    fn upcoming_takes_at_least_one() {
        let sorted = vec![
            task("a", Some((19, 9, 0)), Priority::Low),
            task("b", Some((20, 9, 0)), Priority::Low),
            task("c", Some((21, 9, 0)), Priority::Low),
        ];

        assert_eq!(take_upcoming(sorted.clone(), 1).unwrap().len(), 1);
        assert_eq!(take_upcoming(sorted.clone(), 0).unwrap().len(), 1);
        assert_eq!(contents(&take_upcoming(sorted.clone(), 2).unwrap()), ["a", "b"]);
        assert_eq!(take_upcoming(sorted, 10).unwrap().len(), 3);
        assert!(take_upcoming(Vec::new(), 5).is_none());
    }

    #[test]
    fn notification_tie_set_is_returned_whole() {
        let mut done = notified("done", 1_000);
        done.status = TaskStatus::Completed;
        let tasks = vec![
            notified("later", 5_000),
            notified("a", 2_000),
            done,
            task("quiet", Some((19, 9, 0)), Priority::High),
            notified("b", 2_000),
        ];

        assert_eq!(contents(&next_notification_set(&tasks, None)), ["a", "b"]);
        assert_eq!(contents(&next_notification_set(&tasks, Some(2_000))), ["later"]);
        assert!(next_notification_set(&tasks, Some(5_000)).is_empty());
        assert!(next_notification_set(&[], None).is_empty());
    }

    #[test]
    fn pre_epoch_notification_timestamps_are_unset() {
        let tasks = vec![notified("broken", i64::MIN), notified("negative", -5), notified("real", 3_000)];
        assert_eq!(contents(&next_notification_set(&tasks, None)), ["real"]);
    }

    #[test]
    fn expiry_waits_for_the_grace_period() {
        let t = time();
        let tasks = vec![
            task("just due", Some((18, 12, 0)), Priority::Low),
            task("long gone", Some((18, 11, 0)), Priority::Low),
            task("undated", None, Priority::Low),
        ];
        let grace = Duration::seconds(59);

        assert_eq!(expired_ids(&tasks, t.now_ms(), grace, &t), [tasks[1].id]);

        let later = t.now_ms() + 59_000;
        assert_eq!(expired_ids(&tasks, later, grace, &t), [tasks[0].id, tasks[1].id]);
    }

    #[test]
    fn expiry_ignores_terminal_tasks() {
        let t = time();
        let mut done = task("done", Some((17, 9, 0)), Priority::Low);
        done.status = TaskStatus::Completed;
        let mut expired = task("expired", Some((17, 9, 0)), Priority::Low);
        expired.status = TaskStatus::Expired;

        assert!(expired_ids(&[done, expired], t.now_ms(), Duration::zero(), &t).is_empty());
    }
}
