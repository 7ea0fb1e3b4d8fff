/*
Date and time computations shared by the task engine.
Everything here is a pure function of "now" and the arguments;
"now" comes from an injected clock so tests can pin it.
*/

use std::sync::Arc;

use chrono::{
    DateTime, Duration, FixedOffset, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Timelike,
};
use parking_lot::Mutex;
use serde::Serialize;

const MS_PER_MIN: i64 = 60 * 1000;
const MS_PER_HOUR: i64 = 60 * MS_PER_MIN;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

// Source of the current instant and of the local offset used to read
// wall-clock dates and times.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    // Attach the local offset to a wall-clock date and time.
    fn localize(&self, naive: NaiveDateTime) -> DateTime<FixedOffset>;
}

// Operating system clock in the machine's local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let local = Local::now();
        let fixed = *local.offset();
        local.with_timezone(&fixed)
    }

    fn localize(&self, naive: NaiveDateTime) -> DateTime<FixedOffset> {
        match Local.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt.with_timezone(dt.offset()),
            // DST fold: the first occurrence wins
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(earliest.offset()),
            // DST gap: the wall time does not exist, read it with today's offset
            LocalResult::None => with_offset(naive, *self.now().offset()),
        }
    }
}

// Clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock()
    }

    fn localize(&self, naive: NaiveDateTime) -> DateTime<FixedOffset> {
        with_offset(naive, *self.now.lock().offset())
    }
}

fn with_offset(naive: NaiveDateTime, offset: FixedOffset) -> DateTime<FixedOffset> {
    let utc = naive - Duration::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, offset)
}

// Creation and completion stamps are kept to the second
fn whole_seconds(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}

// Every representation of "now" the widget displays, taken from one instant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSnapshot {
    pub date_short: String,     // 10/18/2026
    pub date_iso: String,       // 2026-10-18
    pub date_formatted: String, // Sunday, October 18, 2026
    pub time_12_hour: String,   // 09:05:03 PM
    pub time_24_hour: String,   // 21:05
    pub timestamp_ms: i64,
    pub instant: DateTime<FixedOffset>,
}

impl TimeSnapshot {
    fn from_instant(instant: DateTime<FixedOffset>) -> Self {
        Self {
            date_short: instant.format("%-m/%-d/%Y").to_string(),
            date_iso: instant.format("%Y-%m-%d").to_string(),
            date_formatted: instant.format("%A, %B %-d, %Y").to_string(),
            time_12_hour: instant.format("%I:%M:%S %p").to_string(),
            time_24_hour: instant.format("%H:%M").to_string(),
            timestamp_ms: instant.timestamp_millis(),
            instant,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.instant.date_naive()
    }

    pub fn time(&self) -> NaiveTime {
        whole_seconds(self.instant.time())
    }
}

// Signed distance between now and a due instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeDifference {
    pub days: i64,
    pub hours: i64, // excludes full days
    pub mins: i64,  // excludes full hours
    pub is_expired: bool,
    pub text: String,
}

// Reminder instant for a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationTime {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub timestamp_ms: i64,
}

// Date/time service over an injected Clock.
#[derive(Clone)]
pub struct TimeService {
    clock: Arc<dyn Clock>,
}

impl TimeService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn now(&self) -> TimeSnapshot {
        TimeSnapshot::from_instant(self.clock.now())
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    // Due date and time as an instant in the local offset.
    pub fn resolve(&self, date: NaiveDate, time: NaiveTime) -> DateTime<FixedOffset> {
        self.clock.localize(date.and_time(time))
    }

    // Countdown from now to the given date and time.
    //
    // Zero components are left out of the text: "2 days 5 mins left".
    // Under a minute in either direction reads "less than 1 min left"
    // (or "passed").
    pub fn time_difference(&self, date: NaiveDate, time: NaiveTime) -> TimeDifference {
        let diff_ms = self.resolve(date, time).timestamp_millis() - self.now_ms();
        let is_expired = diff_ms < 0;
        let abs = diff_ms.abs();
        let verb = if is_expired { "passed" } else { "left" };

        let days = abs / MS_PER_DAY;
        let hours = (abs / MS_PER_HOUR) % 24;
        let mins = (abs / MS_PER_MIN) % 60;

        let parts: Vec<String> = [(days, "days"), (hours, "hours"), (mins, "mins")]
            .into_iter()
            .filter(|(n, _)| *n != 0)
            .map(|(n, unit)| format!("{n} {unit}"))
            .collect();

        let text = if parts.is_empty() {
            format!("less than 1 min {verb}")
        } else {
            format!("{} {verb}", parts.join(" "))
        };

        TimeDifference {
            days,
            hours,
            mins,
            is_expired,
            text,
        }
    }

    // Due instant minus `offset_minutes`.
    pub fn notification_time(
        &self,
        due_date: NaiveDate,
        due_time: NaiveTime,
        offset_minutes: u32,
    ) -> NotificationTime {
        let at = self.resolve(due_date, due_time) - Duration::minutes(i64::from(offset_minutes));
        NotificationTime {
            date: at.date_naive(),
            time: at.time(),
            timestamp_ms: at.timestamp_millis(),
        }
    }
}
