//! Campaign scheduling: when a scheduled campaign becomes due.
//!
//! Recurring campaigns evaluate against the campaign's local clock, derived
//! from a fixed UTC offset configured on the schedule. Named time zones and
//! DST are the host's responsibility; the engine only needs a stable offset.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Offset, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// When a campaign starts dialing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Schedule {
    /// Start on the next scheduler tick
    Immediate,
    /// Start once the given instant has passed
    At { start_at: DateTime<Utc> },
    /// Start whenever the recurrence pattern matches the campaign's local clock
    Recurring {
        pattern: RecurrencePattern,
        /// Optional daily window, evaluated in campaign-local time
        window: Option<TimeWindow>,
        /// Campaign-local clock offset from UTC, in minutes east
        utc_offset_minutes: i32,
    },
}

/// Recurrence pattern for recurring campaigns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RecurrencePattern {
    /// Due every day
    Daily,
    /// Due on the listed days of the week
    Weekly { days: Vec<Weekday> },
    /// Due on the first day of each month
    Monthly,
}

/// Half-open daily time window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    /// Whether a local time falls inside the window. Windows that cross
    /// midnight (start > end) wrap around.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

impl Schedule {
    /// Whether a scheduled campaign is due to start at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self {
            Schedule::Immediate => true,
            Schedule::At { start_at } => *start_at <= now,
            Schedule::Recurring {
                pattern,
                window,
                utc_offset_minutes,
            } => {
                let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
                    .unwrap_or_else(|| Utc.fix());
                let local = now.with_timezone(&offset);

                let pattern_due = match pattern {
                    RecurrencePattern::Daily => true,
                    RecurrencePattern::Weekly { days } => days.contains(&local.weekday()),
                    RecurrencePattern::Monthly => local.day() == 1,
                };

                pattern_due && window.map_or(true, |w| w.contains(local.time()))
            }
        }
    }
}
