//! Concrete occurrences derived from a logical alarm.
//!
//! The RTC has a single alarm register, so every [`Alarm`] is expanded into
//! one or more [`HardwareAlarm`]s the engine can load into it:
//!
//! - one-shot and every-day alarms become one day-independent entry;
//! - weekly alarms become one entry per selected weekday.
//!
//! Entries refer to their parent by [`AlarmId`] and carry a copy of its time.
//! They are regenerated whenever the parent's time or days change, so the
//! copy never goes stale; the parent's `enabled` flag is always looked up
//! through the alarm table.

use core::fmt;

use chrono::{Datelike, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Weekday};
use platform::AlarmTrigger;

use crate::alarm::{Alarm, AlarmId, AlarmTime};

/// One schedulable occurrence of an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareAlarm {
    parent: AlarmId,
    time: AlarmTime,
    weekday: Option<Weekday>,
}

impl HardwareAlarm {
    /// Day-independent occurrence.
    pub const fn daily(parent: AlarmId, time: AlarmTime) -> Self {
        Self {
            parent,
            time,
            weekday: None,
        }
    }

    /// Occurrence bound to `weekday`.
    pub const fn weekly(parent: AlarmId, time: AlarmTime, weekday: Weekday) -> Self {
        Self {
            parent,
            time,
            weekday: Some(weekday),
        }
    }

    /// Expand `alarm` into its occurrences.
    pub fn from_alarm(alarm: &Alarm) -> heapless::Vec<Self, 7> {
        let mut out = heapless::Vec::new();
        if alarm.uses_days_of_week() {
            for day in alarm.days.iter() {
                // At most seven days, matching the capacity
                let _ = out.push(Self::weekly(alarm.id(), alarm.time, day));
            }
        } else {
            let _ = out.push(Self::daily(alarm.id(), alarm.time));
        }
        out
    }

    /// Id of the owning alarm.
    pub const fn parent(&self) -> AlarmId {
        self.parent
    }

    /// Time of day copied from the parent.
    pub const fn time(&self) -> AlarmTime {
        self.time
    }

    /// Bound weekday, or `None` for a day-independent entry.
    pub const fn weekday(&self) -> Option<Weekday> {
        self.weekday
    }

    /// Whether this entry and `other` belong to the same parent and weekday.
    pub fn same_slot(&self, other: &Self) -> bool {
        self.parent == other.parent && self.weekday == other.weekday
    }

    /// The next instant at which this occurrence rings, strictly after `now`
    /// at minute resolution.
    ///
    /// An occurrence whose hour and minute equal `now`'s counts as already
    /// fired, so the result is always the *next* cycle.
    pub fn next_firing(&self, now: &NaiveDateTime) -> NaiveDateTime {
        let at = NaiveTime::from_hms_opt(
            u32::from(self.time.hour()),
            u32::from(self.time.minute()),
            0,
        )
        .unwrap_or(NaiveTime::MIN);
        let today = now.date().and_time(at);
        let fired_today = self.fired_today(now);

        let days = match self.weekday {
            None => i64::from(fired_today),
            Some(day) => {
                let target = i64::from(day.num_days_from_monday());
                let current = i64::from(now.weekday().num_days_from_monday());
                let fired_this_week = target < current || (target == current && fired_today);
                let delta = target.saturating_sub(current);
                if fired_this_week {
                    delta.saturating_add(7)
                } else {
                    delta
                }
            }
        };

        TimeDelta::try_days(days)
            .and_then(|delta| today.checked_add_signed(delta))
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// Whether the register would match at `when` (hour, minute and, if
    /// bound, weekday). Used to spot alarms that fire at the same instant.
    pub fn triggers_at(&self, when: &NaiveDateTime) -> bool {
        self.trigger().matches(when)
    }

    /// Register contents for this occurrence.
    pub const fn trigger(&self) -> AlarmTrigger {
        match self.weekday {
            Some(day) => AlarmTrigger::weekly(day, self.time.hour(), self.time.minute()),
            None => AlarmTrigger::daily(self.time.hour(), self.time.minute()),
        }
    }

    fn fired_today(&self, now: &NaiveDateTime) -> bool {
        let hour = u32::from(self.time.hour());
        let minute = u32::from(self.time.minute());
        hour < now.hour() || (hour == now.hour() && minute <= now.minute())
    }
}

impl fmt::Display for HardwareAlarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parent={}, time={}", self.parent, self.time)?;
        if let Some(day) = self.weekday {
            write!(f, ", dow={}", day.num_days_from_monday())?;
        }
        Ok(())
    }
}
