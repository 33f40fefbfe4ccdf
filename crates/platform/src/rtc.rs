//! Real-time clock abstraction with a single programmable alarm slot.
//!
//! Models a DS3231-class RTC: one alarm register that compares either
//! hour + minute (daily) or day-of-week + hour + minute (weekly), and an
//! alarm-fired flag that pulls the interrupt line low until cleared.
//!
//! The clock is shared with other subsystems (time display, network time
//! sync), so every call must be made while holding the owner's hardware
//! lock. Implementations are synchronous: register access over I2C is short
//! and must not be interleaved with other bus users.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Weekday};

/// Real-time clock trait
pub trait RtcClock {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read the current wall-clock time.
    fn now(&mut self) -> Result<NaiveDateTime, Self::Error>;

    /// Program the alarm register with `trigger`, comparing as `mode`.
    ///
    /// Replaces any previously programmed trigger and enables the alarm
    /// interrupt.
    fn program_alarm(&mut self, trigger: AlarmTrigger, mode: AlarmMatch)
        -> Result<(), Self::Error>;

    /// Clear the alarm-fired flag, releasing the interrupt line.
    fn clear_fired_flag(&mut self) -> Result<(), Self::Error>;

    /// Disable the alarm register so it can no longer fire.
    fn disable_alarm(&mut self) -> Result<(), Self::Error>;
}

/// Compare mode of the alarm register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmMatch {
    /// Fire every day when hour and minute match.
    HourMinute,
    /// Fire when day of week, hour and minute match.
    DayHourMinute,
}

/// Trigger condition loaded into the alarm register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmTrigger {
    /// Hour (0–23)
    pub hour: u8,
    /// Minute (0–59)
    pub minute: u8,
    /// Day of week, or `None` for a daily trigger
    pub weekday: Option<Weekday>,
}

impl AlarmTrigger {
    /// Daily trigger at `hour:minute`.
    pub const fn daily(hour: u8, minute: u8) -> Self {
        Self {
            hour,
            minute,
            weekday: None,
        }
    }

    /// Weekly trigger at `hour:minute` on `weekday`.
    pub const fn weekly(weekday: Weekday, hour: u8, minute: u8) -> Self {
        Self {
            hour,
            minute,
            weekday: Some(weekday),
        }
    }

    /// Compare mode required to express this trigger.
    pub const fn mode(&self) -> AlarmMatch {
        match self.weekday {
            Some(_) => AlarmMatch::DayHourMinute,
            None => AlarmMatch::HourMinute,
        }
    }

    /// Whether the register would match at `when`.
    ///
    /// Seconds are ignored: the register matches for the whole minute.
    pub fn matches(&self, when: &NaiveDateTime) -> bool {
        u32::from(self.hour) == when.hour()
            && u32::from(self.minute) == when.minute()
            && self.weekday.map_or(true, |day| day == when.weekday())
    }

    /// Encode the trigger as the date/time a DS3231 driver expects.
    ///
    /// 2000-01-03 is a Monday, so the day-of-week offset can be added
    /// directly. Returns `None` if hour or minute are out of range.
    pub fn reference_datetime(&self) -> Option<NaiveDateTime> {
        let base = NaiveDate::from_ymd_opt(2000, 1, 3)?.and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            0,
        )?;
        let offset = self
            .weekday
            .map_or(0, |day| i64::from(day.num_days_from_monday()));
        base.checked_add_signed(TimeDelta::days(offset))
    }
}
