//! The user-facing alarm definition.

use core::fmt;

use embassy_time::Instant;
use platform::OutOfRangeError;
use rand::RngCore;

use crate::days::DaysOfWeek;

/// Opaque unique alarm handle.
///
/// Generated from the monotonic clock in the high 48 bits and 16 random bits
/// below it. Uniqueness is not re-verified after generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmId(u64);

impl AlarmId {
    /// Generate a fresh id.
    pub fn generate<R: RngCore>(rng: &mut R) -> Self {
        let micros = Instant::now().as_micros();
        let random = u64::from(rng.next_u32() & 0xFFFF);
        Self(micros.wrapping_shl(16) | random)
    }

    /// Wrap a raw value, e.g. one received from the web layer.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Time of day an alarm rings, validated to `00:00..=23:59`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmTime {
    hour: u8,
    minute: u8,
}

impl AlarmTime {
    /// Create an alarm time.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] for an hour above 23 or a minute above 59.
    pub fn try_new(hour: u8, minute: u8) -> Result<Self, OutOfRangeError> {
        if hour > 23 {
            return Err(OutOfRangeError {
                value: u32::from(hour),
                min: 0,
                max: 23,
            });
        }
        if minute > 59 {
            return Err(OutOfRangeError {
                value: u32::from(minute),
                min: 0,
                max: 59,
            });
        }
        Ok(Self { hour, minute })
    }

    /// Hour (0–23).
    pub const fn hour(self) -> u8 {
        self.hour
    }

    /// Minute (0–59).
    pub const fn minute(self) -> u8 {
        self.minute
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A logical alarm.
///
/// Owned by the engine's alarm table. `missed` starts out `true`: an alarm
/// counts as missed until it has rung and been stopped by hand, or the flag
/// is cleared explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Alarm {
    id: AlarmId,
    /// Time of day.
    pub time: AlarmTime,
    /// Repeat pattern.
    pub days: DaysOfWeek,
    /// Whether the alarm may ring.
    pub enabled: bool,
    /// Whether the last occurrence went unacknowledged.
    pub missed: bool,
}

impl Alarm {
    /// Create an alarm with an explicit id.
    pub const fn new(id: AlarmId, time: AlarmTime, days: DaysOfWeek, enabled: bool) -> Self {
        Self {
            id,
            time,
            days,
            enabled,
            missed: true,
        }
    }

    /// Create an alarm with a freshly generated id.
    pub fn with_generated_id<R: RngCore>(
        rng: &mut R,
        time: AlarmTime,
        days: DaysOfWeek,
        enabled: bool,
    ) -> Self {
        Self::new(AlarmId::generate(rng), time, days, enabled)
    }

    /// Table key.
    pub const fn id(&self) -> AlarmId {
        self.id
    }

    /// Fires once, then disables itself.
    pub const fn is_one_shot(&self) -> bool {
        self.days.is_one_shot()
    }

    /// Fires every day at the same time.
    pub const fn is_every_day(&self) -> bool {
        self.days.is_every_day()
    }

    /// Fires only on the selected weekdays.
    pub const fn uses_days_of_week(&self) -> bool {
        self.days.uses_days_of_week()
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={}, time={}, days={}, enabled={}, missed={}",
            self.id, self.time, self.days, self.enabled, self.missed
        )
    }
}
