//! Simulated DS3231: wall clock running at a configurable speed.

use std::convert::Infallible;
use std::time::Instant;

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use platform::{AlarmMatch, AlarmTrigger, RtcClock};

/// Upper bound on minutes scanned per [`SimulatedRtc::poll_fired`] call.
const MAX_MINUTES_PER_POLL: u32 = 7 * 24 * 60;

pub struct SimulatedRtc {
    start: NaiveDateTime,
    origin: Instant,
    speed: u32,
    programmed: Option<AlarmTrigger>,
    fired: bool,
    last_checked: NaiveDateTime,
}

impl SimulatedRtc {
    /// Clock reading `start` now and advancing `speed` simulated seconds per
    /// real second.
    pub fn new(start: NaiveDateTime, speed: u32) -> Self {
        Self {
            start,
            origin: Instant::now(),
            speed: speed.max(1),
            programmed: None,
            fired: false,
            last_checked: start,
        }
    }

    fn current(&self) -> NaiveDateTime {
        let real_ms = i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX);
        let sim_ms = real_ms.saturating_mul(i64::from(self.speed));
        TimeDelta::try_milliseconds(sim_ms)
            .and_then(|delta| self.start.checked_add_signed(delta))
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// Raise the fired flag if a programmed minute was crossed since the
    /// last call. Returns `true` on the edge that would pull INT low.
    pub fn poll_fired(&mut self) -> bool {
        let now = self.current();
        let from = self.last_checked;
        self.last_checked = now;

        let Some(trigger) = self.programmed else {
            return false;
        };
        if self.fired {
            return false;
        }

        let mut minute = truncate_to_minute(from);
        for _ in 0..MAX_MINUTES_PER_POLL {
            let Some(next) = minute.checked_add_signed(TimeDelta::minutes(1)) else {
                break;
            };
            minute = next;
            if minute > now {
                break;
            }
            if trigger.matches(&minute) {
                self.fired = true;
                return true;
            }
        }
        false
    }
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

impl RtcClock for SimulatedRtc {
    type Error = Infallible;

    fn now(&mut self) -> Result<NaiveDateTime, Self::Error> {
        Ok(self.current())
    }

    fn program_alarm(&mut self, trigger: AlarmTrigger, mode: AlarmMatch) -> Result<(), Self::Error> {
        tracing::debug!(
            "RTC alarm register: {:02}:{:02} {}",
            trigger.hour,
            trigger.minute,
            match mode {
                AlarmMatch::HourMinute => "daily",
                AlarmMatch::DayHourMinute => "weekly",
            }
        );
        self.programmed = Some(trigger);
        Ok(())
    }

    fn clear_fired_flag(&mut self) -> Result<(), Self::Error> {
        self.fired = false;
        Ok(())
    }

    fn disable_alarm(&mut self) -> Result<(), Self::Error> {
        self.programmed = None;
        Ok(())
    }
}
