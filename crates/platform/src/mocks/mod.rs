//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests.

#![cfg(any(test, feature = "std"))]

use core::sync::atomic::{AtomicU32, Ordering};

use chrono::{NaiveDateTime, TimeDelta};

use crate::*;

/// Error injected by [`MockRtc::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockRtcError {
    /// Simulated I2C bus failure
    Bus,
}

/// Mock RTC with a settable clock and an inspectable alarm register.
pub struct MockRtc {
    now: NaiveDateTime,
    programmed: Option<(AlarmTrigger, AlarmMatch)>,
    fired_flag: bool,
    program_count: usize,
    fail_next: bool,
}

impl MockRtc {
    /// Create a mock RTC reading `now`, with the alarm register disabled.
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now,
            programmed: None,
            fired_flag: false,
            program_count: 0,
            fail_next: false,
        }
    }

    /// Set the wall-clock time.
    pub fn set_now(&mut self, now: NaiveDateTime) {
        self.now = now;
    }

    /// Advance the wall-clock time.
    pub fn advance(&mut self, delta: TimeDelta) {
        self.now = self.now.checked_add_signed(delta).unwrap_or(self.now);
    }

    /// Trigger and compare mode currently loaded, or `None` if disabled.
    pub fn programmed(&self) -> Option<(AlarmTrigger, AlarmMatch)> {
        self.programmed
    }

    /// Number of successful `program_alarm` calls.
    pub fn program_count(&self) -> usize {
        self.program_count
    }

    /// Whether the alarm-fired flag is raised.
    pub fn fired_flag(&self) -> bool {
        self.fired_flag
    }

    /// Raise the fired flag if the programmed trigger matches the current time.
    ///
    /// Returns `true` when the flag was raised, i.e. the interrupt line falls.
    pub fn tick(&mut self) -> bool {
        match self.programmed {
            Some((trigger, _)) if trigger.matches(&self.now) => {
                self.fired_flag = true;
                true
            }
            _ => false,
        }
    }

    /// Make the next register access fail with [`MockRtcError::Bus`].
    pub fn fail_next(&mut self) {
        self.fail_next = true;
    }

    fn check_bus(&mut self) -> Result<(), MockRtcError> {
        if core::mem::take(&mut self.fail_next) {
            Err(MockRtcError::Bus)
        } else {
            Ok(())
        }
    }
}

impl RtcClock for MockRtc {
    type Error = MockRtcError;

    fn now(&mut self) -> Result<NaiveDateTime, Self::Error> {
        self.check_bus()?;
        Ok(self.now)
    }

    fn program_alarm(
        &mut self,
        trigger: AlarmTrigger,
        mode: AlarmMatch,
    ) -> Result<(), Self::Error> {
        self.check_bus()?;
        self.programmed = Some((trigger, mode));
        self.program_count = self.program_count.saturating_add(1);
        Ok(())
    }

    fn clear_fired_flag(&mut self) -> Result<(), Self::Error> {
        self.check_bus()?;
        self.fired_flag = false;
        Ok(())
    }

    fn disable_alarm(&mut self) -> Result<(), Self::Error> {
        self.check_bus()?;
        self.programmed = None;
        Ok(())
    }
}

/// Error returned by [`MockAudioOutput::connect`] for an empty path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockAudioError {
    /// No file at the given path
    NoSource,
}

/// Mock audio output. A connected source "plays" for a fixed number of polls.
pub struct MockAudioOutput {
    running: bool,
    polls_per_track: u32,
    polls_left: u32,
    connect_count: usize,
    stop_count: usize,
    poll_count: usize,
    volume: u8,
    last_path: heapless::String<64>,
}

impl MockAudioOutput {
    /// Create a mock whose tracks finish after 5 polls.
    pub fn new() -> Self {
        Self::with_track_length(5)
    }

    /// Create a mock whose tracks finish after `polls` polls.
    pub fn with_track_length(polls: u32) -> Self {
        Self {
            running: false,
            polls_per_track: polls,
            polls_left: 0,
            connect_count: 0,
            stop_count: 0,
            poll_count: 0,
            volume: 0,
            last_path: heapless::String::new(),
        }
    }

    /// Number of successful `connect` calls.
    pub fn connect_count(&self) -> usize {
        self.connect_count
    }

    /// Number of `stop` calls.
    pub fn stop_count(&self) -> usize {
        self.stop_count
    }

    /// Number of `poll` calls.
    pub fn poll_count(&self) -> usize {
        self.poll_count
    }

    /// Last volume set, in device steps.
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Path of the most recent `connect`.
    pub fn last_path(&self) -> &str {
        &self.last_path
    }
}

impl Default for MockAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for MockAudioOutput {
    type Error = MockAudioError;

    fn connect(&mut self, path: &str) -> Result<(), Self::Error> {
        if path.is_empty() {
            return Err(MockAudioError::NoSource);
        }
        self.last_path.clear();
        // Paths longer than the buffer are left unrecorded
        let _ = self.last_path.push_str(path);
        self.running = true;
        self.polls_left = self.polls_per_track;
        self.connect_count = self.connect_count.saturating_add(1);
        Ok(())
    }

    fn poll(&mut self) {
        self.poll_count = self.poll_count.saturating_add(1);
        if self.running {
            self.polls_left = self.polls_left.saturating_sub(1);
            if self.polls_left == 0 {
                self.running = false;
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn stop(&mut self) {
        self.running = false;
        self.stop_count = self.stop_count.saturating_add(1);
    }

    fn set_volume(&mut self, steps: u8) {
        self.volume = steps;
    }
}

/// Mock edge-triggered pin. Edges are queued with [`trigger`](Self::trigger).
///
/// [`InterruptPin`] is implemented for `&MockInterruptPin`, so a task can own
/// a shared reference while the test keeps triggering edges.
pub struct MockInterruptPin {
    pending: AtomicU32,
    mode: core::cell::Cell<Option<InterruptMode>>,
}

impl MockInterruptPin {
    /// Create a pin with no pending edges and interrupts disabled.
    pub fn new() -> Self {
        Self {
            pending: AtomicU32::new(0),
            mode: core::cell::Cell::new(None),
        }
    }

    /// Queue one edge.
    pub fn trigger(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Edge the interrupt was enabled for, if any.
    pub fn mode(&self) -> Option<InterruptMode> {
        self.mode.get()
    }
}

impl Default for MockInterruptPin {
    fn default() -> Self {
        Self::new()
    }
}

impl InputPin for &MockInterruptPin {
    type Error = core::convert::Infallible;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.pending.load(Ordering::Acquire) == 0)
    }
}

impl InterruptPin for &MockInterruptPin {
    fn enable_interrupt(&mut self, mode: InterruptMode) -> Result<(), Self::Error> {
        self.mode.set(Some(mode));
        Ok(())
    }

    fn disable_interrupt(&mut self) -> Result<(), Self::Error> {
        self.mode.set(None);
        Ok(())
    }

    async fn wait_for_interrupt(&mut self) -> Result<(), Self::Error> {
        loop {
            let taken = self
                .pending
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
            if taken.is_ok() {
                return Ok(());
            }
            embassy_time::Timer::after_millis(5).await;
        }
    }
}
