//! Interrupt → event-loop command protocol.
//!
//! # Architecture
//!
//! Two edge-triggered lines feed one bounded [`Channel`] owned by the
//! [`AlarmService`](crate::AlarmService):
//!
//! | Line            | Edge    | Command               |
//! |-----------------|---------|-----------------------|
//! | RTC alarm (INT) | falling | [`Command::FireAlarm`] |
//! | Stop button     | rising  | [`Command::StopAlarm`] |
//!
//! The interrupt side only ever calls [`InterruptHandle::send`], which is a
//! non-blocking `try_send`: no lock is taken on the engine's state and nothing
//! waits. A full queue drops the command. A dropped stop only delays the
//! manual stop until the next press.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use platform::{InterruptMode, InterruptPin};

use crate::config::COMMAND_QUEUE_DEPTH;

/// Fixed-size command pushed from interrupt context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// The RTC alarm register matched.
    FireAlarm,
    /// The stop button was pressed.
    StopAlarm,
}

impl Command {
    /// Short name for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Command::FireAlarm => "FireAlarm",
            Command::StopAlarm => "StopAlarm",
        }
    }
}

pub(crate) type CommandChannel<M> = Channel<M, Command, COMMAND_QUEUE_DEPTH>;

/// Opaque context handed to interrupt registration.
///
/// Holds only the sending side of the command queue, so it is safe to call
/// from interrupt context.
pub struct InterruptHandle<'a, M: RawMutex> {
    commands: &'a CommandChannel<M>,
}

impl<M: RawMutex> Clone for InterruptHandle<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex> Copy for InterruptHandle<'_, M> {}

impl<'a, M: RawMutex> InterruptHandle<'a, M> {
    pub(crate) fn new(commands: &'a CommandChannel<M>) -> Self {
        Self { commands }
    }

    /// Enqueue `command` without blocking.
    ///
    /// Returns `false` if the queue was full and the command was dropped.
    pub fn send(&self, command: Command) -> bool {
        if self.commands.try_send(command).is_ok() {
            true
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!("alarm command queue full, dropped {}", command);
            false
        }
    }

    /// RTC alarm line fell.
    pub fn alarm_fired(&self) -> bool {
        self.send(Command::FireAlarm)
    }

    /// Stop button rose.
    pub fn stop_pressed(&self) -> bool {
        self.send(Command::StopAlarm)
    }
}

/// Forward every `mode` edge on `pin` to the engine as `command`.
///
/// Runs until the pin reports an error. Spawn one per interrupt line:
///
/// ```ignore
/// join(
///     interrupt_task(rtc_int, InterruptMode::FallingEdge, handle, Command::FireAlarm),
///     interrupt_task(stop_btn, InterruptMode::RisingEdge, handle, Command::StopAlarm),
/// )
/// .await;
/// ```
pub async fn interrupt_task<P, M>(
    mut pin: P,
    mode: InterruptMode,
    handle: InterruptHandle<'_, M>,
    command: Command,
) -> Result<(), P::Error>
where
    P: InterruptPin,
    M: RawMutex,
{
    pin.enable_interrupt(mode)?;
    loop {
        pin.wait_for_interrupt().await?;
        if !handle.send(command) {
            tracing::warn!("interrupt command {} dropped, queue full", command.as_str());
        }
    }
}
