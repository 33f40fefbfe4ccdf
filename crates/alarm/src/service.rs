//! The alarm scheduling engine.
//!
//! [`AlarmService`] owns every [`Alarm`], keeps their [`HardwareAlarm`]s in a
//! [`Schedule`], and keeps the RTC's single alarm register loaded with the
//! earliest enabled entry.
//!
//! # Locking
//!
//! Two locks are involved:
//!
//! - the **state lock**, private to the service, guarding the alarm table,
//!   the schedule and the running-alarm marker;
//! - the **hardware lock**, a `Mutex<M, R>` around the RTC that is shared
//!   with other subsystems (time display, network time sync).
//!
//! The state lock is always taken first and the hardware lock only for the
//! few register accesses that need it, never re-entrantly. The event loop
//! follows the same order as the public API, so they cannot deadlock.
//!
//! # Firing
//!
//! Interrupts enqueue a [`Command`] through [`InterruptHandle`]; [`run`]
//! drains the queue and, for `FireAlarm`:
//!
//! 1. clears the RTC fired flag and reads the time;
//! 2. takes the first enabled schedule entry as the one that fired;
//! 3. collects the entries right behind it that trigger at the same instant;
//! 4. advances each (one-shot: disable the parent; otherwise reschedule),
//!    marking the colliding ones missed;
//! 5. reconciles and reprograms the register;
//! 6. starts the looper unless another alarm is already ringing.
//!
//! [`run`]: AlarmService::run

use chrono::NaiveDateTime;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use platform::{RtcClock, VolumePercent};

use crate::alarm::{Alarm, AlarmId, AlarmTime};
use crate::config::{ServiceConfig, MAX_ALARMS, MAX_HARDWARE_ALARMS};
use crate::days::DaysOfWeek;
use crate::error::ServiceError;
use crate::hw_alarm::HardwareAlarm;
use crate::irq::{Command, CommandChannel, InterruptHandle};
use crate::looper::{AudioLooper, TimeoutListener};
use crate::schedule::{AlarmTable, Schedule};

/// Everything guarded by the state lock.
struct ServiceState {
    alarms: AlarmTable,
    schedule: Schedule,
    running: Option<AlarmId>,
    /// Tag of the last looper session started.
    session: u32,
}

/// Alarm scheduling engine.
pub struct AlarmService<'a, M: RawMutex, R: RtcClock> {
    state: Mutex<M, ServiceState>,
    rtc: &'a Mutex<M, R>,
    looper: &'a AudioLooper<M>,
    commands: CommandChannel<M>,
    config: ServiceConfig,
}

impl<'a, M: RawMutex, R: RtcClock> AlarmService<'a, M, R> {
    /// Create a service with no alarms.
    ///
    /// `rtc` is the shared hardware lock; `looper` must be run on its own
    /// task with this service as its [`TimeoutListener`].
    pub fn new(rtc: &'a Mutex<M, R>, looper: &'a AudioLooper<M>, config: ServiceConfig) -> Self {
        Self {
            state: Mutex::new(ServiceState {
                alarms: AlarmTable::new(),
                schedule: Schedule::new(),
                running: None,
                session: 0,
            }),
            rtc,
            looper,
            commands: Channel::new(),
            config,
        }
    }

    /// Reset the RTC alarm: clear a stale fired flag and disable the
    /// register until the first alarm is added.
    pub async fn begin(&self) -> Result<(), ServiceError> {
        {
            let mut rtc = self.rtc.lock().await;
            rtc.clear_fired_flag().map_err(clock_error)?;
            rtc.disable_alarm().map_err(clock_error)?;
        }
        tracing::info!("alarm service started");
        Ok(())
    }

    /// Handle for the interrupt handlers.
    pub fn interrupts(&self) -> InterruptHandle<'_, M> {
        InterruptHandle::new(&self.commands)
    }

    // ── Mutating API ────────────────────────────────────────────────────────

    /// Add `alarm` and schedule its occurrences. Returns its id.
    ///
    /// An alarm whose id is already present replaces the existing one.
    pub async fn add_alarm(&self, alarm: Alarm) -> Result<AlarmId, ServiceError> {
        let mut state = self.state.lock().await;
        let state = &mut *state;
        let id = alarm.id();
        tracing::debug!("adding alarm ({})", alarm);

        let existing = state.schedule.iter().filter(|e| e.parent() == id).count();
        let entries = HardwareAlarm::from_alarm(&alarm);
        let table_full = !state.alarms.contains_key(&id) && state.alarms.len() >= MAX_ALARMS;
        let schedule_full =
            entries.len() > state.schedule.remaining_capacity().saturating_add(existing);
        if table_full || schedule_full {
            tracing::warn!("cannot add alarm ({}): capacity exceeded", alarm);
            return Err(ServiceError::CapacityExceeded);
        }

        let now = self.now().await?;
        if state.schedule.remove_alarm(id) > 0 {
            tracing::warn!("alarm id {} already present, replacing it", id);
        }
        state
            .alarms
            .insert(id, alarm)
            .map_err(|_| ServiceError::CapacityExceeded)?;
        for entry in entries {
            state
                .schedule
                .insert(entry, &now, &state.alarms)
                .map_err(|_| ServiceError::CapacityExceeded)?;
        }
        self.update_alarms(state).await?;
        tracing::info!("added alarm ({})", alarm);
        Ok(id)
    }

    /// Remove an alarm and all its occurrences.
    pub async fn remove_alarm(&self, id: AlarmId) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        let state = &mut *state;
        let alarm = state.alarms.remove(&id).ok_or(ServiceError::NotFound(id))?;
        state.schedule.remove_alarm(id);
        tracing::info!("removed alarm ({})", alarm);
        self.update_alarms(state).await
    }

    /// Enable or disable an alarm.
    ///
    /// Only the flag changes; the register is not reprogrammed and a
    /// disabled entry is relocated lazily the next time it reaches the front
    /// of the schedule. Consequences until the next add, remove or reschedule:
    ///
    /// - enabling an alarm while the register is disabled (every alarm off)
    ///   does not arm it;
    /// - disabling the loaded alarm leaves the register armed, and when it
    ///   fires the first enabled entry is treated as the one that fired.
    pub async fn set_alarm_state(&self, id: AlarmId, enabled: bool) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        let alarm = state.alarms.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
        alarm.enabled = enabled;
        tracing::info!(
            "alarm ({}) is {}",
            alarm,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Move an alarm to a new time of day.
    pub async fn set_alarm_time(&self, id: AlarmId, time: AlarmTime) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        let now = self.existing_now(&state, id).await?;
        let alarm = state.alarms.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
        alarm.time = time;
        tracing::info!("alarm ({}) rescheduled", alarm);
        self.reschedule(&mut state, id, &now).await
    }

    /// Change an alarm's repeat pattern.
    pub async fn set_alarm_days_of_week(
        &self,
        id: AlarmId,
        days: DaysOfWeek,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        let now = self.existing_now(&state, id).await?;
        let alarm = state.alarms.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
        alarm.days = days;
        tracing::info!("alarm ({}) repeats on new days", alarm);
        self.reschedule(&mut state, id, &now).await
    }

    /// Acknowledge a missed alarm.
    pub async fn clear_missed_flag(&self, id: AlarmId) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        let alarm = state.alarms.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
        alarm.missed = false;
        tracing::info!("alarm ({}) acknowledged", alarm);
        Ok(())
    }

    /// Set the alarm sound volume. Does not touch the state lock.
    pub fn set_volume(&self, volume: VolumePercent) {
        self.looper
            .set_volume(volume.to_steps(VolumePercent::DEVICE_MAX_STEPS));
        tracing::info!("volume set to {}%", volume.get());
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// Copy of one alarm.
    pub async fn alarm(&self, id: AlarmId) -> Option<Alarm> {
        self.state.lock().await.alarms.get(&id).copied()
    }

    /// Copy of every alarm, in table order.
    pub async fn alarms(&self) -> heapless::Vec<Alarm, MAX_ALARMS> {
        self.state
            .lock()
            .await
            .alarms
            .values()
            .copied()
            .collect()
    }

    /// Copy of the schedule, in firing order.
    pub async fn schedule(&self) -> heapless::Vec<HardwareAlarm, MAX_HARDWARE_ALARMS> {
        self.state.lock().await.schedule.snapshot()
    }

    /// Id of the alarm currently ringing.
    pub async fn running_alarm(&self) -> Option<AlarmId> {
        self.state.lock().await.running
    }

    /// Whether any alarm is ringing.
    pub async fn is_alarm_running(&self) -> bool {
        self.running_alarm().await.is_some()
    }

    /// Log the alarm table and the schedule.
    pub async fn dump_alarms(&self) {
        let state = self.state.lock().await;
        dump(&state);
    }

    // ── Event loop ──────────────────────────────────────────────────────────

    /// Event loop task body. Never returns.
    pub async fn run(&self) {
        loop {
            let command = self.commands.receive().await;
            self.handle(command).await;
        }
    }

    /// Handle every queued command without waiting for new ones.
    ///
    /// Returns the number of commands handled.
    pub async fn process_pending(&self) -> usize {
        let mut handled = 0usize;
        while let Ok(command) = self.commands.try_receive() {
            self.handle(command).await;
            handled = handled.saturating_add(1);
        }
        handled
    }

    async fn handle(&self, command: Command) {
        let mut state = self.state.lock().await;
        let result = match command {
            Command::FireAlarm => self.on_alarm_fired(&mut state).await,
            Command::StopAlarm => self.on_alarm_stopped(&mut state),
        };
        if let Err(e) = result {
            tracing::error!("handling {} failed: {}", command.as_str(), e);
        }
    }

    async fn on_alarm_fired(&self, state: &mut ServiceState) -> Result<(), ServiceError> {
        let now = {
            let mut rtc = self.rtc.lock().await;
            rtc.clear_fired_flag().map_err(clock_error)?;
            rtc.now().map_err(clock_error)?
        };

        let Some(index) = state.schedule.first_enabled(&state.alarms) else {
            tracing::warn!("alarm fired but no alarm is enabled");
            return Ok(());
        };
        let Some(just_fired) = state.schedule.get(index).copied() else {
            return Ok(());
        };
        tracing::warn!("hardware alarm ({}) fired", just_fired);

        // Entries right behind that trigger at the same instant
        let mut collisions: heapless::Vec<HardwareAlarm, MAX_HARDWARE_ALARMS> =
            heapless::Vec::new();
        for entry in state.schedule.iter().skip(index.saturating_add(1)) {
            if !entry.triggers_at(&now) {
                break;
            }
            if state.alarms.get(&entry.parent()).is_some_and(|a| a.enabled) {
                let _ = collisions.push(*entry);
            }
        }

        advance(state, index, &now);
        for entry in collisions {
            tracing::warn!(
                "hardware alarm ({}) fired together with ({}), skipping it",
                entry,
                just_fired
            );
            if let Some(alarm) = state.alarms.get_mut(&entry.parent()) {
                alarm.missed = true;
            }
            if let Some(position) = state.schedule.position_of(&entry) {
                advance(state, position, &now);
            }
        }

        self.update_alarms(state).await?;
        dump(state);

        if let Some(running) = state.running {
            tracing::warn!(
                "alarm {} is still ringing, so {} is skipped",
                running,
                just_fired.parent()
            );
        } else {
            let session = state.session.wrapping_add(1);
            self.looper
                .start(self.config.playback_timeout_secs, session)?;
            state.session = session;
            state.running = Some(just_fired.parent());
            tracing::warn!("started alarm {} ringing", just_fired.parent());
        }
        Ok(())
    }

    fn on_alarm_stopped(&self, state: &mut ServiceState) -> Result<(), ServiceError> {
        let Some(id) = state.running else {
            return Ok(());
        };
        self.looper.stop()?;
        state.running = None;
        tracing::warn!("stopped alarm {} ringing", id);
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────────────

    async fn now(&self) -> Result<NaiveDateTime, ServiceError> {
        self.rtc.lock().await.now().map_err(clock_error)
    }

    /// Current time, once `id` is known to exist. Fails before any mutation.
    async fn existing_now(
        &self,
        state: &ServiceState,
        id: AlarmId,
    ) -> Result<NaiveDateTime, ServiceError> {
        if !state.alarms.contains_key(&id) {
            tracing::error!("there is no alarm with id {}", id);
            return Err(ServiceError::NotFound(id));
        }
        self.now().await
    }

    /// Regenerate the occurrences of `id` after its time or days changed.
    async fn reschedule(
        &self,
        state: &mut ServiceState,
        id: AlarmId,
        now: &NaiveDateTime,
    ) -> Result<(), ServiceError> {
        state.schedule.remove_alarm(id);
        let Some(alarm) = state.alarms.get(&id).copied() else {
            return Err(ServiceError::NotFound(id));
        };
        for entry in HardwareAlarm::from_alarm(&alarm) {
            state
                .schedule
                .insert(entry, now, &state.alarms)
                .map_err(|_| ServiceError::CapacityExceeded)?;
        }
        self.update_alarms(state).await
    }

    /// Reconcile the schedule and load its head into the register.
    async fn update_alarms(&self, state: &mut ServiceState) -> Result<(), ServiceError> {
        let now = self.now().await?;
        let head = state.schedule.reconcile(&now, &state.alarms);

        let mut rtc = self.rtc.lock().await;
        match head {
            Some(entry) => {
                let trigger = entry.trigger();
                rtc.program_alarm(trigger, trigger.mode())
                    .map_err(clock_error)?;
                tracing::debug!("programmed RTC alarm for ({})", entry);
            }
            None => {
                rtc.disable_alarm().map_err(clock_error)?;
                tracing::warn!("no enabled alarm, RTC alarm disabled");
            }
        }
        Ok(())
    }
}

impl<M: RawMutex, R: RtcClock> TimeoutListener for AlarmService<'_, M, R> {
    /// The ringing alarm was not stopped by hand: mark it missed.
    ///
    /// A timeout from an earlier session (stopped and replaced while the
    /// looper was reporting) is ignored.
    async fn on_playback_timeout(&self, session: u32) {
        let mut state = self.state.lock().await;
        if session != state.session {
            tracing::debug!("ignoring timeout of stale session {}", session);
            return;
        }
        let Some(id) = state.running.take() else {
            return;
        };
        match state.alarms.get_mut(&id) {
            Some(alarm) => {
                alarm.missed = true;
                tracing::warn!("missed alarm ({})", alarm);
            }
            None => tracing::warn!("missed alarm {} which was deleted", id),
        }
    }
}

/// One-shot: disable the parent. Otherwise move the entry to its next cycle.
fn advance(state: &mut ServiceState, index: usize, now: &NaiveDateTime) {
    let Some(entry) = state.schedule.get(index).copied() else {
        return;
    };
    let one_shot = state
        .alarms
        .get(&entry.parent())
        .is_some_and(Alarm::is_one_shot);
    if one_shot {
        if let Some(alarm) = state.alarms.get_mut(&entry.parent()) {
            alarm.enabled = false;
        }
    } else if let Some(entry) = state.schedule.take(index) {
        // Slot just freed
        let _ = state.schedule.insert(entry, now, &state.alarms);
    }
}

fn dump(state: &ServiceState) {
    tracing::warn!("alarms:");
    for alarm in state.alarms.values() {
        tracing::warn!("\t({})", alarm);
    }
    tracing::warn!("schedule:");
    for entry in state.schedule.iter() {
        let enabled = state.alarms.get(&entry.parent()).is_some_and(|a| a.enabled);
        tracing::warn!("\t[{}]({})", if enabled { "X" } else { " " }, entry);
    }
}

fn clock_error<E: core::fmt::Debug>(e: E) -> ServiceError {
    tracing::error!(error = ?e, "RTC access failed");
    ServiceError::Clock
}
