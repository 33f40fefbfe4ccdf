//! Looping alarm sound player with auto-timeout.
//!
//! [`AudioLooper`] is driven through a bounded command queue and runs on its
//! own task via [`AudioLooper::run`], which owns the [`AudioOutput`]:
//!
//! ```text
//!            Start(t)                     Stop / timeout
//!   Idle ─────────────────► Playing ─────────────────────► Idle
//!    ▲ │ Stop: discarded      │ │ source ended: reconnect
//!    └─┘                      └─┘ Start(t): restart, re-arm
//! ```
//!
//! While playing the task wakes every `poll_interval` to pump the decoder,
//! so a long track never starves command handling. When the timer expires
//! the output is stopped first and the [`TimeoutListener`] is told after.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Timer};
use platform::{AudioOutput, OutOfRangeError, VolumePercent};

use crate::config::{audio_path_from, ServiceConfig, LOOPER_QUEUE_DEPTH, MAX_AUDIO_PATH_LEN};
use crate::error::ServiceError;

/// Command for the looper task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LooperCommand {
    /// Start (or restart) playback; stop by itself after `timeout_secs`
    /// unless it is 0.
    Start {
        /// Auto-timeout in seconds. 0 means none on a fresh start and
        /// "keep the current deadline" on a restart.
        timeout_secs: u32,
        /// Caller's tag for this session, handed back on timeout.
        session: u32,
    },
    /// Stop playback.
    Stop,
}

/// Notified when playback stops because its timeout expired.
pub trait TimeoutListener {
    /// Called after the output has been stopped. `session` is the tag of the
    /// `Start` that began (or last restarted) the session.
    async fn on_playback_timeout(&self, session: u32);
}

/// Command-driven alarm sound player.
pub struct AudioLooper<M: RawMutex> {
    commands: Channel<M, LooperCommand, LOOPER_QUEUE_DEPTH>,
    audio_path: BlockingMutex<M, RefCell<heapless::String<MAX_AUDIO_PATH_LEN>>>,
    volume: AtomicU8,
    volume_dirty: AtomicBool,
    poll_interval: Duration,
}

impl<M: RawMutex> AudioLooper<M> {
    /// Create an idle looper from `config`.
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            commands: Channel::new(),
            audio_path: BlockingMutex::new(RefCell::new(config.audio_path.clone())),
            volume: AtomicU8::new(config.volume.to_steps(VolumePercent::DEVICE_MAX_STEPS)),
            volume_dirty: AtomicBool::new(true),
            poll_interval: config.poll_interval,
        }
    }

    /// Ask the task to start playing, tagging the session with `session`.
    pub fn start(&self, timeout_secs: u32, session: u32) -> Result<(), ServiceError> {
        self.send(LooperCommand::Start {
            timeout_secs,
            session,
        })
    }

    /// Ask the task to stop playing.
    pub fn stop(&self) -> Result<(), ServiceError> {
        self.send(LooperCommand::Stop)
    }

    fn send(&self, command: LooperCommand) -> Result<(), ServiceError> {
        self.commands
            .try_send(command)
            .map_err(|_| ServiceError::LooperBusy)
    }

    /// Replace the sound file used by the next `Start`.
    ///
    /// A session already playing keeps its source, including when the track
    /// ends and loops, until it is restarted.
    pub fn set_audio_path(&self, path: &str) -> Result<(), OutOfRangeError> {
        let path = audio_path_from(path)?;
        self.audio_path.lock(|cell| *cell.borrow_mut() = path);
        Ok(())
    }

    /// Current sound file.
    pub fn audio_path(&self) -> heapless::String<MAX_AUDIO_PATH_LEN> {
        self.audio_path.lock(|cell| cell.borrow().clone())
    }

    /// Set output volume in device steps; applied by the task on its next
    /// wake-up.
    pub fn set_volume(&self, steps: u8) {
        self.volume.store(steps, Ordering::Release);
        self.volume_dirty.store(true, Ordering::Release);
    }

    /// Last volume requested, in device steps.
    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Acquire)
    }

    /// Looper task body. Never returns.
    pub async fn run<O, L>(&self, output: &mut O, listener: &L)
    where
        O: AudioOutput,
        L: TimeoutListener,
    {
        loop {
            let (timeout_secs, session) = self.wait_for_start().await;
            self.play(output, listener, timeout_secs, session).await;
        }
    }

    async fn wait_for_start(&self) -> (u32, u32) {
        loop {
            match self.commands.receive().await {
                LooperCommand::Start {
                    timeout_secs,
                    session,
                } => return (timeout_secs, session),
                LooperCommand::Stop => tracing::trace!("looper idle, discarding stop"),
            }
        }
    }

    async fn play<O, L>(&self, output: &mut O, listener: &L, timeout_secs: u32, mut session: u32)
    where
        O: AudioOutput,
        L: TimeoutListener,
    {
        let mut deadline = Self::deadline(timeout_secs);
        // Fixed for the whole session
        let mut path = self.audio_path();
        self.apply_volume(output);
        Self::connect(output, &path);
        tracing::info!("alarm sound started, timeout {}s", timeout_secs);

        loop {
            self.apply_volume(output);
            output.poll();
            if !output.is_running() {
                tracing::trace!("alarm sound ended, looping");
                Self::connect(output, &path);
            }

            if deadline.is_some_and(|at| Instant::now() >= at) {
                output.stop();
                tracing::warn!("alarm sound timed out");
                listener.on_playback_timeout(session).await;
                return;
            }

            match select(self.commands.receive(), Timer::after(self.poll_interval)).await {
                Either::First(LooperCommand::Stop) => {
                    output.stop();
                    tracing::info!("alarm sound stopped");
                    return;
                }
                Either::First(LooperCommand::Start {
                    timeout_secs,
                    session: restarted,
                }) => {
                    if timeout_secs > 0 {
                        deadline = Self::deadline(timeout_secs);
                    }
                    session = restarted;
                    path = self.audio_path();
                    Self::connect(output, &path);
                    tracing::info!("alarm sound restarted, timeout {}s", timeout_secs);
                }
                Either::Second(()) => {}
            }
        }
    }

    fn deadline(timeout_secs: u32) -> Option<Instant> {
        (timeout_secs > 0)
            .then(|| Instant::now().checked_add(Duration::from_secs(u64::from(timeout_secs))))
            .flatten()
    }

    fn connect<O: AudioOutput>(output: &mut O, path: &str) {
        if let Err(e) = output.connect(path) {
            tracing::error!(error = ?e, "cannot open {}", path);
        }
    }

    fn apply_volume<O: AudioOutput>(&self, output: &mut O) {
        if self.volume_dirty.swap(false, Ordering::AcqRel) {
            output.set_volume(self.volume());
        }
    }
}
