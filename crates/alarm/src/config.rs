//! Engine limits and runtime configuration.
//!
//! Queue depths and table sizes are compile-time constants because the engine
//! is allocation-free. Everything a board or the simulator may want to tune at
//! start-up lives in [`ServiceConfig`].

use embassy_time::Duration;
use platform::{OutOfRangeError, VolumePercent};

/// Depth of the interrupt → event-loop command queue.
///
/// Two interrupt sources each push at most one command per edge; three slots
/// absorb a fire and a stop arriving while the loop holds the state lock.
pub const COMMAND_QUEUE_DEPTH: usize = 3;

/// Depth of the engine → audio looper command queue.
pub const LOOPER_QUEUE_DEPTH: usize = 10;

/// Maximum number of logical alarms. Must be a power of two (index map).
pub const MAX_ALARMS: usize = 32;

/// Maximum number of schedule entries: one per weekday for every alarm.
pub const MAX_HARDWARE_ALARMS: usize = 7 * MAX_ALARMS;

/// Maximum length of the alarm sound path on the storage card.
pub const MAX_AUDIO_PATH_LEN: usize = 64;

/// Audio path used when none is configured.
pub const DEFAULT_AUDIO_PATH: &str = "/test.mp3";

/// Runtime configuration for [`AlarmService`](crate::AlarmService) and
/// [`AudioLooper`](crate::AudioLooper).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Seconds an alarm plays before it is given up as missed (0 = forever).
    pub playback_timeout_secs: u32,
    /// Sound file looped while an alarm is ringing.
    pub audio_path: heapless::String<MAX_AUDIO_PATH_LEN>,
    /// How often the looper pumps the decoder while playing.
    pub poll_interval: Duration,
    /// Initial output volume.
    pub volume: VolumePercent,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let mut audio_path = heapless::String::new();
        // DEFAULT_AUDIO_PATH is far below MAX_AUDIO_PATH_LEN
        let _ = audio_path.push_str(DEFAULT_AUDIO_PATH);
        Self {
            playback_timeout_secs: 100,
            audio_path,
            poll_interval: Duration::from_millis(1),
            volume: VolumePercent::default(),
        }
    }
}

impl ServiceConfig {
    /// Set the playback auto-timeout.
    #[must_use]
    pub fn with_playback_timeout_secs(mut self, secs: u32) -> Self {
        self.playback_timeout_secs = secs;
        self
    }

    /// Set the alarm sound path.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if the path is empty or longer than
    /// [`MAX_AUDIO_PATH_LEN`].
    pub fn with_audio_path(mut self, path: &str) -> Result<Self, OutOfRangeError> {
        self.audio_path = audio_path_from(path)?;
        Ok(self)
    }

    /// Set the decoder poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the initial volume.
    #[must_use]
    pub fn with_volume(mut self, volume: VolumePercent) -> Self {
        self.volume = volume;
        self
    }
}

pub(crate) fn audio_path_from(
    path: &str,
) -> Result<heapless::String<MAX_AUDIO_PATH_LEN>, OutOfRangeError> {
    let out_of_range = || OutOfRangeError {
        value: u32::try_from(path.len()).unwrap_or(u32::MAX),
        min: 1,
        max: u32::try_from(MAX_AUDIO_PATH_LEN).unwrap_or(u32::MAX),
    };
    if path.is_empty() {
        return Err(out_of_range());
    }
    let mut out = heapless::String::new();
    out.push_str(path).map_err(|_| out_of_range())?;
    Ok(out)
}
