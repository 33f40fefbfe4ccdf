//! Audio output abstraction

/// Audio output trait for a file-backed player (decoder + I2S sink).
///
/// The player is pumped by its owner: after [`connect`](AudioOutput::connect)
/// the owner must call [`poll`](AudioOutput::poll) frequently to keep the
/// decoder fed. [`is_running`](AudioOutput::is_running) turns false once the
/// source has played to its end.
pub trait AudioOutput {
    /// Error type
    type Error: core::fmt::Debug;

    /// Open `path` on the storage card and start playing it from the beginning.
    fn connect(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Decode and push the next chunk of samples.
    fn poll(&mut self);

    /// Whether a source is currently playing.
    fn is_running(&self) -> bool;

    /// Stop playback and release the source.
    fn stop(&mut self);

    /// Set output volume in device steps (see [`crate::audio_types::VolumePercent::to_steps`]).
    fn set_volume(&mut self, steps: u8);
}
