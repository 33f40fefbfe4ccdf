//! Console stand-in for the MP3 decoder + I2S sink.

use std::convert::Infallible;
use std::io::Write;

/// Polls per simulated track (about 2 s at the default poll interval).
const TRACK_POLLS: u32 = 2000;

/// Prints a bell line per simulated beat instead of producing sound.
#[derive(Default)]
pub struct ConsoleAudio {
    source: Option<String>,
    remaining: u32,
    volume: u8,
}

impl ConsoleAudio {
    pub fn new() -> Self {
        Self::default()
    }
}

impl platform::AudioOutput for ConsoleAudio {
    type Error = Infallible;

    fn connect(&mut self, path: &str) -> Result<(), Self::Error> {
        println!("\x07  RING RING  ({path}, volume {})", self.volume);
        let _ = std::io::stdout().flush();
        self.source = Some(path.to_owned());
        self.remaining = TRACK_POLLS;
        Ok(())
    }

    fn poll(&mut self) {
        if self.source.is_some() {
            self.remaining = self.remaining.saturating_sub(1);
            if self.remaining == 0 {
                self.source = None;
            }
        }
    }

    fn is_running(&self) -> bool {
        self.source.is_some()
    }

    fn stop(&mut self) {
        if self.source.take().is_some() {
            println!("  (silence)");
        }
    }

    fn set_volume(&mut self, steps: u8) {
        self.volume = steps;
        tracing::debug!("volume: {} steps", steps);
    }
}
