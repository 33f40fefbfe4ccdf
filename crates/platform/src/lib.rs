//! Hardware Abstraction Layer (HAL) for the bedside alarm clock
//!
//! This crate provides trait-based abstractions for the clock's hardware,
//! enabling development and testing without physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (simulator / firmware binary)
//!         ↓
//! Alarm engine (alarm crate)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (Embassy HAL + RTC / I2S drivers)
//! ```
//!
//! # Peripherals
//!
//! - [`RtcClock`] - Real-time clock with one programmable alarm register
//! - [`AudioOutput`] - File-backed audio player
//! - [`InterruptPin`] - Edge-triggered inputs (RTC alarm line, stop button)
//!
//! # Features
//!
//! - `std`: Enable standard library support and the [`mocks`] module
//! - `defmt`: Enable defmt logging
//!
//! # Example
//!
//! ```no_run
//! use platform::{AlarmTrigger, RtcClock};
//!
//! fn arm<R: RtcClock>(rtc: &mut R) -> Result<(), R::Error> {
//!     let trigger = AlarmTrigger::daily(7, 30);
//!     rtc.program_alarm(trigger, trigger.mode())
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors — callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod audio;
pub mod audio_types;
pub mod config;
pub mod gpio;
pub mod rtc;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

pub use audio::AudioOutput;
pub use audio_types::{OutOfRangeError, VolumePercent};
pub use gpio::{InputPin, InterruptMode, InterruptPin};
pub use rtc::{AlarmMatch, AlarmTrigger, RtcClock};
