//! Audio domain newtypes for compile-time safety.
//!
//! - `VolumePercent`: clamps 0–100, maps onto the device's step range
//! - `OutOfRangeError`: shared rejection type for range-checked newtypes

use thiserror::Error;

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("value {value} out of range {min}..={max}")]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: u32,
    /// The inclusive minimum allowed value.
    pub min: u32,
    /// The inclusive maximum allowed value.
    pub max: u32,
}

// ── VolumePercent ────────────────────────────────────────────────────────────

/// Volume as a percentage, clamped to 0–100.
///
/// Wraps a `u8` with the invariant `0 <= value <= 100`.
/// Construct with [`VolumePercent::new`] (clamping) or
/// [`VolumePercent::try_new`] (fallible, strict).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct VolumePercent(u8);

impl VolumePercent {
    /// Number of volume steps exposed by the I2S audio library.
    pub const DEVICE_MAX_STEPS: u8 = 21;

    /// Create a `VolumePercent`, clamping values above 100 to 100.
    #[must_use]
    pub fn new(value: u8) -> Self {
        Self(value.min(100))
    }

    /// Create a `VolumePercent`, returning an error if `value > 100`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `value > 100`.
    pub fn try_new(value: u8) -> Result<Self, OutOfRangeError> {
        if value > 100 {
            Err(OutOfRangeError {
                value: u32::from(value),
                min: 0,
                max: 100,
            })
        } else {
            Ok(Self(value))
        }
    }

    /// Return the inner volume value (0–100).
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Map the percentage linearly onto `0..=max_steps`, truncating.
    ///
    /// Formula: `steps = percent * max_steps / 100`
    #[must_use]
    pub fn to_steps(self, max_steps: u8) -> u8 {
        // 100 * 255 fits in u16 and the quotient never exceeds max_steps
        u16::from(self.0)
            .checked_mul(u16::from(max_steps))
            .and_then(|scaled| scaled.checked_div(100))
            .and_then(|steps| u8::try_from(steps).ok())
            .unwrap_or(max_steps)
    }
}

impl Default for VolumePercent {
    fn default() -> Self {
        Self(50)
    }
}
