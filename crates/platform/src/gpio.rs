//! GPIO interrupt lines
//!
//! The alarm clock uses two edge-triggered inputs: the RTC's open-drain
//! alarm output (falls when the alarm fires) and the stop button (rises on
//! press).

/// Input pin operations
pub trait InputPin {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read pin state
    fn is_high(&self) -> Result<bool, Self::Error>;

    /// Read pin state (inverted)
    fn is_low(&self) -> Result<bool, Self::Error> {
        self.is_high().map(|v| !v)
    }
}

/// External interrupt configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptMode {
    /// Trigger on rising edge
    RisingEdge,
    /// Trigger on falling edge
    FallingEdge,
}

/// Pin with interrupt capability
pub trait InterruptPin: InputPin {
    /// Enable interrupt
    fn enable_interrupt(&mut self, mode: InterruptMode) -> Result<(), Self::Error>;

    /// Disable interrupt
    fn disable_interrupt(&mut self) -> Result<(), Self::Error>;

    /// Wait for the configured edge (async)
    fn wait_for_interrupt(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;
}
