//! Application identity constants
//!
//! Branding shared by the firmware and the desktop simulator.

/// The application name
pub const APP_NAME: &str = "Bedside Alarm Clock";

/// Application version (synchronized with Cargo.toml)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
