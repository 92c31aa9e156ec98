//! System configuration parameters
//!
//! Tunable timing and identity parameters for the badge.  The defaults
//! match the deployed firmware; a JSON override can be baked in at build
//! time through `BADGE_CONFIG_JSON`.

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Core badge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BadgeConfig {
    // --- Protocol ---
    /// How long the reassembler waits for each read stage (milliseconds)
    pub await_data_timeout_ms: u32,
    /// Timeout handed to every transmit attempt (milliseconds)
    pub transmit_timeout_ms: u32,
    /// Transmit attempts per response before the link is dropped
    pub max_transmit_attempts: u8,

    // --- Clock ---
    /// Rate of the tick counter stamped onto notifications (Hz)
    pub clock_ticks_per_second: u32,

    // --- Identity ---
    /// Badge id advertised until the hub assigns one
    pub reset_badge_id: u16,
    /// Group advertised until the hub assigns one
    pub reset_badge_group: u8,
    /// Label returned by the firmware-version request
    pub firmware_version: heapless::String<32>,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        let mut firmware_version = heapless::String::new();
        let _ = firmware_version.push_str(env!("CARGO_PKG_VERSION"));

        Self {
            // Protocol
            await_data_timeout_ms: 1000,
            transmit_timeout_ms: 100,
            max_transmit_attempts: 50,

            // Clock
            clock_ticks_per_second: 32_768, // RTC crystal

            // Identity
            reset_badge_id: 0xFFFF,
            reset_badge_group: 0,
            firmware_version,
        }
    }
}

impl BadgeConfig {
    /// Parse a JSON override; absent fields keep their defaults.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let config: Self =
            serde_json::from_slice(bytes).map_err(|_| Error::Config("invalid JSON override"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would wedge the protocol engine.
    pub fn validate(&self) -> Result<()> {
        if self.await_data_timeout_ms == 0 {
            return Err(Error::Config("await_data_timeout_ms must be non-zero"));
        }
        if self.transmit_timeout_ms == 0 {
            return Err(Error::Config("transmit_timeout_ms must be non-zero"));
        }
        if self.max_transmit_attempts == 0 {
            return Err(Error::Config("max_transmit_attempts must be non-zero"));
        }
        if self.clock_ticks_per_second == 0 {
            return Err(Error::Config("clock_ticks_per_second must be non-zero"));
        }
        Ok(())
    }

    pub fn await_data_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.await_data_timeout_ms))
    }

    pub fn transmit_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.transmit_timeout_ms))
    }
}
