//! Identify LED: lights the badge's status LED so a person can find it.
//!
//! Generic over `embedded-hal` pins and delays.  On ESP-IDF the pin is a
//! `PinDriver` and the delay is `esp_idf_hal::delay::FreeRtos`; host
//! builds use a recording pin.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{info, warn};

pub struct IdentifyLed<P: OutputPin, D: DelayNs> {
    pin: P,
    delay: D,
}

impl<P: OutputPin, D: DelayNs> IdentifyLed<P, D> {
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }

    /// Light the LED for `timeout_secs` seconds.  Blocks the caller.
    pub fn flash(&mut self, timeout_secs: u16) {
        info!("LED: identify for {timeout_secs} s");
        if self.pin.set_high().is_err() {
            warn!("LED: failed to switch on");
            return;
        }
        self.delay.delay_ms(u32::from(timeout_secs) * 1000);
        if self.pin.set_low().is_err() {
            warn!("LED: failed to switch off");
        }
    }
}

// ── Host pin ─────────────────────────────────────────────────

/// An output pin that only remembers its level and how often it changed.
#[derive(Debug, Default)]
pub struct RecordingPin {
    high: bool,
    transitions: u32,
}

impl RecordingPin {
    pub fn is_high(&self) -> bool {
        self.high
    }

    pub fn transitions(&self) -> u32 {
        self.transitions
    }
}

impl embedded_hal::digital::ErrorType for RecordingPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        self.transitions += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        self.transitions += 1;
        Ok(())
    }
}

/// A delay that returns immediately and sums the requested time.
#[derive(Debug, Default)]
pub struct NoDelay {
    pub total_ns: u64,
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}
