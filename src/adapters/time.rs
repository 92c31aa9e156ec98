//! Tick counter and controller-synchronised wall clock.
//!
//! - **`target_os = "espidf"`**: ticks derive from `esp_timer_get_time()`
//!   (microsecond precision, monotonic), scaled to the configured rate.
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` for
//!   host-side runs.
//!
//! [`SystickClock`] anchors the tick counter to the controller's wall time
//! each time a request carries a timestamp.  [`SharedClock`] lets the BLE
//! write callback stamp notifications with the same clock the request
//! handlers sync.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::debug;

use crate::app::ports::ClockPort;
use crate::rpc::messages::Timestamp;

/// A free-running tick counter.
pub trait TickSource {
    fn ticks(&self) -> u64;
    fn ticks_per_second(&self) -> u32;
}

/// Platform monotonic counter.
pub struct MonotonicTicks {
    ticks_per_second: u32,
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl MonotonicTicks {
    pub fn new(ticks_per_second: u32) -> Self {
        Self {
            ticks_per_second: ticks_per_second.max(1),
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    #[cfg(target_os = "espidf")]
    fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl TickSource for MonotonicTicks {
    fn ticks(&self) -> u64 {
        (u128::from(self.uptime_us()) * u128::from(self.ticks_per_second) / 1_000_000) as u64
    }

    fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }
}

// ───────────────────────────────────────────────────────────────
// SystickClock
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct SyncPoint {
    ticks: u64,
    millis: u64,
}

/// Wall clock anchored at the last controller sync.
///
/// Before the first sync it reports time since boot.
pub struct SystickClock<S: TickSource = MonotonicTicks> {
    source: S,
    sync: Option<SyncPoint>,
}

impl<S: TickSource> SystickClock<S> {
    pub fn new(source: S) -> Self {
        Self { source, sync: None }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Wall time in milliseconds at `ticks`.
    fn millis_at(&self, ticks: u64) -> u64 {
        let rate = i128::from(self.source.ticks_per_second().max(1));
        let (anchor_ticks, anchor_millis) = match self.sync {
            Some(sync) => (sync.ticks, sync.millis),
            None => (0, 0),
        };
        let elapsed = (i128::from(ticks) - i128::from(anchor_ticks)) * 1000 / rate;
        (i128::from(anchor_millis) + elapsed).max(0) as u64
    }

    /// Wall time now.
    pub fn now(&self) -> Timestamp {
        self.timestamp_at(self.source.ticks())
    }
}

impl<S: TickSource> ClockPort for SystickClock<S> {
    fn now_ticks(&self) -> u64 {
        self.source.ticks()
    }

    fn set_timestamp(&mut self, ticks: u64, timestamp: Timestamp) -> i32 {
        let millis = u64::from(timestamp.seconds) * 1000 + u64::from(timestamp.ms);
        let delta = if self.sync.is_some() {
            let estimate = self.millis_at(ticks);
            (i128::from(millis) - i128::from(estimate)).clamp(i32::MIN.into(), i32::MAX.into())
                as i32
        } else {
            0
        };

        self.sync = Some(SyncPoint { ticks, millis });
        debug!("CLOCK: anchored {}.{:03} at tick {ticks}", timestamp.seconds, timestamp.ms);
        delta
    }

    fn is_synced(&self) -> bool {
        self.sync.is_some()
    }

    fn timestamp_at(&self, ticks: u64) -> Timestamp {
        let millis = self.millis_at(ticks);
        Timestamp {
            seconds: (millis / 1000) as u32,
            ms: (millis % 1000) as u16,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// SharedClock
// ───────────────────────────────────────────────────────────────

/// A [`SystickClock`] behind a critical section, usable from callback
/// context through a shared reference.
pub struct SharedClock<S: TickSource = MonotonicTicks> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<SystickClock<S>>>,
}

impl<S: TickSource> SharedClock<S> {
    pub fn new(clock: SystickClock<S>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(clock)),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut SystickClock<S>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

impl<S: TickSource> ClockPort for &SharedClock<S> {
    fn now_ticks(&self) -> u64 {
        self.with(|c| c.now_ticks())
    }

    fn set_timestamp(&mut self, ticks: u64, timestamp: Timestamp) -> i32 {
        self.with(|c| c.set_timestamp(ticks, timestamp))
    }

    fn is_synced(&self) -> bool {
        self.with(|c| c.is_synced())
    }

    fn timestamp_at(&self, ticks: u64) -> Timestamp {
        self.with(|c| c.timestamp_at(ticks))
    }
}
