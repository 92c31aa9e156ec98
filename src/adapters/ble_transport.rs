//! BLE transport: request bytes in over GATT writes, response frames out
//! over GATT notifications.
//!
//! The GATT write callback runs in the Bluetooth stack's context.  It only
//! copies the written bytes into [`RxPipe`] and stamps a [`Notification`];
//! the protocol engine pulls bytes back out of the pipe from the scheduler
//! context.
//!
//! ```text
//!   GATT write ──▶ on_gatt_write() ──▶ RxPipe ──▶ BleTransport::await_bytes()
//!                        │
//!                        └──▶ Notification ──▶ NotificationQueue
//!
//!   Response frame ──▶ BleTransport::transmit() ──▶ GattLink::notify()
//! ```
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID                                   | Perms       |
//! |----------------|----------------------------------------|-------------|
//! | Badge RX       | `6e400002-b5a3-f393-e0a9-e50e24dcca9e` | Write       |
//! | Badge TX       | `6e400003-b5a3-f393-e0a9-e50e24dcca9e` | Notify      |

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use embassy_time::Duration;
use log::{debug, warn};

use super::time::TickSource;
use crate::app::ports::ClockPort;
use crate::rpc::notifications::Notification;
use crate::rpc::reassembly::MAX_REQUEST_PAYLOAD;
use crate::rpc::transport::{AwaitError, TransmitError, Transport};

// ── Constants ────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x6e400001_b5a3_f393_e0a9_e50e24dcca9e;
pub const CHAR_RX: u128 = 0x6e400002_b5a3_f393_e0a9_e50e24dcca9e;
pub const CHAR_TX: u128 = 0x6e400003_b5a3_f393_e0a9_e50e24dcca9e;

/// Receive pipe capacity: one maximal request plus its length header.
pub const RX_PIPE_SIZE: usize = MAX_REQUEST_PAYLOAD + 2;

/// Bytes written by the controller, not yet consumed by the engine.
pub type RxPipe = Pipe<CriticalSectionRawMutex, RX_PIPE_SIZE>;

// ───────────────────────────────────────────────────────────────
// Receive path
// ───────────────────────────────────────────────────────────────

/// Store the bytes of one GATT write and describe them.
///
/// Returns `None` when nothing fit into the pipe.  A partial copy is
/// reported with the stored length, so the engine later sees the
/// shortfall as a desync.
pub fn on_gatt_write<C: ClockPort + ?Sized>(
    rx: &RxPipe,
    clock: &C,
    data: &[u8],
) -> Option<Notification> {
    let ticks = clock.now_ticks();
    let stored = rx.try_write(data).unwrap_or(0);
    if stored < data.len() {
        warn!(
            "BLE: receive pipe full, kept {stored} of {} bytes",
            data.len()
        );
    }
    if stored == 0 {
        return None;
    }

    let timestamp = clock.timestamp_at(ticks);
    Some(Notification {
        timepoint_ticks: ticks,
        timepoint_seconds: timestamp.seconds,
        timepoint_millis: timestamp.ms,
        notification_len: stored as u16,
    })
}

// ───────────────────────────────────────────────────────────────
// GATT link
// ───────────────────────────────────────────────────────────────

/// The connected peer as seen by the transport.
pub trait GattLink {
    /// Send one notification on the TX characteristic.
    fn notify(&mut self, frame: &[u8], timeout: Duration) -> Result<(), TransmitError>;

    /// Drop the connection.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}

/// A link with no peer.
#[derive(Debug, Default)]
pub struct NullLink;

impl GattLink for NullLink {
    fn notify(&mut self, _frame: &[u8], _timeout: Duration) -> Result<(), TransmitError> {
        Err(TransmitError::Fatal)
    }

    fn disconnect(&mut self) {}

    fn is_connected(&self) -> bool {
        false
    }
}

// ───────────────────────────────────────────────────────────────
// BleTransport
// ───────────────────────────────────────────────────────────────

pub struct BleTransport<'p, L: GattLink, S: TickSource> {
    rx: &'p RxPipe,
    link: L,
    ticks: S,
}

impl<'p, L: GattLink, S: TickSource> BleTransport<'p, L, S> {
    pub fn new(rx: &'p RxPipe, link: L, ticks: S) -> Self {
        Self { rx, link, ticks }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn deadline(&self, timeout: Duration) -> u64 {
        let rate = u64::from(self.ticks.ticks_per_second().max(1));
        let span = (u128::from(timeout.as_micros()) * u128::from(rate) / 1_000_000) as u64;
        self.ticks.ticks().saturating_add(span)
    }

    fn discard_pending(&self) {
        let mut scratch = [0u8; 32];
        let mut dropped = 0usize;
        while let Ok(n) = self.rx.try_read(&mut scratch) {
            dropped += n;
        }
        if dropped > 0 {
            debug!("BLE: discarded {dropped} unread bytes");
        }
    }
}

impl<L: GattLink, S: TickSource> Transport for BleTransport<'_, L, S> {
    fn await_bytes(&mut self, buf: &mut [u8], timeout: Duration) -> Result<(), AwaitError> {
        let deadline = self.deadline(timeout);
        let mut filled = 0;

        while filled < buf.len() {
            match self.rx.try_read(&mut buf[filled..]) {
                Ok(n) => filled += n,
                Err(_) => {
                    if !self.link.is_connected() {
                        return Err(AwaitError::Disconnected);
                    }
                    if self.ticks.ticks() >= deadline {
                        return Err(AwaitError::Timeout);
                    }
                    std::thread::yield_now();
                }
            }
        }
        Ok(())
    }

    fn transmit(&mut self, frame: &[u8], timeout: Duration) -> Result<(), TransmitError> {
        if !self.link.is_connected() {
            return Err(TransmitError::Fatal);
        }
        self.link.notify(frame, timeout)
    }

    fn disconnect(&mut self) {
        self.link.disconnect();
        self.discard_pending();
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF link (Bluedroid)
// ───────────────────────────────────────────────────────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures.  The GATTS event handler publishes the connection through
// these atomics; `EspGattLink` reads them.

#[cfg(target_os = "espidf")]
mod esp {
    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use embassy_time::Duration;
    use log::{info, warn};

    use super::GattLink;
    use crate::rpc::transport::TransmitError;

    static GATTS_IF: AtomicU32 = AtomicU32::new(0);
    static CONN_ID: AtomicU32 = AtomicU32::new(0);
    static TX_HANDLE: AtomicU32 = AtomicU32::new(0);
    static CONNECTED: AtomicBool = AtomicBool::new(false);
    static REMOTE_BDA: std::sync::Mutex<[u8; 6]> = std::sync::Mutex::new([0; 6]);

    /// Called from the GATTS handler once the TX characteristic exists.
    pub fn on_tx_registered(gatts_if: u8, tx_handle: u16) {
        GATTS_IF.store(u32::from(gatts_if), Ordering::Relaxed);
        TX_HANDLE.store(u32::from(tx_handle), Ordering::Relaxed);
    }

    /// Called from `ESP_GATTS_CONNECT_EVT`.
    pub fn on_connect(conn_id: u16, remote_bda: [u8; 6]) {
        CONN_ID.store(u32::from(conn_id), Ordering::Relaxed);
        if let Ok(mut bda) = REMOTE_BDA.lock() {
            *bda = remote_bda;
        }
        CONNECTED.store(true, Ordering::Release);
        info!("BLE: controller connected (conn_id={conn_id})");
    }

    /// Called from `ESP_GATTS_DISCONNECT_EVT`.
    pub fn on_disconnect() {
        CONNECTED.store(false, Ordering::Release);
        info!("BLE: controller disconnected");
    }

    #[derive(Debug, Default)]
    pub struct EspGattLink;

    impl GattLink for EspGattLink {
        fn notify(&mut self, frame: &[u8], _timeout: Duration) -> Result<(), TransmitError> {
            use esp_idf_svc::sys::*;
            let handle = TX_HANDLE.load(Ordering::Relaxed);
            if handle == 0 {
                return Err(TransmitError::Fatal);
            }
            let err = unsafe {
                esp_ble_gatts_send_indicate(
                    GATTS_IF.load(Ordering::Relaxed) as u8,
                    CONN_ID.load(Ordering::Relaxed) as u16,
                    handle as u16,
                    frame.len() as u16,
                    frame.as_ptr().cast_mut(),
                    false,
                )
            };
            if err == ESP_OK as esp_err_t {
                Ok(())
            } else if err == ESP_ERR_NO_MEM as esp_err_t {
                Err(TransmitError::NoBuffers)
            } else {
                warn!("BLE: notify failed (err={err})");
                Err(TransmitError::Fatal)
            }
        }

        fn disconnect(&mut self) {
            if !CONNECTED.load(Ordering::Acquire) {
                return;
            }
            let Ok(mut bda) = REMOTE_BDA.lock() else {
                return;
            };
            let err = unsafe { esp_idf_svc::sys::esp_ble_gap_disconnect(bda.as_mut_ptr()) };
            if err != esp_idf_svc::sys::ESP_OK as esp_idf_svc::sys::esp_err_t {
                warn!("BLE: disconnect request failed (err={err})");
            }
        }

        fn is_connected(&self) -> bool {
            CONNECTED.load(Ordering::Acquire)
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::{EspGattLink, on_connect, on_disconnect, on_tx_registered};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::messages::Timestamp;
    use core::cell::Cell;

    struct Ticks(Cell<u64>);

    impl TickSource for &Ticks {
        fn ticks(&self) -> u64 {
            // Advance on every read so waits terminate.
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn ticks_per_second(&self) -> u32 {
            1000
        }
    }

    struct FixedClock;

    impl ClockPort for FixedClock {
        fn now_ticks(&self) -> u64 {
            7_000
        }

        fn set_timestamp(&mut self, _ticks: u64, _timestamp: Timestamp) -> i32 {
            0
        }

        fn is_synced(&self) -> bool {
            false
        }

        fn timestamp_at(&self, ticks: u64) -> Timestamp {
            Timestamp {
                seconds: (ticks / 1000) as u32,
                ms: (ticks % 1000) as u16,
            }
        }
    }

    #[derive(Default)]
    struct Link {
        connected: bool,
        sent: Vec<Vec<u8>>,
        disconnects: usize,
    }

    impl GattLink for Link {
        fn notify(&mut self, frame: &[u8], _timeout: Duration) -> Result<(), TransmitError> {
            self.sent.push(frame.to_vec());
            Ok(())
        }

        fn disconnect(&mut self) {
            self.disconnects += 1;
            self.connected = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    fn connected() -> Link {
        Link {
            connected: true,
            ..Link::default()
        }
    }

    #[test]
    fn gatt_write_is_stamped_and_buffered() {
        let rx = RxPipe::new();
        let n = on_gatt_write(&rx, &FixedClock, &[1, 2, 3]).unwrap();
        assert_eq!(n.timepoint_ticks, 7_000);
        assert_eq!(n.timepoint_seconds, 7);
        assert_eq!(n.timepoint_millis, 0);
        assert_eq!(n.notification_len, 3);
        assert_eq!(rx.len(), 3);
    }

    #[test]
    fn overflowing_write_keeps_what_fits() {
        let rx = RxPipe::new();
        let big = [0xAA; RX_PIPE_SIZE - 4];
        on_gatt_write(&rx, &FixedClock, &big).unwrap();
        let n = on_gatt_write(&rx, &FixedClock, &[0; 10]).unwrap();
        assert_eq!(n.notification_len, 4);
        assert!(on_gatt_write(&rx, &FixedClock, &[0; 2]).is_none());
    }

    #[test]
    fn await_bytes_reads_across_writes() {
        let rx = RxPipe::new();
        let ticks = Ticks(Cell::new(0));
        on_gatt_write(&rx, &FixedClock, &[1, 2]);
        on_gatt_write(&rx, &FixedClock, &[3]);

        let mut t = BleTransport::new(&rx, connected(), &ticks);
        let mut buf = [0u8; 3];
        t.await_bytes(&mut buf, Duration::from_millis(10)).unwrap();
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn await_bytes_times_out() {
        let rx = RxPipe::new();
        let ticks = Ticks(Cell::new(0));
        let mut t = BleTransport::new(&rx, connected(), &ticks);
        let mut buf = [0u8; 2];
        assert_eq!(
            t.await_bytes(&mut buf, Duration::from_millis(5)),
            Err(AwaitError::Timeout)
        );
    }

    #[test]
    fn await_bytes_reports_lost_link() {
        let rx = RxPipe::new();
        let ticks = Ticks(Cell::new(0));
        let mut t = BleTransport::new(&rx, Link::default(), &ticks);
        let mut buf = [0u8; 1];
        assert_eq!(
            t.await_bytes(&mut buf, Duration::from_millis(5)),
            Err(AwaitError::Disconnected)
        );
    }

    #[test]
    fn transmit_goes_to_the_link() {
        let rx = RxPipe::new();
        let ticks = Ticks(Cell::new(0));
        let mut t = BleTransport::new(&rx, connected(), &ticks);
        t.transmit(&[0x40, 0x00, 9], Duration::from_millis(100)).unwrap();
        assert_eq!(t.link().sent, vec![vec![0x40, 0x00, 9]]);
    }

    #[test]
    fn disconnect_drops_unread_bytes() {
        let rx = RxPipe::new();
        let ticks = Ticks(Cell::new(0));
        on_gatt_write(&rx, &FixedClock, &[1, 2, 3, 4]);
        let mut t = BleTransport::new(&rx, connected(), &ticks);
        t.disconnect();
        assert_eq!(t.link().disconnects, 1);
        assert!(rx.is_empty());
        assert_eq!(
            t.transmit(&[0], Duration::from_millis(1)),
            Err(TransmitError::Fatal)
        );
    }
}
