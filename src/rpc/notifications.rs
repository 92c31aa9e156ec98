//! Transport notification queue.
//!
//! The BLE receive callback appends one [`Notification`] per write it
//! accepts: how many bytes arrived and when.  The bytes themselves stay in
//! the transport; the protocol engine only uses these records to reconcile
//! the byte stream with the writes that carried it.
//!
//! ```text
//! ┌─────────────┐  push   ┌─────────────────────┐  peek/update/pop  ┌──────────┐
//! │ RX callback │────────▶│  NotificationQueue  │──────────────────▶│  Engine  │
//! │ (producer)  │         │  (lock-free SPSC)   │                   │(consumer)│
//! └─────────────┘         └─────────────────────┘                   └──────────┘
//! ```

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Default queue depth: 16 records of 16 bytes, 256 bytes of RAM.
pub const NOTIFICATION_QUEUE_CAP: usize = 16;

/// "N more bytes of the request stream arrived at this device time."
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Notification {
    pub timepoint_ticks: u64,
    pub timepoint_seconds: u32,
    pub timepoint_millis: u16,
    pub notification_len: u16,
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// The RX callback writes (produces), the scheduler reads (consumes).
// The producer only writes the slot at `head` and then publishes it;
// the consumer only touches slots in `tail..head`, which the producer
// never revisits until `tail` moves past them.

/// Fixed-capacity FIFO of [`Notification`]s.
///
/// `N` must be a power of two.  One slot is kept free to tell full from
/// empty, so at most `N - 1` records are held.
pub struct NotificationQueue<const N: usize = NOTIFICATION_QUEUE_CAP> {
    head: AtomicUsize,
    tail: AtomicUsize,
    slots: [UnsafeCell<Notification>; N],
}

// SAFETY: `push` is the only writer of `slots[head]` and `head`; the
// consumer operations are the only accessors of `slots[tail..head]` and
// writers of `tail`.  Release/Acquire on the indices orders slot contents
// against their publication.  Callers keep to one producer context and one
// consumer context.
unsafe impl<const N: usize> Sync for NotificationQueue<N> {}

impl<const N: usize> Default for NotificationQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> NotificationQueue<N> {
    const MASK: usize = {
        assert!(N.is_power_of_two(), "queue capacity must be a power of two");
        N - 1
    };

    pub const fn new() -> Self {
        Self {
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            slots: [const { UnsafeCell::new(Notification {
                timepoint_ticks: 0,
                timepoint_seconds: 0,
                timepoint_millis: 0,
                notification_len: 0,
            }) }; N],
        }
    }

    /// Maximum number of records held at once.
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    // ── Producer side ─────────────────────────────────────────

    /// Append a record.
    /// Safe to call from the receive callback (lock-free).
    /// Returns `false` if the queue is full (record dropped).
    pub fn push(&self, notification: Notification) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let next = (head + 1) & Self::MASK;

        if next == tail {
            return false;
        }

        // SAFETY: slot `head` lies outside `tail..head`, so the consumer
        // cannot be reading it; only this producer writes it.
        unsafe {
            *self.slots[head].get() = notification;
        }

        self.head.store(next, Ordering::Release);
        true
    }

    // ── Consumer side ─────────────────────────────────────────

    /// Number of queued records.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Relaxed);
        head.wrapping_sub(tail) & Self::MASK
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record at logical position `index` (0 = oldest), if queued.
    pub fn peek(&self, index: usize) -> Option<Notification> {
        if index >= self.len() {
            return None;
        }
        let slot = (self.tail.load(Ordering::Relaxed) + index) & Self::MASK;
        // SAFETY: the slot is inside `tail..head`, owned by the consumer.
        Some(unsafe { *self.slots[slot].get() })
    }

    /// Overwrite the record at `index` in place.
    /// Returns `false` if `index` is not queued.
    pub fn update(&self, index: usize, notification: Notification) -> bool {
        if index >= self.len() {
            return false;
        }
        let slot = (self.tail.load(Ordering::Relaxed) + index) & Self::MASK;
        // SAFETY: as for `peek`; the producer never writes claimed slots.
        unsafe {
            *self.slots[slot].get() = notification;
        }
        true
    }

    /// Discard the oldest record.  No-op when empty.
    pub fn pop_front(&self) {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return;
        }
        self.tail.store((tail + 1) & Self::MASK, Ordering::Release);
    }

    /// Discard every queued record.
    pub fn clear(&self) {
        let head = self.head.load(Ordering::Acquire);
        self.tail.store(head, Ordering::Release);
    }

    /// Iterate the queued records oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = Notification> + '_ {
        (0..self.len()).map_while(|i| self.peek(i))
    }
}
