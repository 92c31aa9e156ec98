//! Frame reassembly.
//!
//! A request frame may be split across several BLE writes, and one write
//! may carry the tail of one frame plus the head of the next.  The
//! reassembler reads exactly one frame from the transport, then charges
//! the frame's bytes against the queued notifications:
//!
//! ```text
//!   notifications  │  20  │  20  │   9   │
//!   frame bytes    │◀────── 45 ───────▶│
//!   after          pop     pop    shrink → │ 4 │
//! ```

use embassy_time::Duration;
use log::debug;

use super::codec::{HEADER_SIZE, decode_length};
use super::notifications::NotificationQueue;
use super::transport::Transport;
use crate::error::{ProtocolError, ReadStage};

/// Largest request payload the badge accepts.
pub const MAX_REQUEST_PAYLOAD: usize = 512;

/// Single-frame request buffer.
pub struct Reassembler {
    buf: [u8; MAX_REQUEST_PAYLOAD],
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_REQUEST_PAYLOAD],
        }
    }

    /// Read one length-prefixed frame, waiting up to `timeout` for each of
    /// the two stages.  Returns the payload.
    pub fn read_frame<T: Transport>(
        &mut self,
        transport: &mut T,
        timeout: Duration,
    ) -> Result<&[u8], ProtocolError> {
        let mut header = [0u8; HEADER_SIZE];
        transport
            .await_bytes(&mut header, timeout)
            .map_err(|e| e.at(ReadStage::Length))?;

        let len = decode_length(header);
        let payload = self
            .buf
            .get_mut(..usize::from(len))
            .ok_or(ProtocolError::FrameTooLarge(len))?;

        transport
            .await_bytes(payload, timeout)
            .map_err(|e| e.at(ReadStage::Payload))?;

        Ok(payload)
    }
}

/// Charge a frame of `payload_len` bytes (plus its prefix) against the
/// queued notifications.
///
/// Fully consumed records are popped; a partially consumed one is shrunk
/// and stays at the front.  If the queue runs out first, nothing is
/// popped and the shortfall is reported.
pub fn consume_notifications<const N: usize>(
    queue: &NotificationQueue<N>,
    payload_len: u16,
) -> Result<(), ProtocolError> {
    let mut remaining = u32::from(payload_len) + HEADER_SIZE as u32;
    let mut consumed = 0;

    while remaining > 0 {
        let Some(mut notification) = queue.peek(consumed) else {
            return Err(ProtocolError::Desynchronized {
                missing: remaining as u16,
            });
        };

        let len = u32::from(notification.notification_len);
        if len <= remaining {
            remaining -= len;
            consumed += 1;
        } else {
            notification.notification_len = (len - remaining) as u16;
            debug!(
                "RPC: notification {consumed} partially consumed, {} bytes left",
                notification.notification_len
            );
            queue.update(consumed, notification);
            remaining = 0;
        }
    }

    for _ in 0..consumed {
        queue.pop_front();
    }
    Ok(())
}
