//! Length-prefix frame codec.
//!
//! Wire format:
//! ```text
//! ┌────────────┬──────────────────────────┐
//! │ Length (2B)│ Message payload (N B)    │
//! │ LE u16     │                          │
//! └────────────┴──────────────────────────┘
//! ```
//!
//! The badge reads the prefix and the payload as two separate bounded
//! waits (see [`reassembly`](super::reassembly)), so there is no streaming
//! decoder here; only the header helpers and the encoder.

/// Frame header size (2-byte little-endian length).
pub const HEADER_SIZE: usize = 2;

/// Parse a length prefix.
pub fn decode_length(header: [u8; HEADER_SIZE]) -> u16 {
    u16::from_le_bytes(header)
}

/// Encode a payload into a length-prefixed frame.
///
/// Writes `[LE-u16 length][payload]` into `out_buf`.
/// Returns the total number of bytes written.
pub fn encode_frame(payload: &[u8], out_buf: &mut [u8]) -> Option<usize> {
    let len = u16::try_from(payload.len()).ok()?;
    let total = HEADER_SIZE + payload.len();
    if total > out_buf.len() {
        return None;
    }

    out_buf[..HEADER_SIZE].copy_from_slice(&len.to_le_bytes());
    out_buf[HEADER_SIZE..total].copy_from_slice(payload);

    Some(total)
}
