//! Controller request/response protocol.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        Protocol Stack                         │
//! │                                                               │
//! │  RX callback ──▶ NotificationQueue ──┐                        │
//! │                                      ▼                        │
//! │  ┌───────────┐   ┌─────────────┐   ┌───────────────────────┐  │
//! │  │ Transport │──▶│ Reassembler │──▶│ Engine ──▶ BadgeService│ │
//! │  │  (trait)  │   │  + codec    │   │  (gates, retries)     │  │
//! │  └───────────┘   └─────────────┘   └───────────┬───────────┘  │
//! │       ▲                                        │              │
//! │       └────────── framed Response ◀────────────┘              │
//! └───────────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod engine;
pub mod exclusion;
pub mod messages;
pub mod notifications;
pub mod reassembly;
pub mod transport;
