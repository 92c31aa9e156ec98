//! Advertising record.
//!
//! Hubs identify badges and read their status from the manufacturer data
//! of the advertising packet:
//!
//! ```text
//! ┌──────────┬─────┬─────┬─────┬─────┬──────┬─────┬───────┬───────────┐
//! │ company  │ bat │ clk │ mic │ imu │ scan │ ID  │ group │ MAC[0..3] │
//! │ 0xFF00 LE│ i8  │ u8  │ u8  │ u8  │ u8   │ u16 │ u8    │ reversed  │
//! └──────────┴─────┴─────┴─────┴─────┴──────┴─────┴───────┴───────────┘
//! ```
//!
//! Only the first 11 bytes of the record are advertised, which cuts the
//! MAC to its first three (reversed) bytes.  Deployed hubs depend on this
//! layout.

use log::info;

use crate::app::ports::{AdvertiserPort, StatusFlags};
use crate::rpc::messages::BadgeAssignment;

pub const COMPANY_IDENTIFIER: u16 = 0xFF00;
/// Advertised bytes of the record.
pub const CUSTOM_ADVDATA_LEN: usize = 11;
/// Manufacturer data length including the company identifier.
pub const MANUFACTURER_DATA_LEN: usize = CUSTOM_ADVDATA_LEN + 2;

const RECORD_LEN: usize = 14;

#[derive(Debug, Clone)]
pub struct Advertiser {
    battery: i8,
    flags: StatusFlags,
    assignment: BadgeAssignment,
    mac: [u8; 6],
}

impl Advertiser {
    /// `mac` in the BLE stack's byte order; it is stored reversed.
    pub fn new(mac: [u8; 6], reset_assignment: BadgeAssignment) -> Self {
        let mut reversed = mac;
        reversed.reverse();
        info!(
            "ADV: id {} group {}",
            reset_assignment.id, reset_assignment.group
        );
        Self {
            battery: 0,
            flags: StatusFlags::default(),
            assignment: reset_assignment,
            mac: reversed,
        }
    }

    pub fn battery(&self) -> i8 {
        self.battery
    }

    pub fn set_battery(&mut self, percent: i8) {
        self.battery = percent;
    }

    pub fn set_microphone_enabled(&mut self, enabled: bool) {
        self.flags.microphone = enabled;
    }

    pub fn set_scan_enabled(&mut self, enabled: bool) {
        self.flags.scan = enabled;
    }

    pub fn set_imu_enabled(&mut self, enabled: bool) {
        self.flags.imu = enabled;
    }

    fn record(&self) -> [u8; RECORD_LEN] {
        let mut r = [0u8; RECORD_LEN];
        r[0] = self.battery as u8;
        r[1] = u8::from(self.flags.clock_synced);
        r[2] = u8::from(self.flags.microphone);
        r[3] = u8::from(self.flags.imu);
        r[4] = u8::from(self.flags.scan);
        r[5..7].copy_from_slice(&self.assignment.id.to_le_bytes());
        r[7] = self.assignment.group;
        r[8..14].copy_from_slice(&self.mac);
        r
    }

    /// Manufacturer-specific data for the advertising packet.
    pub fn manufacturer_data(&self) -> [u8; MANUFACTURER_DATA_LEN] {
        let mut out = [0u8; MANUFACTURER_DATA_LEN];
        out[..2].copy_from_slice(&COMPANY_IDENTIFIER.to_le_bytes());
        out[2..].copy_from_slice(&self.record()[..CUSTOM_ADVDATA_LEN]);
        out
    }
}

/// Read the badge assignment out of another badge's advertised record
/// (without the company identifier).
pub fn assignment_from_advdata(advdata: &[u8]) -> Option<BadgeAssignment> {
    let id = advdata.get(5..7)?;
    Some(BadgeAssignment {
        id: u16::from_le_bytes([id[0], id[1]]),
        group: *advdata.get(7)?,
    })
}

impl AdvertiserPort for Advertiser {
    fn status_flags(&self) -> StatusFlags {
        self.flags
    }

    fn set_clock_synced(&mut self, synced: bool) {
        self.flags.clock_synced = synced;
    }

    fn badge_assignment(&self) -> BadgeAssignment {
        self.assignment
    }

    fn set_badge_assignment(&mut self, assignment: BadgeAssignment) {
        self.assignment = assignment;
    }
}
