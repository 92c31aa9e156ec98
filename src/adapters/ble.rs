//! BLE GATT server and advertising.
//!
//! Brings up the Bluetooth stack, registers the badge service and keeps
//! the advertised manufacturer data in step with the [`Advertiser`].
//! Incoming writes on the RX characteristic are handed to a [`WriteSink`],
//! which buffers the bytes, stamps a notification and schedules a drain.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GATT server via raw `esp_idf_svc::sys` calls.
//! - **all other targets**: simulation stubs for host-side tests.

use log::info;

use super::advertiser::{Advertiser, MANUFACTURER_DATA_LEN};
use super::ble_transport::{RxPipe, on_gatt_write};
use crate::app::ports::ClockPort;
use crate::rpc::engine::receive_notification;
use crate::rpc::notifications::NotificationQueue;
use crate::scheduler::Scheduler;

/// Legacy advertising payload limit.
pub const ADV_PAYLOAD_MAX: usize = 31;

const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_MANUFACTURER: u8 = 0xFF;
/// LE general discoverable, BR/EDR not supported.
const AD_FLAGS: u8 = 0x06;

// ───────────────────────────────────────────────────────────────
// Write sink
// ───────────────────────────────────────────────────────────────

/// Where GATT writes go.
pub struct WriteSink<'a, C: ClockPort> {
    pub rx: &'a RxPipe,
    pub queue: &'a NotificationQueue,
    pub scheduler: &'a Scheduler,
    pub clock: C,
}

impl<C: ClockPort> WriteSink<'_, C> {
    /// Handle one write on the RX characteristic.  Returns `false` when the
    /// bytes or their notification could not be recorded.
    pub fn deliver(&self, data: &[u8]) -> bool {
        match on_gatt_write(self.rx, &self.clock, data) {
            Some(notification) => receive_notification(self.queue, self.scheduler, notification),
            None => false,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Advertising payload
// ───────────────────────────────────────────────────────────────

/// Raw advertising data: flags plus the manufacturer record.
pub fn advertising_payload(advertiser: &Advertiser) -> heapless::Vec<u8, ADV_PAYLOAD_MAX> {
    let mut out = heapless::Vec::new();
    let record = advertiser.manufacturer_data();
    // Fits: 3 + 2 + MANUFACTURER_DATA_LEN <= 31.
    let _ = out.extend_from_slice(&[2, AD_TYPE_FLAGS, AD_FLAGS]);
    let _ = out.extend_from_slice(&[(MANUFACTURER_DATA_LEN + 1) as u8, AD_TYPE_MANUFACTURER]);
    let _ = out.extend_from_slice(&record);
    out
}

// ───────────────────────────────────────────────────────────────
// GATT server
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleState {
    Idle,
    Advertising,
    Failed,
}

pub struct BadgeGattServer {
    state: BleState,
    device_name: heapless::String<24>,
    advertised: [u8; MANUFACTURER_DATA_LEN],
}

impl BadgeGattServer {
    pub fn new(device_name: &str) -> Self {
        let mut name = heapless::String::new();
        for c in device_name.chars() {
            if name.push(c).is_err() {
                break;
            }
        }
        Self {
            state: BleState::Idle,
            device_name: name,
            advertised: [0; MANUFACTURER_DATA_LEN],
        }
    }

    pub fn state(&self) -> BleState {
        self.state
    }

    /// Push the advertiser's record to the stack if it changed.  Returns
    /// whether an update was sent.
    pub fn refresh_advertising(&mut self, advertiser: &Advertiser) -> bool {
        let record = advertiser.manufacturer_data();
        if self.state != BleState::Advertising || record == self.advertised {
            return false;
        }
        self.advertised = record;
        self.platform_set_adv_data(&advertising_payload(advertiser));
        true
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start<C: ClockPort>(&mut self, _sink: WriteSink<'static, C>) {
        info!(
            "BLE(sim): advertising '{}' (service {:032x})",
            self.device_name,
            super::ble_transport::SERVICE_UUID
        );
        self.state = BleState::Advertising;
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_set_adv_data(&mut self, payload: &[u8]) {
        log::debug!("BLE(sim): advertising data {payload:02x?}");
    }
}

// ── ESP-IDF Bluedroid bring-up ────────────────────────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures.  The write sink lives in a `OnceLock`; handles live in atomics.

#[cfg(target_os = "espidf")]
mod esp {
    use core::sync::atomic::{AtomicU32, Ordering};
    use std::sync::OnceLock;

    use log::{error, info, warn};

    use super::{BadgeGattServer, BleState, WriteSink};
    use crate::adapters::ble_transport::{
        CHAR_RX, CHAR_TX, SERVICE_UUID, on_connect, on_disconnect, on_tx_registered,
    };
    use crate::adapters::time::SharedClock;

    pub type StaticSink = WriteSink<'static, &'static SharedClock>;

    static SINK: OnceLock<StaticSink> = OnceLock::new();
    static SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
    static RX_HANDLE: AtomicU32 = AtomicU32::new(0);
    static CHAR_STEP: AtomicU32 = AtomicU32::new(0);

    fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
        let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
        t.len = 16;
        unsafe {
            t.uuid.uuid128 = uuid.to_le_bytes();
        }
        t
    }

    unsafe fn add_gatt_char(svc_handle: u16, uuid: u128, perm: u32, prop: u32) {
        use esp_idf_svc::sys::*;
        let mut char_uuid = uuid128_to_esp(uuid);
        unsafe {
            esp_ble_gatts_add_char(
                svc_handle,
                &mut char_uuid,
                perm as esp_gatt_perm_t,
                prop as esp_gatt_char_prop_t,
                core::ptr::null_mut(),
                core::ptr::null_mut(),
            );
        }
    }

    unsafe fn start_advertising() {
        use esp_idf_svc::sys::*;
        let mut adv_params = esp_ble_adv_params_t {
            adv_int_min: 0x20,
            adv_int_max: 0x40,
            adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
            own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
            channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
            adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
            ..unsafe { core::mem::zeroed() }
        };
        unsafe {
            esp_ble_gap_start_advertising(&mut adv_params);
        }
    }

    unsafe extern "C" fn gap_event_handler(
        event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
        _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
    ) {
        use esp_idf_svc::sys::*;
        match event {
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_DATA_RAW_SET_COMPLETE_EVT => unsafe {
                start_advertising();
            },
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
                log::debug!("BLE GAP: advertising started");
            }
            _ => {}
        }
    }

    unsafe extern "C" fn gatts_event_handler(
        event: esp_idf_svc::sys::esp_gatts_cb_event_t,
        gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
        param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
    ) {
        use esp_idf_svc::sys::*;

        match event {
            esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
                info!("BLE GATTS: app registered (if={gatts_if})");
                let mut svc_id = esp_gatt_srvc_id_t {
                    id: esp_gatt_id_t {
                        uuid: uuid128_to_esp(SERVICE_UUID),
                        inst_id: 0,
                    },
                    is_primary: true,
                };
                unsafe {
                    esp_ble_gatts_create_service(gatts_if, &mut svc_id, 8);
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
                let svc_handle = unsafe { (*param).create.service_handle };
                SVC_HANDLE.store(u32::from(svc_handle), Ordering::Relaxed);
                CHAR_STEP.store(1, Ordering::Relaxed);
                unsafe {
                    esp_ble_gatts_start_service(svc_handle);
                    add_gatt_char(
                        svc_handle,
                        CHAR_RX,
                        ESP_GATT_PERM_WRITE,
                        ESP_GATT_CHAR_PROP_BIT_WRITE | ESP_GATT_CHAR_PROP_BIT_WRITE_NR,
                    );
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
                let handle = unsafe { (*param).add_char.attr_handle };
                let svc_handle = SVC_HANDLE.load(Ordering::Relaxed) as u16;
                match CHAR_STEP.load(Ordering::Relaxed) {
                    1 => {
                        RX_HANDLE.store(u32::from(handle), Ordering::Relaxed);
                        CHAR_STEP.store(2, Ordering::Relaxed);
                        unsafe {
                            add_gatt_char(
                                svc_handle,
                                CHAR_TX,
                                ESP_GATT_PERM_READ,
                                ESP_GATT_CHAR_PROP_BIT_NOTIFY,
                            );
                        }
                    }
                    2 => {
                        on_tx_registered(gatts_if, handle);
                        CHAR_STEP.store(3, Ordering::Relaxed);
                        info!("BLE GATTS: badge service ready (rx={}, tx={handle})",
                            RX_HANDLE.load(Ordering::Relaxed));
                    }
                    _ => {}
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
                let p = unsafe { &(*param).connect };
                on_connect(p.conn_id, p.remote_bda);
            }
            esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
                on_disconnect();
                unsafe {
                    start_advertising();
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
                let p = unsafe { &(*param).write };
                if u32::from(p.handle) != RX_HANDLE.load(Ordering::Relaxed) {
                    return;
                }
                let data = unsafe { core::slice::from_raw_parts(p.value, usize::from(p.len)) };
                match SINK.get() {
                    Some(sink) => {
                        sink.deliver(data);
                    }
                    None => warn!("BLE GATTS: write before sink installed"),
                }
            }
            _ => {}
        }
    }

    type EspResult = Result<(), (&'static str, esp_idf_svc::sys::esp_err_t)>;

    fn esp(ret: esp_idf_svc::sys::esp_err_t, what: &'static str) -> EspResult {
        if ret == esp_idf_svc::sys::ESP_OK as esp_idf_svc::sys::esp_err_t {
            Ok(())
        } else {
            Err((what, ret))
        }
    }

    fn bring_up(device_name: &str) -> EspResult {
        use esp_idf_svc::sys::*;
        unsafe {
            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp(
                esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT),
                "mem_release",
            )?;
            let mut bt_cfg = esp_bt_controller_config_t::default();
            esp(esp_bt_controller_init(&mut bt_cfg), "bt_controller_init")?;
            esp(
                esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE),
                "bt_controller_enable",
            )?;
            esp(esp_bluedroid_init(), "bluedroid_init")?;
            esp(esp_bluedroid_enable(), "bluedroid_enable")?;
            esp(
                esp_ble_gap_register_callback(Some(gap_event_handler)),
                "gap_register_callback",
            )?;
            esp(
                esp_ble_gatts_register_callback(Some(gatts_event_handler)),
                "gatts_register_callback",
            )?;
            esp(esp_ble_gatts_app_register(0), "gatts_app_register")?;

            let mut name = [0u8; 25];
            name[..device_name.len()].copy_from_slice(device_name.as_bytes());
            esp(esp_ble_gap_set_device_name(name.as_ptr().cast()), "set_device_name")
        }
    }

    impl BadgeGattServer {
        pub fn start(&mut self, sink: StaticSink) {
            if SINK.set(sink).is_err() {
                warn!("BLE: start called twice");
                return;
            }
            match bring_up(&self.device_name) {
                Ok(()) => {
                    self.state = BleState::Advertising;
                    info!("BLE(espidf): Bluedroid up, advertising as '{}'", self.device_name);
                }
                Err((what, ret)) => {
                    error!("BLE: {what} failed ({ret})");
                    self.state = BleState::Failed;
                }
            }
        }

        pub(super) fn platform_set_adv_data(&mut self, payload: &[u8]) {
            let mut raw = [0u8; super::ADV_PAYLOAD_MAX];
            raw[..payload.len()].copy_from_slice(payload);
            let ret = unsafe {
                esp_idf_svc::sys::esp_ble_gap_config_adv_data_raw(
                    raw.as_mut_ptr(),
                    payload.len() as u32,
                )
            };
            if let Err((what, ret)) = esp(ret, "config_adv_data_raw") {
                warn!("BLE: {what} failed ({ret})");
            }
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::StaticSink;
