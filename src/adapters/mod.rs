//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements          | Connects to                  |
//! |-----------------|---------------------|------------------------------|
//! | `advertiser`    | AdvertiserPort      | BLE advertising record       |
//! | `ble`           | —                   | Bluedroid GAP/GATT server    |
//! | `ble_transport` | Transport           | Bluedroid GATT write/notify  |
//! | `hardware`      | all badge ports     | clock, samplers, card, LED   |
//! | `identify_led`  | —                   | `embedded-hal` GPIO + delay  |
//! | `ram_store`     | FileStorePort       | in-memory card (host/tests)  |
//! | `time`          | ClockPort           | ESP32 system timer           |

pub mod advertiser;
pub mod ble;
pub mod ble_transport;
pub mod hardware;
pub mod identify_led;
pub mod ram_store;
pub mod time;
