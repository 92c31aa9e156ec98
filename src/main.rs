//! RhythmBadge Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BadgeGattServer   BleTransport    SharedClock   Advertiser    │
//! │  (GATT writes)     (Transport)     (ClockPort)   (adv record)  │
//! │  RamFileStore      IdentifyLed     BadgeHardware               │
//! │  (FileStorePort)   (GPIO + delay)  (all ports)                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  ProtocolEngine · BadgeService (request handlers)      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Scheduler (cooperative run queue)                             │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::peripherals::Peripherals;
use log::{info, warn};

use rhythmbadge::adapters::advertiser::Advertiser;
use rhythmbadge::adapters::ble::{BadgeGattServer, WriteSink};
use rhythmbadge::adapters::ble_transport::{BleTransport, EspGattLink, RxPipe};
use rhythmbadge::adapters::hardware::BadgeHardware;
use rhythmbadge::adapters::identify_led::IdentifyLed;
use rhythmbadge::adapters::ram_store::RamFileStore;
use rhythmbadge::adapters::time::{MonotonicTicks, SharedClock, SystickClock};
use rhythmbadge::app::service::BadgeService;
use rhythmbadge::config::BadgeConfig;
use rhythmbadge::rpc::engine::ProtocolEngine;
use rhythmbadge::rpc::messages::BadgeAssignment;
use rhythmbadge::rpc::notifications::NotificationQueue;
use rhythmbadge::scheduler::Scheduler;

const DEVICE_NAME: &str = "HDBDG";
/// Card stand-in size until the SD card is mounted.
const RAM_STORE_KB: u32 = 64;
/// Tasks run per pass before the loop yields to FreeRTOS.
const STEPS_PER_PASS: usize = 32;
const IDLE_SLEEP_MS: u32 = 5;

static QUEUE: NotificationQueue = NotificationQueue::new();
static SCHEDULER: Scheduler = Scheduler::new();
static RX: RxPipe = RxPipe::new();

fn load_config() -> BadgeConfig {
    match option_env!("BADGE_CONFIG_JSON") {
        Some(json) => BadgeConfig::from_json(json.as_bytes()).unwrap_or_else(|e| {
            warn!("Config override rejected ({e}), using defaults");
            BadgeConfig::default()
        }),
        None => BadgeConfig::default(),
    }
}

fn bluetooth_mac() -> [u8; 6] {
    let mut mac = [0u8; 6];
    let ret = unsafe {
        esp_idf_svc::sys::esp_read_mac(mac.as_mut_ptr(), esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_BT)
    };
    if ret != esp_idf_svc::sys::ESP_OK as esp_idf_svc::sys::esp_err_t {
        warn!("MAC read failed ({ret}), advertising zeros");
    }
    mac
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  RhythmBadge v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = load_config();
    config.validate()?;

    // ── 3. Adapters ───────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let led = IdentifyLed::new(PinDriver::output(peripherals.pins.gpio2)?, FreeRtos);

    let clock: &'static SharedClock = Box::leak(Box::new(SharedClock::new(SystickClock::new(
        MonotonicTicks::new(config.clock_ticks_per_second),
    ))));

    let advertiser = Advertiser::new(
        bluetooth_mac(),
        BadgeAssignment {
            id: config.reset_badge_id,
            group: config.reset_badge_group,
        },
    );

    // TODO: mount the SD card over SDSPI and swap in a FAT-backed store.
    let store = RamFileStore::new(RAM_STORE_KB);
    let mut hardware = BadgeHardware::new(clock, advertiser, store, led);

    let mut gatt = BadgeGattServer::new(DEVICE_NAME);
    gatt.start(WriteSink {
        rx: &RX,
        queue: &QUEUE,
        scheduler: &SCHEDULER,
        clock,
    });

    // ── 4. Protocol engine ────────────────────────────────────
    let transport = BleTransport::new(
        &RX,
        EspGattLink,
        MonotonicTicks::new(config.clock_ticks_per_second),
    );
    let mut engine = ProtocolEngine::new(&QUEUE, transport, &config);
    let mut service = BadgeService::new(&config);

    info!("System ready. Entering run loop.");

    // ── 5. Run loop ───────────────────────────────────────────
    loop {
        let ran = SCHEDULER.run_until_idle(
            |task| engine.run(task, &SCHEDULER, &mut service, &mut hardware),
            STEPS_PER_PASS,
        );
        gatt.refresh_advertising(hardware.advertiser());
        if ran == 0 {
            FreeRtos::delay_ms(IDLE_SLEEP_MS);
        }
    }
}
