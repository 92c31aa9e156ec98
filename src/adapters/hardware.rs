//! Hardware adapter: bridges the badge peripherals to the port traits.
//!
//! Owns the synced clock, the advertiser, the file store, the identify LED
//! and the samplers' state, exposing them through every port the request
//! handlers need.  Sensor drivers push their latest values in through the
//! `record_*` methods.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{info, warn};

use super::advertiser::Advertiser;
use super::identify_led::IdentifyLed;
use crate::app::ports::{
    AdvertiserPort, ClockPort, FileEntry, FileHandle, FileStorePort, OpenFile, SamplingError,
    SamplingPort, SensorPort, SpaceInfo, StatusFlags, StorageError, SystemPort,
};
use crate::rpc::messages::{
    BadgeAssignment, ImuReading, ImuSettings, MicrophoneSettings, ScanSettings, Timestamp,
};

/// Microphone front-end defaults: PDM gain 0x45 on both channels, 1.067 MHz clock.
const MIC_GAIN: i8 = 0x45;
const MIC_PDM_FREQ_KHZ: u16 = 167;

/// Which samplers hold a storage session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Samplers {
    microphone: bool,
    scan: bool,
    imu: bool,
}

/// Latest sensor values pushed by the drivers.
#[derive(Debug, Clone, Copy, Default)]
struct Readings {
    pdm_sample: u32,
    scan_rssi: u16,
    imu: ImuReading,
    switch_pos: i8,
}

pub struct BadgeHardware<F, C, P, D>
where
    F: FileStorePort,
    C: ClockPort,
    P: OutputPin,
    D: DelayNs,
{
    clock: C,
    advertiser: Advertiser,
    store: F,
    led: IdentifyLed<P, D>,
    samplers: Samplers,
    microphone: MicrophoneSettings,
    scanner: ScanSettings,
    imu: ImuSettings,
    readings: Readings,
    restarts: u32,
}

impl<F, C, P, D> BadgeHardware<F, C, P, D>
where
    F: FileStorePort,
    C: ClockPort,
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(
        clock: C,
        advertiser: Advertiser,
        store: F,
        led: IdentifyLed<P, D>,
    ) -> Self {
        Self {
            clock,
            advertiser,
            store,
            led,
            samplers: Samplers::default(),
            microphone: MicrophoneSettings::default(),
            scanner: ScanSettings::default(),
            imu: ImuSettings::default(),
            readings: Readings::default(),
            restarts: 0,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn advertiser(&self) -> &Advertiser {
        &self.advertiser
    }

    pub fn advertiser_mut(&mut self) -> &mut Advertiser {
        &mut self.advertiser
    }

    pub fn store(&self) -> &F {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut F {
        &mut self.store
    }

    pub fn led(&self) -> &IdentifyLed<P, D> {
        &self.led
    }

    /// Restart requests seen so far (host builds never actually reset).
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    // ── Driver inputs ─────────────────────────────────────────

    pub fn record_battery(&mut self, percent: i8) {
        self.advertiser.set_battery(percent);
    }

    pub fn record_pdm_sample(&mut self, sample: u32) {
        self.readings.pdm_sample = sample;
    }

    pub fn record_scan_rssi(&mut self, rssi: u16) {
        self.readings.scan_rssi = rssi;
    }

    pub fn record_imu(&mut self, reading: ImuReading) {
        self.readings.imu = reading;
    }

    pub fn record_switch_position(&mut self, position: i8) {
        self.readings.switch_pos = position;
        self.microphone.switch_pos = position;
    }

    /// A sampler needs a writable card.
    fn open_session(&mut self, sampler: &str) -> Result<(), SamplingError> {
        self.store.free_space().map(|_| ()).map_err(|e| {
            warn!("SAMPLE: {sampler} cannot open storage: {e}");
            SamplingError::StorageUnavailable
        })
    }
}

// ── ClockPort ─────────────────────────────────────────────────

impl<F, C, P, D> ClockPort for BadgeHardware<F, C, P, D>
where
    F: FileStorePort,
    C: ClockPort,
    P: OutputPin,
    D: DelayNs,
{
    fn now_ticks(&self) -> u64 {
        self.clock.now_ticks()
    }

    fn set_timestamp(&mut self, ticks: u64, timestamp: Timestamp) -> i32 {
        self.clock.set_timestamp(ticks, timestamp)
    }

    fn is_synced(&self) -> bool {
        self.clock.is_synced()
    }

    fn timestamp_at(&self, ticks: u64) -> Timestamp {
        self.clock.timestamp_at(ticks)
    }
}

// ── SamplingPort ──────────────────────────────────────────────

impl<F, C, P, D> SamplingPort for BadgeHardware<F, C, P, D>
where
    F: FileStorePort,
    C: ClockPort,
    P: OutputPin,
    D: DelayNs,
{
    fn start_microphone(&mut self, mode: u8) -> Result<(), SamplingError> {
        self.open_session("microphone")?;
        self.microphone = MicrophoneSettings {
            mode,
            gain_l: MIC_GAIN,
            gain_r: MIC_GAIN,
            switch_pos: self.readings.switch_pos,
            pdm_freq: MIC_PDM_FREQ_KHZ,
        };
        self.samplers.microphone = true;
        self.advertiser.set_microphone_enabled(true);
        info!("SAMPLE: microphone on (mode {mode})");
        Ok(())
    }

    fn stop_microphone(&mut self) {
        self.samplers.microphone = false;
        self.advertiser.set_microphone_enabled(false);
        info!("SAMPLE: microphone off");
    }

    fn start_scan(&mut self, window: u16, interval: u16) -> Result<(), SamplingError> {
        self.open_session("scan")?;
        self.scanner = ScanSettings { window, interval };
        self.samplers.scan = true;
        self.advertiser.set_scan_enabled(true);
        info!("SAMPLE: scan on ({window}/{interval})");
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.samplers.scan = false;
        self.advertiser.set_scan_enabled(false);
        info!("SAMPLE: scan off");
    }

    fn start_imu(
        &mut self,
        acc_fsr: u16,
        gyr_fsr: u16,
        datarate: u16,
    ) -> Result<(), SamplingError> {
        self.open_session("imu")?;
        self.imu = ImuSettings {
            self_test_done: true,
            gyr_fsr: u32::from(gyr_fsr),
            acc_fsr: u32::from(acc_fsr),
            datarate: datarate.min(u16::from(u8::MAX)) as u8,
        };
        self.samplers.imu = true;
        self.advertiser.set_imu_enabled(true);
        info!("SAMPLE: imu on (acc {acc_fsr} gyr {gyr_fsr} @ {datarate})");
        Ok(())
    }

    fn stop_imu(&mut self) {
        self.samplers.imu = false;
        self.advertiser.set_imu_enabled(false);
        info!("SAMPLE: imu off");
    }

    fn is_sampling(&self) -> bool {
        self.samplers.microphone || self.samplers.scan || self.samplers.imu
    }
}

// ── SensorPort ────────────────────────────────────────────────

impl<F, C, P, D> SensorPort for BadgeHardware<F, C, P, D>
where
    F: FileStorePort,
    C: ClockPort,
    P: OutputPin,
    D: DelayNs,
{
    fn microphone(&self) -> MicrophoneSettings {
        self.microphone
    }

    fn scanner(&self) -> ScanSettings {
        self.scanner
    }

    fn imu(&self) -> ImuSettings {
        self.imu
    }

    fn imu_reading(&self) -> ImuReading {
        self.readings.imu
    }

    fn battery_level(&self) -> i8 {
        self.advertiser.battery()
    }

    fn latest_pdm_sample(&self) -> u32 {
        self.readings.pdm_sample
    }

    fn latest_scan_rssi(&self) -> u16 {
        self.readings.scan_rssi
    }
}

// ── AdvertiserPort ────────────────────────────────────────────

impl<F, C, P, D> AdvertiserPort for BadgeHardware<F, C, P, D>
where
    F: FileStorePort,
    C: ClockPort,
    P: OutputPin,
    D: DelayNs,
{
    fn status_flags(&self) -> StatusFlags {
        self.advertiser.status_flags()
    }

    fn set_clock_synced(&mut self, synced: bool) {
        self.advertiser.set_clock_synced(synced);
    }

    fn badge_assignment(&self) -> BadgeAssignment {
        self.advertiser.badge_assignment()
    }

    fn set_badge_assignment(&mut self, assignment: BadgeAssignment) {
        self.advertiser.set_badge_assignment(assignment);
    }
}

// ── FileStorePort ─────────────────────────────────────────────

impl<F, C, P, D> FileStorePort for BadgeHardware<F, C, P, D>
where
    F: FileStorePort,
    C: ClockPort,
    P: OutputPin,
    D: DelayNs,
{
    fn free_space(&mut self) -> Result<SpaceInfo, StorageError> {
        self.store.free_space()
    }

    fn erase_all(&mut self) -> Result<(), StorageError> {
        self.store.erase_all()
    }

    fn list_dir(&mut self, visit: &mut dyn FnMut(&FileEntry)) -> Result<(), StorageError> {
        self.store.list_dir(visit)
    }

    fn open(&mut self, name: &[u8]) -> Result<OpenFile, StorageError> {
        self.store.open(name)
    }

    fn read_at(
        &mut self,
        handle: FileHandle,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        self.store.read_at(handle, offset, buf)
    }

    fn close(&mut self, handle: FileHandle) {
        self.store.close(handle);
    }
}

// ── SystemPort ────────────────────────────────────────────────

impl<F, C, P, D> SystemPort for BadgeHardware<F, C, P, D>
where
    F: FileStorePort,
    C: ClockPort,
    P: OutputPin,
    D: DelayNs,
{
    fn identify(&mut self, timeout_secs: u16) {
        self.led.flash(timeout_secs);
    }

    fn restart(&mut self) {
        self.restarts += 1;
        warn!("SYS: restarting");
        #[cfg(target_os = "espidf")]
        unsafe {
            esp_idf_svc::sys::esp_restart();
        }
    }
}
