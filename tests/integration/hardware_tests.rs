//! Sampler control, status reporting and system requests through the
//! hardware adapter.

use crate::mock_hw::Harness;
use rhythmbadge::app::ports::AdvertiserPort;
use rhythmbadge::rpc::messages::{Axes, ImuReading, Request, Response, Timestamp};

const AT: Timestamp = Timestamp {
    seconds: 1_700_000_000,
    ms: 0,
};

#[test]
fn start_microphone_reports_front_end_settings() {
    let mut h = Harness::new();
    h.hw.record_switch_position(1);

    match h.exchange(&Request::StartMicrophone { timestamp: AT, mode: 1 }).as_slice() {
        [Response::StartMicrophone { timestamp, settings }] => {
            assert_eq!(*timestamp, AT);
            assert_eq!(settings.mode, 1);
            assert_eq!(settings.gain_l, 0x45);
            assert_eq!(settings.gain_r, 0x45);
            assert_eq!(settings.switch_pos, 1);
            assert_eq!(settings.pdm_freq, 167);
        }
        other => panic!("unexpected {other:?}"),
    }

    let flags = h.hw.status_flags();
    assert!(flags.microphone);
    assert!(flags.clock_synced);
    assert_eq!(h.hw.advertiser().manufacturer_data()[4], 1);
}

#[test]
fn start_scan_echoes_window_and_interval() {
    let mut h = Harness::new();
    match h
        .exchange(&Request::StartScan {
            timestamp: AT,
            window: 100,
            interval: 300,
        })
        .as_slice()
    {
        [Response::StartScan { settings, .. }] => {
            assert_eq!(settings.window, 100);
            assert_eq!(settings.interval, 300);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(h.hw.status_flags().scan);

    assert!(h.exchange(&Request::StopScan).is_empty());
    assert!(!h.hw.status_flags().scan);
}

#[test]
fn start_imu_reports_applied_settings() {
    let mut h = Harness::new();
    match h
        .exchange(&Request::StartImu {
            timestamp: AT,
            acc_fsr: 4,
            gyr_fsr: 1000,
            datarate: 50,
        })
        .as_slice()
    {
        [Response::StartImu { settings, .. }] => {
            assert!(settings.self_test_done);
            assert_eq!(settings.acc_fsr, 4);
            assert_eq!(settings.gyr_fsr, 1000);
            assert_eq!(settings.datarate, 50);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(h.hw.status_flags().imu);
}

#[test]
fn sampler_on_unusable_card_restarts_badge() {
    let mut h = Harness::new();
    h.hw.store_mut().set_available(false);

    let responses = h.exchange(&Request::StartMicrophone { timestamp: AT, mode: 0 });
    assert!(responses.is_empty());
    assert_eq!(h.hw.restarts(), 1);
    assert!(!h.hw.status_flags().microphone);
    assert_eq!(h.engine.transport().disconnects, 0);
}

#[test]
fn restart_request_has_no_response() {
    let mut h = Harness::new();
    assert!(h.exchange(&Request::Restart).is_empty());
    assert_eq!(h.hw.restarts(), 1);
}

#[test]
fn status_reports_latest_samples() {
    let mut h = Harness::new();
    h.hw.record_battery(77);
    h.hw.record_pdm_sample(1234);
    h.hw.record_scan_rssi(56);

    match h
        .exchange(&Request::Status {
            timestamp: AT,
            assignment: None,
        })
        .as_slice()
    {
        [Response::Status {
            battery_level,
            pdm_data,
            scan_data,
            ..
        }] => {
            assert_eq!(*battery_level, 77);
            assert_eq!(*pdm_data, 1234);
            assert_eq!(*scan_data, 56);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn status_without_assignment_keeps_reset_id() {
    let mut h = Harness::new();
    h.exchange(&Request::Status {
        timestamp: AT,
        assignment: None,
    });
    assert_eq!(h.hw.badge_assignment().id, 0xFFFF);
}

#[test]
fn imu_data_is_zero_unless_imu_runs() {
    let reading = ImuReading {
        acc: Axes { x: 1, y: 2, z: 3 },
        gyr: Axes { x: 4, y: 5, z: 6 },
        ..ImuReading::default()
    };
    let mut h = Harness::new();
    h.hw.record_imu(reading);

    match h.exchange(&Request::ImuData).as_slice() {
        [Response::ImuData { reading, .. }] => assert_eq!(*reading, ImuReading::default()),
        other => panic!("unexpected {other:?}"),
    }

    h.exchange(&Request::StartImu {
        timestamp: AT,
        acc_fsr: 2,
        gyr_fsr: 250,
        datarate: 10,
    });
    match h.exchange(&Request::ImuData).as_slice() {
        [Response::ImuData { reading: got, .. }] => assert_eq!(*got, reading),
        other => panic!("unexpected {other:?}"),
    }
}
