//! Protocol engine: reassembly, dispatch, response pipeline and recovery.

use crate::mock_hw::{Harness, decode_frame};
use rhythmbadge::app::ports::{AdvertiserPort, StatusFlags};
use rhythmbadge::config::BadgeConfig;
use rhythmbadge::rpc::exclusion::GateState;
use rhythmbadge::rpc::messages::{BadgeAssignment, Request, Response, Timestamp};
use rhythmbadge::rpc::transport::TransmitError;

fn status(seconds: u32, ms: u16) -> Request {
    Request::Status {
        timestamp: Timestamp { seconds, ms },
        assignment: None,
    }
}

fn assert_idle(h: &Harness) {
    assert_eq!(h.engine.receive_state(), GateState::Idle);
    assert_eq!(h.engine.respond_state(), GateState::Idle);
    assert!(h.queue.is_empty());
    assert!(h.scheduler.is_idle());
}

// ── Happy path ────────────────────────────────────────────────

#[test]
fn status_syncs_clock_and_assigns_badge() {
    let mut h = Harness::new();
    h.set_ticks(100);
    h.hw.record_battery(91);

    let responses = h.exchange(&Request::Status {
        timestamp: Timestamp {
            seconds: 1_600_000_000,
            ms: 500,
        },
        assignment: Some(BadgeAssignment { id: 42, group: 3 }),
    });

    assert_eq!(
        responses,
        vec![Response::Status {
            flags: StatusFlags {
                clock_synced: true,
                ..StatusFlags::default()
            },
            battery_level: 91,
            pdm_data: 0,
            scan_data: 0,
            time_delta: 0,
            timestamp: Timestamp {
                seconds: 1_600_000_000,
                ms: 500
            },
        }]
    );
    assert_eq!(
        h.hw.badge_assignment(),
        BadgeAssignment { id: 42, group: 3 }
    );
    assert_idle(&h);
}

#[test]
fn second_status_reports_clock_correction() {
    let mut h = Harness::new();
    h.set_ticks(0);
    h.exchange(&status(100, 0));

    h.set_ticks(10_000);
    let responses = h.exchange(&status(110, 25));
    match responses.as_slice() {
        [Response::Status { time_delta, .. }] => assert_eq!(*time_delta, 25),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn response_timestamp_is_request_arrival() {
    let mut h = Harness::new();
    h.set_ticks(2_500);
    h.send(&Request::FreeSpace);
    // Time passes before the scheduler gets to the request.
    h.set_ticks(9_000);
    h.run();

    match h.responses().as_slice() {
        [Response::FreeSpace { timestamp, .. }] => {
            assert_eq!(*timestamp, Timestamp { seconds: 2, ms: 500 });
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn request_split_across_writes_is_reassembled() {
    let mut h = Harness::new();
    h.send_split(&status(7, 0), &[1, 4, 9]);
    h.run();
    assert_eq!(h.responses().len(), 1);
    assert_eq!(h.engine.transport().disconnects, 0);
    assert_idle(&h);
}

#[test]
fn two_requests_in_one_write_are_served_in_order() {
    let mut h = Harness::new();
    let mut bytes = Harness::frame(&Request::FirmwareVersion);
    bytes.extend(Harness::frame(&Request::FreeSpace));
    h.write(&bytes);
    h.run();

    assert!(matches!(
        h.responses().as_slice(),
        [Response::FirmwareVersion { .. }, Response::FreeSpace { .. }]
    ));
    assert_idle(&h);
}

#[test]
fn queued_requests_get_one_response_each() {
    let mut h = Harness::new();
    for _ in 0..5 {
        h.send(&Request::ImuData);
    }
    h.run();
    assert_eq!(h.responses().len(), 5);
    assert_idle(&h);
}

#[test]
fn stop_requests_produce_no_response() {
    let mut h = Harness::new();
    h.exchange(&Request::StartMicrophone {
        timestamp: Timestamp { seconds: 1, ms: 0 },
        mode: 1,
    });
    assert!(h.hw.status_flags().microphone);

    let responses = h.exchange(&Request::StopMicrophone);
    assert!(responses.is_empty());
    assert!(!h.hw.status_flags().microphone);
    assert_idle(&h);
}

#[test]
fn identify_flashes_led_without_response() {
    let mut h = Harness::new();
    let responses = h.exchange(&Request::Identify { timeout_secs: 2 });
    assert!(responses.is_empty());
    assert_eq!(h.hw.led().pin().transitions(), 2);
    assert!(!h.hw.led().pin().is_high());
}

#[test]
fn firmware_version_is_padded_label() {
    let mut config = BadgeConfig::default();
    config.firmware_version.clear();
    config.firmware_version.push_str("v4.1-test").unwrap();
    let mut h = Harness::with_config(config);

    match h.exchange(&Request::FirmwareVersion).as_slice() {
        [Response::FirmwareVersion { version }] => {
            assert_eq!(&version[..9], b"v4.1-test");
            assert!(version[9..].iter().all(|&b| b == 0));
        }
        other => panic!("unexpected {other:?}"),
    }
}

// ── Connection-fatal conditions ───────────────────────────────

#[test]
fn unknown_request_drops_connection_and_flushes_queue() {
    let mut h = Harness::new();
    h.write(&[0x01, 0x00, 0x63]);
    h.send(&Request::FreeSpace);
    h.run();

    assert!(h.responses().is_empty());
    assert_eq!(h.engine.transport().disconnects, 1);
    assert_idle(&h);

    // The next connection starts clean.
    assert_eq!(h.exchange(&Request::FreeSpace).len(), 1);
}

#[test]
fn truncated_request_is_malformed() {
    let mut h = Harness::new();
    // Start-download with no filename bytes.
    let tag = Request::StartDownload {
        filename: Default::default(),
    }
    .tag() as u8;
    h.write(&[0x01, 0x00, tag]);
    h.run();
    assert_eq!(h.engine.transport().disconnects, 1);
    assert_idle(&h);
}

#[test]
fn missing_payload_times_out() {
    let mut h = Harness::new();
    h.write(&[0x0A, 0x00, 0x01, 0x02]);
    h.run();
    assert_eq!(h.engine.transport().disconnects, 1);
    assert!(h.responses().is_empty());
    assert_idle(&h);
}

#[test]
fn oversized_frame_is_rejected() {
    let mut h = Harness::new();
    h.write(&[0x58, 0x02]);
    h.run();
    assert_eq!(h.engine.transport().disconnects, 1);
    assert_idle(&h);
}

#[test]
fn notification_shortfall_is_a_desync() {
    let mut h = Harness::new();
    let frame = Harness::frame(&status(1, 0));
    // The bytes arrive but the callback only accounted for part of them.
    h.write_claiming(&frame, 3);
    h.run();
    assert!(h.responses().is_empty());
    assert_eq!(h.engine.transport().disconnects, 1);
    assert_idle(&h);
}

#[test]
fn fatal_transmit_error_drops_connection() {
    let mut h = Harness::new();
    h.transport().outcomes.push_back(Err(TransmitError::Fatal));
    h.send(&Request::FreeSpace);
    h.run();
    assert_eq!(h.engine.transport().attempts, 1);
    assert_eq!(h.engine.transport().disconnects, 1);
    assert_idle(&h);
}

// ── Retry bound ───────────────────────────────────────────────

#[test]
fn transmit_retries_until_buffers_free_up() {
    let mut h = Harness::new();
    for _ in 0..49 {
        h.transport().outcomes.push_back(Err(TransmitError::NoBuffers));
    }
    h.send(&Request::FreeSpace);
    h.run();
    assert_eq!(h.engine.transport().attempts, 50);
    assert_eq!(h.responses().len(), 1);
    assert_eq!(h.engine.transport().disconnects, 0);
    assert_idle(&h);
}

#[test]
fn transmit_gives_up_after_max_attempts() {
    let mut h = Harness::new();
    for _ in 0..200 {
        h.transport().outcomes.push_back(Err(TransmitError::NoBuffers));
    }
    h.send(&Request::FreeSpace);
    h.run();
    assert_eq!(h.engine.transport().attempts, 50);
    assert!(h.responses().is_empty());
    assert_eq!(h.engine.transport().disconnects, 1);
    assert_idle(&h);
}

#[test]
fn retry_bound_follows_config() {
    let config = BadgeConfig {
        max_transmit_attempts: 3,
        ..BadgeConfig::default()
    };
    let mut h = Harness::with_config(config);
    for _ in 0..10 {
        h.transport().outcomes.push_back(Err(TransmitError::NoBuffers));
    }
    h.send(&Request::FreeSpace);
    h.run();
    assert_eq!(h.engine.transport().attempts, 3);
    assert_eq!(h.engine.transport().disconnects, 1);
}

#[test]
fn next_response_waits_for_pending_transmit() {
    let mut h = Harness::new();
    for _ in 0..5 {
        h.transport().outcomes.push_back(Err(TransmitError::NoBuffers));
    }
    h.send(&Request::FreeSpace);
    h.send(&Request::FirmwareVersion);
    h.run();

    let sent = &h.engine.transport().sent;
    assert_eq!(sent.len(), 2);
    assert!(matches!(decode_frame(&sent[0]), Response::FreeSpace { .. }));
    assert!(matches!(
        decode_frame(&sent[1]),
        Response::FirmwareVersion { .. }
    ));
    assert_idle(&h);
}
