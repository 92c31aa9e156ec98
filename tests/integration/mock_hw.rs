//! Mock transport and test harness for integration tests.
//!
//! `MockTransport` replays bytes the test queued and records every
//! transmit attempt, so tests can assert on the full wire history.
//! `Harness` wires the real engine, service and hardware adapter around it.

use std::cell::Cell;
use std::collections::VecDeque;

use embassy_time::Duration;
use rhythmbadge::adapters::advertiser::Advertiser;
use rhythmbadge::adapters::hardware::BadgeHardware;
use rhythmbadge::adapters::identify_led::{IdentifyLed, NoDelay, RecordingPin};
use rhythmbadge::adapters::ram_store::RamFileStore;
use rhythmbadge::adapters::time::{SystickClock, TickSource};
use rhythmbadge::app::ports::ClockPort;
use rhythmbadge::app::service::BadgeService;
use rhythmbadge::config::BadgeConfig;
use rhythmbadge::rpc::codec::encode_frame;
use rhythmbadge::rpc::engine::{ProtocolEngine, receive_notification};
use rhythmbadge::rpc::messages::{BadgeAssignment, Request, Response};
use rhythmbadge::rpc::notifications::{Notification, NotificationQueue};
use rhythmbadge::rpc::transport::{AwaitError, TransmitError, Transport};
use rhythmbadge::scheduler::Scheduler;

// ── MockTransport ─────────────────────────────────────────────

#[derive(Default)]
pub struct MockTransport {
    pub rx: VecDeque<u8>,
    /// Outcomes for upcoming transmit attempts; `Ok` once exhausted.
    pub outcomes: VecDeque<Result<(), TransmitError>>,
    pub sent: Vec<Vec<u8>>,
    pub attempts: usize,
    pub disconnects: usize,
}

impl Transport for MockTransport {
    fn await_bytes(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<(), AwaitError> {
        if self.rx.len() < buf.len() {
            return Err(AwaitError::Timeout);
        }
        for b in buf.iter_mut() {
            *b = self.rx.pop_front().unwrap_or_default();
        }
        Ok(())
    }

    fn transmit(&mut self, frame: &[u8], _timeout: Duration) -> Result<(), TransmitError> {
        self.attempts += 1;
        let outcome = self.outcomes.pop_front().unwrap_or(Ok(()));
        if outcome.is_ok() {
            self.sent.push(frame.to_vec());
        }
        outcome
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.rx.clear();
    }
}

// ── ManualTicks ───────────────────────────────────────────────

/// Millisecond tick counter the test advances by hand.
#[derive(Default)]
pub struct ManualTicks(Cell<u64>);

impl ManualTicks {
    pub fn set(&self, ticks: u64) {
        self.0.set(ticks);
    }
}

impl TickSource for ManualTicks {
    fn ticks(&self) -> u64 {
        self.0.get()
    }

    fn ticks_per_second(&self) -> u32 {
        1000
    }
}

// ── Harness ───────────────────────────────────────────────────

pub type TestHardware =
    BadgeHardware<RamFileStore, SystickClock<ManualTicks>, RecordingPin, NoDelay>;

pub struct Harness {
    pub queue: &'static NotificationQueue,
    pub scheduler: &'static Scheduler,
    pub engine: ProtocolEngine<'static, MockTransport>,
    pub service: BadgeService,
    pub hw: TestHardware,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_config(BadgeConfig::default())
    }

    pub fn with_config(config: BadgeConfig) -> Self {
        let queue: &'static NotificationQueue = Box::leak(Box::new(NotificationQueue::new()));
        let scheduler: &'static Scheduler = Box::leak(Box::new(Scheduler::new()));
        let hw = BadgeHardware::new(
            SystickClock::new(ManualTicks::default()),
            Advertiser::new(
                [0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
                BadgeAssignment {
                    id: config.reset_badge_id,
                    group: config.reset_badge_group,
                },
            ),
            RamFileStore::new(1024),
            IdentifyLed::new(RecordingPin::default(), NoDelay::default()),
        );
        Self {
            queue,
            scheduler,
            engine: ProtocolEngine::new(queue, MockTransport::default(), &config),
            service: BadgeService::new(&config),
            hw,
        }
    }

    pub fn transport(&mut self) -> &mut MockTransport {
        self.engine.transport_mut()
    }

    pub fn set_ticks(&self, ticks: u64) {
        self.hw.clock().source().set(ticks);
    }

    /// Deliver `bytes` as one BLE write.
    pub fn write(&mut self, bytes: &[u8]) {
        self.write_claiming(bytes, bytes.len() as u16);
    }

    /// Deliver `bytes` but record a notification of `claimed` bytes.
    pub fn write_claiming(&mut self, bytes: &[u8], claimed: u16) {
        self.transport().rx.extend(bytes.iter().copied());
        let ticks = self.hw.now_ticks();
        let ts = self.hw.timestamp_at(ticks);
        receive_notification(
            self.queue,
            self.scheduler,
            Notification {
                timepoint_ticks: ticks,
                timepoint_seconds: ts.seconds,
                timepoint_millis: ts.ms,
                notification_len: claimed,
            },
        );
    }

    pub fn frame(request: &Request) -> Vec<u8> {
        let mut payload = [0u8; 64];
        let n = request.encode(&mut payload).expect("request fits");
        let mut frame = [0u8; 66];
        let len = encode_frame(&payload[..n], &mut frame).expect("frame fits");
        frame[..len].to_vec()
    }

    /// Deliver a request as a single write.
    pub fn send(&mut self, request: &Request) {
        let frame = Self::frame(request);
        self.write(&frame);
    }

    /// Deliver a request split at the given byte offsets.
    pub fn send_split(&mut self, request: &Request, cuts: &[usize]) {
        let frame = Self::frame(request);
        let mut start = 0;
        for &cut in cuts.iter().chain(std::iter::once(&frame.len())) {
            self.write(&frame[start..cut]);
            start = cut;
        }
    }

    /// Run the scheduler until it has nothing left to do.
    pub fn run(&mut self) -> usize {
        let scheduler = self.scheduler;
        let Self {
            engine,
            service,
            hw,
            ..
        } = self;
        scheduler.run_until_idle(|task| engine.run(task, scheduler, service, hw), 10_000)
    }

    /// Send one request, run, and return every response produced.
    pub fn exchange(&mut self, request: &Request) -> Vec<Response> {
        let before = self.engine.transport().sent.len();
        self.send(request);
        self.run();
        self.engine.transport().sent[before..]
            .iter()
            .map(|frame| decode_frame(frame))
            .collect()
    }

    pub fn responses(&self) -> Vec<Response> {
        self.engine
            .transport()
            .sent
            .iter()
            .map(|frame| decode_frame(frame))
            .collect()
    }
}

pub fn decode_frame(frame: &[u8]) -> Response {
    assert_eq!(frame.len(), 66, "response frames are fixed size");
    assert_eq!(u16::from_le_bytes([frame[0], frame[1]]), 64);
    Response::decode(&frame[2..]).expect("valid response")
}
