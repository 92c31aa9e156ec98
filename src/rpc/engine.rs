//! Protocol engine: turns queued notifications into dispatched requests
//! and transmitted responses.
//!
//! The engine owns the transport, the request buffer and both exclusion
//! gates.  It never blocks the scheduler except for the two bounded reads
//! of one frame.  Work is split into three task kinds:
//!
//! 1. **Drain**: take the receive gate, reassemble one frame, charge it
//!    against the notification queue, decode it and hand it to
//!    [`BadgeService::handle`].
//! 2. **Respond**: take the response gate, build the response, give the
//!    receive gate back and schedule the next drain.
//! 3. **Transmit**: send the framed response; on "no buffers" try again
//!    later, up to the configured number of attempts.
//!
//! Every connection-fatal condition goes through [`ProtocolEngine::fail_connection`],
//! which flushes the queue, drops the link and resets both gates.

use embassy_time::Duration;
use log::{debug, info, warn};

use super::codec::{HEADER_SIZE, encode_frame};
use super::exclusion::{Gate, GateState, Permit, Receiving, Responding};
use super::messages::{RESPONSE_PAYLOAD_LEN, Request, Response};
use super::notifications::{NOTIFICATION_QUEUE_CAP, Notification, NotificationQueue};
use super::reassembly::{Reassembler, consume_notifications};
use super::transport::{TransmitError, Transport};
use crate::app::ports::BadgePorts;
use crate::app::service::{ArrivalStamp, BadgeService, Dispatch, PendingResponse};
use crate::config::BadgeConfig;
use crate::error::ProtocolError;
use crate::rpc::messages::Timestamp;
use crate::scheduler::{Scheduler, Step, Task};

/// Length of every response frame on the wire.
pub const RESPONSE_FRAME_LEN: usize = HEADER_SIZE + RESPONSE_PAYLOAD_LEN;

/// A dispatched request waiting for its response to be built.
#[derive(Debug)]
pub struct ResponseJob {
    permit: Permit<Receiving>,
    arrival: ArrivalStamp,
    pending: PendingResponse,
}

/// A built response on its way out.
#[derive(Debug)]
pub struct Outgoing {
    permit: Permit<Responding>,
    response: Response,
    attempts: u8,
}

/// Record a transport notification and schedule a drain.
///
/// Called from the receive callback.  A full queue drops the notification;
/// the reassembler will later report the shortfall as a desync.
pub fn receive_notification<const N: usize>(
    queue: &NotificationQueue<N>,
    scheduler: &Scheduler,
    notification: Notification,
) -> bool {
    if !queue.push(notification) {
        warn!(
            "RPC: notification queue full, dropped {} bytes",
            notification.notification_len
        );
        return false;
    }
    scheduler.post(Task::Drain)
}

// ───────────────────────────────────────────────────────────────
// Engine
// ───────────────────────────────────────────────────────────────

pub struct ProtocolEngine<'q, T: Transport, const N: usize = NOTIFICATION_QUEUE_CAP> {
    queue: &'q NotificationQueue<N>,
    transport: T,
    reassembler: Reassembler,
    receiving: Gate<Receiving>,
    responding: Gate<Responding>,
    await_timeout: Duration,
    transmit_timeout: Duration,
    max_attempts: u8,
}

impl<'q, T: Transport, const N: usize> ProtocolEngine<'q, T, N> {
    pub fn new(queue: &'q NotificationQueue<N>, transport: T, config: &BadgeConfig) -> Self {
        Self {
            queue,
            transport,
            reassembler: Reassembler::new(),
            receiving: Gate::new(),
            responding: Gate::new(),
            await_timeout: config.await_data_timeout(),
            transmit_timeout: config.transmit_timeout(),
            max_attempts: config.max_transmit_attempts.max(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn receive_state(&self) -> GateState {
        self.receiving.state()
    }

    pub fn respond_state(&self) -> GateState {
        self.responding.state()
    }

    /// Run one task.
    pub fn run<P: BadgePorts>(
        &mut self,
        task: Task,
        scheduler: &Scheduler,
        service: &mut BadgeService,
        ports: &mut P,
    ) -> Step {
        match task {
            Task::Drain => self.drain(scheduler, service, ports),
            Task::Respond(job) => self.respond(job, scheduler, service, ports),
            Task::Transmit(outgoing) => self.transmit(outgoing),
        }
    }

    // ── Drain ─────────────────────────────────────────────────

    fn drain<P: BadgePorts>(
        &mut self,
        scheduler: &Scheduler,
        service: &mut BadgeService,
        ports: &mut P,
    ) -> Step {
        let Some(permit) = self.receiving.try_acquire() else {
            return Step::Retry(Task::Drain);
        };

        let Some(front) = self.queue.peek(0) else {
            self.queue.clear();
            self.receiving.release(permit);
            return Step::Done;
        };

        let mut arrival = ArrivalStamp {
            ticks: front.timepoint_ticks,
            timestamp: Timestamp {
                seconds: front.timepoint_seconds,
                ms: front.timepoint_millis,
            },
            clock_synced: ports.is_synced(),
        };

        let request = match self.read_request() {
            Ok(request) => request,
            Err(reason) => {
                self.receiving.release(permit);
                self.fail_connection(reason);
                return Step::Done;
            }
        };
        debug!(
            "RPC: {:?} arrived at tick {} (synced: {})",
            request.tag(),
            arrival.ticks,
            arrival.clock_synced
        );

        match service.handle(request, &mut arrival, ports) {
            Dispatch::Finished => {
                self.receiving.release(permit);
                scheduler.post(Task::Drain);
            }
            Dispatch::Respond(pending) => {
                let job = ResponseJob {
                    permit,
                    arrival,
                    pending,
                };
                if !scheduler.post(Task::Respond(job)) {
                    self.fail_connection(ProtocolError::SchedulerFull);
                }
            }
        }
        Step::Done
    }

    fn read_request(&mut self) -> Result<Request, ProtocolError> {
        let payload = self
            .reassembler
            .read_frame(&mut self.transport, self.await_timeout)?;
        consume_notifications(self.queue, payload.len() as u16)?;
        Request::decode(payload)
    }

    // ── Respond ───────────────────────────────────────────────

    fn respond<P: BadgePorts>(
        &mut self,
        job: ResponseJob,
        scheduler: &Scheduler,
        service: &mut BadgeService,
        ports: &mut P,
    ) -> Step {
        if !self.receiving.is_current(&job.permit) {
            debug!("RPC: dropping response to a reset connection");
            return Step::Done;
        }
        let Some(permit) = self.responding.try_acquire() else {
            return Step::Retry(Task::Respond(job));
        };

        let response = service.respond(job.pending, &job.arrival, ports);

        // The request is complete once its response is built.
        self.receiving.release(job.permit);
        scheduler.post(Task::Drain);

        self.transmit(Outgoing {
            permit,
            response,
            attempts: 0,
        })
    }

    // ── Transmit ──────────────────────────────────────────────

    fn transmit(&mut self, mut outgoing: Outgoing) -> Step {
        if !self.responding.is_current(&outgoing.permit) {
            debug!("RPC: dropping transmit for a reset connection");
            return Step::Done;
        }

        let payload = outgoing.response.encode();
        let mut frame = [0u8; RESPONSE_FRAME_LEN];
        let Some(len) = encode_frame(&payload, &mut frame) else {
            self.responding.release(outgoing.permit);
            self.fail_connection(ProtocolError::TransmitFailed);
            return Step::Done;
        };

        outgoing.attempts = outgoing.attempts.saturating_add(1);
        match self.transport.transmit(&frame[..len], self.transmit_timeout) {
            Ok(()) => {
                debug!(
                    "RPC: {:?} sent after {} attempt(s)",
                    outgoing.response.tag(),
                    outgoing.attempts
                );
                self.responding.release(outgoing.permit);
                Step::Done
            }
            Err(TransmitError::NoBuffers) if outgoing.attempts < self.max_attempts => {
                Step::Retry(Task::Transmit(outgoing))
            }
            Err(e) => {
                let reason = match e {
                    TransmitError::NoBuffers => ProtocolError::RetriesExhausted(outgoing.attempts),
                    TransmitError::Fatal => e.into(),
                };
                self.responding.release(outgoing.permit);
                self.fail_connection(reason);
                Step::Done
            }
        }
    }

    // ── Recovery ──────────────────────────────────────────────

    /// Abandon the connection: flush the queue, drop the link and return
    /// both gates to idle.  Safe to call repeatedly.
    pub fn fail_connection(&mut self, reason: ProtocolError) {
        warn!("RPC: connection reset: {reason}");
        self.queue.clear();
        self.transport.disconnect();
        self.receiving.reset();
        self.responding.reset();
        info!("RPC: ready for a new connection");
    }
}
