//! Cooperative run queue.
//!
//! Every piece of protocol work is a run-to-completion [`Task`].  The
//! receive callback posts [`Task::Drain`]; the engine posts follow-ups as
//! it goes.  A task that cannot proceed yet returns [`Step::Retry`] and is
//! queued again behind whatever else is pending, instead of blocking.
//!
//! ```text
//! ┌─────────────┐ post(Drain) ┌─────────────────┐  next()  ┌──────────────┐
//! │ RX callback │────────────▶│    Scheduler    │─────────▶│   Protocol   │
//! └─────────────┘             │ (embassy-sync   │          │    Engine    │
//!                             │    channel)     │◀─────────│              │
//!                             └─────────────────┘  Retry / └──────────────┘
//!                                                  follow-ups
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::rpc::engine::{Outgoing, ResponseJob};

/// Run-queue depth.  At most one task of each kind is ever outstanding.
pub const RUN_QUEUE_DEPTH: usize = 8;

// ═══════════════════════════════════════════════════════════════
//  Task types
// ═══════════════════════════════════════════════════════════════

/// One unit of protocol work.
#[derive(Debug)]
pub enum Task {
    /// Reassemble and dispatch the oldest queued request.
    Drain,
    /// Build the response for a dispatched request.
    Respond(ResponseJob),
    /// (Re)transmit a built response.
    Transmit(Outgoing),
}

/// What a task asks of the scheduler when it returns.
#[derive(Debug)]
#[must_use]
pub enum Step {
    /// Finished; follow-ups, if any, were posted by the task itself.
    Done,
    /// Could not proceed yet; run this task again later.
    Retry(Task),
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

/// Bounded FIFO of [`Task`]s, shareable between the receive callback and
/// the main loop.
///
/// Drain requests coalesce: while one is queued, further posts of
/// [`Task::Drain`] are absorbed by it.
pub struct Scheduler {
    queue: Channel<CriticalSectionRawMutex, Task, RUN_QUEUE_DEPTH>,
    drain_pending: AtomicBool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            queue: Channel::new(),
            drain_pending: AtomicBool::new(false),
        }
    }

    /// Queue a task.  Returns `false` if the run queue is full.
    pub fn post(&self, task: Task) -> bool {
        let is_drain = matches!(task, Task::Drain);
        if is_drain && self.drain_pending.swap(true, Ordering::AcqRel) {
            return true;
        }

        if self.queue.try_send(task).is_ok() {
            return true;
        }

        if is_drain {
            self.drain_pending.store(false, Ordering::Release);
        }
        warn!("SCHED: run queue full, task dropped");
        false
    }

    /// Take the oldest task.
    pub fn next(&self) -> Option<Task> {
        let task = self.queue.try_receive().ok()?;
        if matches!(task, Task::Drain) {
            self.drain_pending.store(false, Ordering::Release);
        }
        Some(task)
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Run the oldest task through `run`, re-queueing it on
    /// [`Step::Retry`].  Returns `false` if there was nothing to run.
    pub fn run_once(&self, mut run: impl FnMut(Task) -> Step) -> bool {
        let Some(task) = self.next() else {
            return false;
        };
        if let Step::Retry(task) = run(task) {
            // `next` freed this task's slot, and at most one task of each
            // kind is ever outstanding.
            let requeued = self.post(task);
            debug_assert!(requeued, "retried task lost: run queue full");
        }
        true
    }

    /// Run tasks until the queue is empty or `max_steps` tasks have run.
    /// Returns the number of tasks run.
    pub fn run_until_idle(&self, mut run: impl FnMut(Task) -> Step, max_steps: usize) -> usize {
        let mut steps = 0;
        while steps < max_steps && self.run_once(&mut run) {
            steps += 1;
        }
        steps
    }
}
