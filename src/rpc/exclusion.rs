//! Non-blocking exclusion gates.
//!
//! The engine runs two independent critical sections: draining one request
//! (`Receiving`) and building plus transmitting one response
//! (`Responding`).  A gate never blocks; a task that finds it taken
//! returns [`Step::Retry`](crate::scheduler::Step::Retry) and the scheduler
//! runs it again later.
//!
//! ```text
//!            try_acquire()               release(permit)
//!   Idle ───────────────────▶ Active ───────────────────▶ Idle
//!    ▲                          │
//!    └──────── reset() ─────────┘   (epoch += 1, outstanding permits go stale)
//! ```
//!
//! A [`Permit`] is not `Clone`; handing it back is the only way to release
//! the gate.  A connection reset bumps the epoch so permits that were
//! still travelling through the run queue can no longer release anything.

use core::marker::PhantomData;

use log::debug;

/// Marker for the request-drain gate.
#[derive(Debug, PartialEq, Eq)]
pub enum Receiving {}

/// Marker for the response gate.
#[derive(Debug, PartialEq, Eq)]
pub enum Responding {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Active,
}

/// Capability proving ownership of a [`Gate<K>`] during one epoch.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping a permit leaves its gate held until the next reset"]
pub struct Permit<K> {
    epoch: u32,
    _kind: PhantomData<K>,
}

/// An `Idle | Active` exclusion flag.
#[derive(Debug)]
pub struct Gate<K> {
    state: GateState,
    epoch: u32,
    _kind: PhantomData<K>,
}

impl<K> Default for Gate<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Gate<K> {
    pub const fn new() -> Self {
        Self {
            state: GateState::Idle,
            epoch: 0,
            _kind: PhantomData,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == GateState::Idle
    }

    /// Take the gate if it is idle.
    pub fn try_acquire(&mut self) -> Option<Permit<K>> {
        match self.state {
            GateState::Active => None,
            GateState::Idle => {
                self.state = GateState::Active;
                Some(Permit {
                    epoch: self.epoch,
                    _kind: PhantomData,
                })
            }
        }
    }

    /// Whether `permit` was issued since the last reset.
    pub fn is_current(&self, permit: &Permit<K>) -> bool {
        permit.epoch == self.epoch
    }

    /// Hand the gate back.  A permit from before the last reset is ignored.
    pub fn release(&mut self, permit: Permit<K>) {
        if self.is_current(&permit) {
            self.state = GateState::Idle;
        } else {
            debug!("RPC: ignoring stale permit from epoch {}", permit.epoch);
        }
    }

    /// Force the gate idle and invalidate every outstanding permit.
    pub fn reset(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.state = GateState::Idle;
    }
}
