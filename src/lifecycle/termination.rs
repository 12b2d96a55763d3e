//! Termination gate.
//!
//! Holds the write-once termination record and releases the thread parked in
//! `Coordinator::wait_for_termination` when the record is first written.

use std::time::{Duration, Instant};

use nix::sys::signal::Signal;
use parking_lot::{Condvar, Mutex};

/// What caused termination to be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSource {
    /// A terminating-class OS signal.
    Signal(Signal),
    /// `Coordinator::terminate_app`.
    Programmatic,
    /// The signal wait primitive failed; treated as termination.
    WaitFailure,
}

/// Written at most once, never overwritten afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationRecord {
    pub reason: String,
    pub grace: Duration,
    pub source: TerminationSource,
}

#[derive(Debug, Default)]
struct GateState {
    record: Option<TerminationRecord>,
    escalated: bool,
}

/// Single-acquire gate guarding the termination record.
#[derive(Debug, Default)]
pub struct TerminationGate {
    state: Mutex<GateState>,
    opened: Condvar,
}

impl TerminationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the termination request and open the gate.
    ///
    /// Returns `true` only for the call that actually wrote the record; later
    /// calls leave the first reason and grace period in place.
    pub fn request(&self, reason: impl Into<String>, grace: Duration, source: TerminationSource) -> bool {
        let mut state = self.state.lock();
        if state.record.is_some() {
            return false;
        }
        state.record = Some(TerminationRecord {
            reason: reason.into(),
            grace,
            source,
        });
        self.opened.notify_all();
        true
    }

    /// Cut a running grace period short.
    ///
    /// Has no effect until termination has been requested.
    pub fn escalate(&self) -> bool {
        let mut state = self.state.lock();
        if state.record.is_none() {
            return false;
        }
        state.escalated = true;
        self.opened.notify_all();
        true
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().record.is_some()
    }

    pub fn record(&self) -> Option<TerminationRecord> {
        self.state.lock().record.clone()
    }

    /// Block until the gate opens and return the record.
    pub fn wait(&self) -> TerminationRecord {
        let mut state = self.state.lock();
        loop {
            if let Some(record) = state.record.as_ref() {
                return record.clone();
            }
            self.opened.wait(&mut state);
        }
    }

    /// Sleep for the recorded grace period.
    ///
    /// Returns `true` when the sleep was cut short by [`escalate`](Self::escalate).
    pub fn hold_grace_period(&self) -> bool {
        let mut state = self.state.lock();
        let grace = match state.record.as_ref() {
            Some(record) => record.grace,
            None => return false,
        };
        // A grace too large for `Instant` lasts until escalation.
        let Some(deadline) = Instant::now().checked_add(grace) else {
            while !state.escalated {
                self.opened.wait(&mut state);
            }
            return true;
        };
        while !state.escalated {
            if self.opened.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.escalated
    }
}

/// Whole milliseconds of `duration` for log fields, saturating at `u64::MAX`.
pub fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
