//! Shared utilities for coordinator integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use nix::sys::signal::Signal;
use parking_lot::{Condvar, Mutex};

use lifecycle_coordinator::lifecycle::coordinator::DISPATCH_THREAD;
use lifecycle_coordinator::lifecycle::signals::{SignalSource, SignalWaitError};
use lifecycle_coordinator::lifecycle::{ReadinessNotifier, ReadinessState, Spawn, StdSpawner};

#[derive(Default)]
struct FakeState {
    pending: VecDeque<Result<Signal, nix::Error>>,
    waiting: bool,
    interrupted: bool,
    blocked: bool,
    block_error: Option<nix::Error>,
}

/// Deterministic signal source fed by the test.
#[derive(Default)]
pub struct FakeSignalSource {
    state: Mutex<FakeState>,
    changed: Condvar,
}

impl FakeSignalSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Source whose mask operation fails.
    pub fn failing_mask() -> Arc<Self> {
        let source = Self::default();
        source.state.lock().block_error = Some(nix::Error::EINVAL);
        Arc::new(source)
    }

    pub fn send(&self, signal: Signal) {
        let mut state = self.state.lock();
        state.pending.push_back(Ok(signal));
        self.changed.notify_all();
    }

    pub fn fail_next_wait(&self, error: nix::Error) {
        let mut state = self.state.lock();
        state.pending.push_back(Err(error));
        self.changed.notify_all();
    }

    pub fn is_blocked(&self) -> bool {
        self.state.lock().blocked
    }

    pub fn is_interrupted(&self) -> bool {
        self.state.lock().interrupted
    }

    /// Wait until every sent signal has been handled and the dispatcher is
    /// parked in the next wait.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !(state.pending.is_empty() && state.waiting) {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return state.pending.is_empty() && state.waiting;
            }
        }
        true
    }
}

impl SignalSource for FakeSignalSource {
    fn block_on_current_thread(&self) -> nix::Result<()> {
        let mut state = self.state.lock();
        if let Some(error) = state.block_error {
            return Err(error);
        }
        state.blocked = true;
        Ok(())
    }

    fn unblock_on_current_thread(&self) -> nix::Result<()> {
        self.state.lock().blocked = false;
        Ok(())
    }

    fn await_next(&self) -> Result<Signal, SignalWaitError> {
        let mut state = self.state.lock();
        loop {
            if state.interrupted {
                state.waiting = false;
                return Err(SignalWaitError::Interrupted);
            }
            if let Some(next) = state.pending.pop_front() {
                state.waiting = false;
                self.changed.notify_all();
                return next.map_err(SignalWaitError::from);
            }
            state.waiting = true;
            self.changed.notify_all();
            self.changed.wait(&mut state);
        }
    }

    fn interrupt(&self) {
        let mut state = self.state.lock();
        state.interrupted = true;
        self.changed.notify_all();
    }
}

/// Notifier that remembers every state it was given.
#[derive(Default)]
pub struct RecordingNotifier {
    states: Mutex<Vec<ReadinessState>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn states(&self) -> Vec<ReadinessState> {
        self.states.lock().clone()
    }

    pub fn count(&self, state: ReadinessState) -> usize {
        self.states.lock().iter().filter(|s| **s == state).count()
    }
}

impl ReadinessNotifier for RecordingNotifier {
    fn notify(&self, state: ReadinessState) {
        self.states.lock().push(state);
    }
}

/// Spawner that refuses to start the thread with the given name.
pub struct FailingSpawner {
    fail_on: &'static str,
    pub spawned: AtomicUsize,
}

impl FailingSpawner {
    pub fn on_dispatcher() -> Arc<Self> {
        Arc::new(Self {
            fail_on: DISPATCH_THREAD,
            spawned: AtomicUsize::new(0),
        })
    }

    pub fn on(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            fail_on: name,
            spawned: AtomicUsize::new(0),
        })
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl Spawn for FailingSpawner {
    fn spawn(&self, name: &str, body: Box<dyn FnOnce() + Send + 'static>) -> io::Result<JoinHandle<()>> {
        if name == self.fail_on {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "thread limit reached"));
        }
        let handle = StdSpawner.spawn(name, body)?;
        self.spawned.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_for<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
