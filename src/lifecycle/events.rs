//! Reload event queue and the processor loop draining it.
//!
//! # Data Flow
//! ```text
//! dispatch thread ──push──▶ EventQueue ──pop──▶ processor thread
//!                                                  │
//!                                                  ▼
//!                                   snapshot(ListenerRegistry) → listeners
//! ```
//!
//! # Design Decisions
//! - The queue lock is released before any listener runs, so pushers never
//!   wait behind listener work
//! - One processor thread: reload passes never interleave

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::lifecycle::listeners::{self, ListenerRegistry};
use crate::lifecycle::notify::{ReadinessNotifier, ReadinessState};

/// Events consumed by the processor thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadEvent {
    /// Run one reload pass over the listener snapshot.
    ConfigReload,
    /// Stop the processor thread. Pushed only during teardown.
    ShutdownProcessor,
}

/// FIFO of reload events guarded by a mutex/condvar pair.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Mutex<VecDeque<ReloadEvent>>,
    available: Condvar,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: ReloadEvent) {
        let mut events = self.events.lock();
        events.push_back(event);
        self.available.notify_one();
    }

    /// Block until an event is available and remove it.
    pub fn pop(&self) -> ReloadEvent {
        let mut events = self.events.lock();
        loop {
            if let Some(event) = events.pop_front() {
                return event;
            }
            self.available.wait(&mut events);
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

/// Processor thread body. Returns after a [`ReloadEvent::ShutdownProcessor`].
pub fn run_processor(queue: &EventQueue, registry: &ListenerRegistry, notifier: &dyn ReadinessNotifier) {
    tracing::debug!("Event processor started");
    let mut passes: u64 = 0;

    loop {
        match queue.pop() {
            ReloadEvent::ConfigReload => {
                passes += 1;
                notifier.notify(ReadinessState::Reloading);

                let snapshot = registry.snapshot();
                tracing::info!(pass = passes, listeners = snapshot.len(), "Processing config reload");
                let failures = listeners::run_snapshot(&snapshot);
                if failures > 0 {
                    tracing::warn!(pass = passes, failures, "Config reload finished with failing listeners");
                } else {
                    tracing::info!(pass = passes, "Config reload finished");
                }

                notifier.notify(ReadinessState::Ready);
            }
            ReloadEvent::ShutdownProcessor => {
                tracing::debug!(passes, pending = queue.len(), "Event processor stopping");
                return;
            }
        }
    }
}
