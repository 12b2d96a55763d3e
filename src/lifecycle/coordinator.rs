//! Process lifecycle coordinator.
//!
//! Owns the signal dispatch thread, the event processor thread, the reload
//! event queue, the listener registry and the termination gate.
//!
//! ```text
//!  signal ──▶ dispatch thread ──Reloading──▶ EventQueue ──▶ processor ──▶ listeners
//!                   │
//!                   └──Terminating──▶ TerminationGate ──▶ wait_for_termination()
//!                                           ▲
//!  terminate_app() ─────────────────────────┘
//! ```

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nix::sys::signal::Signal;
use parking_lot::Mutex;
use thiserror::Error;

use crate::lifecycle::events::{self, EventQueue, ReloadEvent};
use crate::lifecycle::listeners::{ListenerRegistry, ListenerResult};
use crate::lifecycle::notify::{NoopNotifier, ReadinessNotifier, ReadinessState};
use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal};
use crate::lifecycle::signals::{
    classify, describe, OsSignalSource, SignalClass, SignalSource, SignalWaitError,
};
use crate::lifecycle::termination::{whole_millis, TerminationGate, TerminationRecord, TerminationSource};

pub const PROCESSOR_THREAD: &str = "lifecycle-events";
pub const DISPATCH_THREAD: &str = "lifecycle-signals";

/// Reason recorded by [`Coordinator::terminate_app`].
pub const PROGRAMMATIC_REASON: &str = "Programmatic termination";

/// Reason recorded when the signal wait itself fails.
pub const WAIT_FAILURE_REASON: &str = "Unknown (signal wait failed)";

/// Failure of [`Coordinator::start`].
#[derive(Debug, Error)]
pub enum StartError {
    #[error("Failed to block signals with sigprocmask(): {0}")]
    SignalMaskFailed(#[source] nix::Error),

    #[error("Failed to create signal handler thread: {0}")]
    ThreadCreationFailed(#[source] io::Error),

    #[error("Coordinator already started")]
    AlreadyStarted,
}

/// Spawns the coordinator's worker threads.
pub trait Spawn: Send + Sync {
    fn spawn(&self, name: &str, body: Box<dyn FnOnce() + Send + 'static>) -> io::Result<JoinHandle<()>>;
}

/// Named OS threads via [`std::thread::Builder`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdSpawner;

impl Spawn for StdSpawner {
    fn spawn(&self, name: &str, body: Box<dyn FnOnce() + Send + 'static>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new().name(name.to_string()).spawn(body)
    }
}

/// State shared with the worker threads.
struct Shared {
    source: Arc<dyn SignalSource>,
    notifier: Arc<dyn ReadinessNotifier>,
    queue: EventQueue,
    listeners: ListenerRegistry,
    gate: TerminationGate,
    shutdown: Shutdown,
    stopping: AtomicBool,
    signal_grace: Duration,
}

impl Shared {
    /// Write the termination record if none exists yet. Returns `true` for
    /// the request that opened the gate.
    fn request_termination(&self, reason: &str, grace: Duration, source: TerminationSource) -> bool {
        if !self.gate.request(reason, grace, source) {
            return false;
        }
        self.notifier.notify(ReadinessState::Stopping);
        self.shutdown.trigger(reason);
        true
    }

    fn dispatch_signals(&self) {
        self.notifier.notify(ReadinessState::Ready);
        tracing::info!("Signal dispatcher waiting for signals");

        while !self.stopping.load(Ordering::SeqCst) {
            let signal = match self.source.await_next() {
                Ok(signal) => signal,
                Err(SignalWaitError::Interrupted) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Signal wait failed, treating as termination");
                    self.request_termination(WAIT_FAILURE_REASON, Duration::ZERO, TerminationSource::WaitFailure);
                    break;
                }
            };

            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
            self.handle_signal(signal);
        }

        tracing::debug!("Signal dispatcher stopped");
    }

    fn handle_signal(&self, signal: Signal) {
        let Some(classified) = classify(signal) else {
            tracing::warn!(signal = %signal, description = %describe(signal), "Ignoring unwatched signal");
            return;
        };

        match classified.class {
            SignalClass::Reloading => {
                if self.gate.is_open() {
                    tracing::info!(signal = %signal, "Termination in progress, reload request dropped");
                    return;
                }
                tracing::info!(signal = %signal, reason = classified.reason, "Config reload requested");
                self.queue.push(ReloadEvent::ConfigReload);
            }
            SignalClass::Terminating => {
                let source = TerminationSource::Signal(signal);
                if self.request_termination(classified.reason, self.signal_grace, source) {
                    tracing::info!(
                        signal = %signal,
                        reason = classified.reason,
                        grace_ms = whole_millis(self.signal_grace),
                        "Termination signal received"
                    );
                } else {
                    tracing::warn!(signal = %signal, "Repeated termination signal, skipping grace period");
                    self.gate.escalate();
                }
            }
        }
    }
}

#[derive(Default)]
struct Threads {
    started: bool,
    processor: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

/// Builder for [`Coordinator`].
pub struct CoordinatorBuilder {
    source: Option<Arc<dyn SignalSource>>,
    notifier: Option<Arc<dyn ReadinessNotifier>>,
    spawner: Option<Arc<dyn Spawn>>,
    signal_grace: Duration,
}

impl CoordinatorBuilder {
    pub fn source(mut self, source: Arc<dyn SignalSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn ReadinessNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn spawner(mut self, spawner: Arc<dyn Spawn>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Grace period applied when termination comes from a signal.
    pub fn signal_grace(mut self, grace: Duration) -> Self {
        self.signal_grace = grace;
        self
    }

    pub fn build(self) -> Coordinator {
        let shared = Shared {
            source: self.source.unwrap_or_else(|| Arc::new(OsSignalSource::new())),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(NoopNotifier)),
            queue: EventQueue::new(),
            listeners: ListenerRegistry::new(),
            gate: TerminationGate::new(),
            shutdown: Shutdown::new(),
            stopping: AtomicBool::new(false),
            signal_grace: self.signal_grace,
        };
        Coordinator {
            shared: Arc::new(shared),
            spawner: self.spawner.unwrap_or_else(|| Arc::new(StdSpawner)),
            threads: Mutex::new(Threads::default()),
        }
    }
}

/// Turns termination and reload requests into a deterministic protocol.
///
/// Construct exactly one per process and pass it by reference to everything
/// that registers reload listeners or waits for termination.
///
/// # Usage
///
/// ```ignore
/// let coordinator = Coordinator::new();
/// coordinator.start()?;                 // on the initial thread, before spawning others
/// coordinator.register_config_reload_listener(|| { store.reload()?; Ok(()) });
/// let reason = coordinator.wait_for_termination();
/// coordinator.shutdown();
/// ```
pub struct Coordinator {
    shared: Arc<Shared>,
    spawner: Arc<dyn Spawn>,
    threads: Mutex<Threads>,
}

impl Coordinator {
    /// Coordinator watching real OS signals, without supervisor notifications.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder {
            source: None,
            notifier: None,
            spawner: None,
            signal_grace: Duration::ZERO,
        }
    }

    /// Block the watched signals on the calling thread, then spawn the event
    /// processor and the signal dispatcher, in that order.
    ///
    /// Must run on the initial thread before any other thread is spawned.
    /// On failure no worker thread is left running.
    pub fn start(&self) -> Result<(), StartError> {
        let mut threads = self.threads.lock();
        if threads.started {
            return Err(StartError::AlreadyStarted);
        }

        self.shared
            .source
            .block_on_current_thread()
            .map_err(StartError::SignalMaskFailed)?;

        let shared = self.shared.clone();
        let processor = match self.spawner.spawn(
            PROCESSOR_THREAD,
            Box::new(move || {
                events::run_processor(&shared.queue, &shared.listeners, shared.notifier.as_ref())
            }),
        ) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, thread = PROCESSOR_THREAD, "Failed to spawn worker thread");
                self.restore_signal_mask();
                return Err(StartError::ThreadCreationFailed(e));
            }
        };

        let shared = self.shared.clone();
        let dispatcher = match self
            .spawner
            .spawn(DISPATCH_THREAD, Box::new(move || shared.dispatch_signals()))
        {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, thread = DISPATCH_THREAD, "Failed to spawn worker thread");
                self.shared.queue.push(ReloadEvent::ShutdownProcessor);
                if processor.join().is_err() {
                    tracing::error!("Event processor thread panicked");
                }
                self.restore_signal_mask();
                return Err(StartError::ThreadCreationFailed(e));
            }
        };

        threads.started = true;
        threads.processor = Some(processor);
        threads.dispatcher = Some(dispatcher);
        tracing::info!("Lifecycle coordinator started");
        Ok(())
    }

    fn restore_signal_mask(&self) {
        if let Err(e) = self.shared.source.unblock_on_current_thread() {
            tracing::warn!(error = %e, "Failed to restore signal mask");
        }
    }

    /// Append a reload listener. Never blocks on queued or running reloads.
    pub fn register_config_reload_listener<F>(&self, listener: F)
    where
        F: Fn() -> ListenerResult + Send + Sync + 'static,
    {
        self.shared.listeners.register(listener);
    }

    /// Handle to the listener registry, for registering from inside a listener.
    pub fn reload_listeners(&self) -> ListenerRegistry {
        self.shared.listeners.clone()
    }

    /// Request termination from application code.
    ///
    /// Only the first request, by signal or by this call, decides the reason
    /// and the grace period.
    pub fn terminate_app(&self, grace: Duration) {
        let grace_ms = whole_millis(grace);
        if self
            .shared
            .request_termination(PROGRAMMATIC_REASON, grace, TerminationSource::Programmatic)
        {
            tracing::info!(grace_ms, "Programmatic termination requested");
        } else {
            tracing::debug!(grace_ms, "Termination already requested, ignoring");
        }
    }

    /// Block until termination is requested, hold the grace period, stop the
    /// signal dispatcher and return the termination reason.
    ///
    /// A repeated terminating signal during the grace period returns at once.
    pub fn wait_for_termination(&self) -> String {
        let record = self.shared.gate.wait();
        tracing::info!(
            reason = %record.reason,
            grace_ms = whole_millis(record.grace),
            "Termination gate opened"
        );

        if self.shared.gate.hold_grace_period() {
            tracing::warn!("Grace period cut short");
        }

        self.stop_dispatcher();
        record.reason
    }

    fn stop_dispatcher(&self) {
        self.shared.stopping.store(true, Ordering::SeqCst);
        let dispatcher = self.threads.lock().dispatcher.take();
        if let Some(handle) = dispatcher {
            self.shared.source.interrupt();
            if handle.join().is_err() {
                tracing::error!("Signal dispatcher thread panicked");
            }
        }
    }

    /// Stop and join both worker threads. Pending reload events are processed
    /// before the processor exits. Safe to call more than once.
    pub fn shutdown(&self) {
        self.stop_dispatcher();

        let processor = self.threads.lock().processor.take();
        if let Some(handle) = processor {
            self.shared.queue.push(ReloadEvent::ShutdownProcessor);
            if handle.join().is_err() {
                tracing::error!("Event processor thread panicked");
            }
            tracing::debug!("Lifecycle coordinator stopped");
        }
    }

    /// Watch channel receiving the termination reason.
    pub fn subscribe_termination(&self) -> ShutdownSignal {
        self.shared.shutdown.subscribe()
    }

    pub fn termination_record(&self) -> Option<TerminationRecord> {
        self.shared.gate.record()
    }

    pub fn is_started(&self) -> bool {
        self.threads.lock().started
    }

    /// Whether the dispatcher or processor thread is still owned by the coordinator.
    pub fn has_running_threads(&self) -> bool {
        let threads = self.threads.lock();
        threads.processor.is_some() || threads.dispatcher.is_some()
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
