//! OS signal handling.
//!
//! # Responsibilities
//! - Classify watched signals into terminating and reloading classes
//! - Block the watched set so only the dispatch thread receives it
//! - Wait synchronously for the next watched signal
//!
//! # Design Decisions
//! - One blocking wait covers both classes, so a single thread consumes
//!   every watched signal
//! - SIGINT/SIGTERM/SIGQUIT terminate, SIGHUP reloads
//! - Sources are injectable so most tests feed signals deterministically

use std::borrow::Cow;

use nix::sys::pthread::{pthread_kill, pthread_self, Pthread};
use nix::sys::signal::{SigSet, Signal};
use parking_lot::Mutex;
use thiserror::Error;

/// Signals consumed by the dispatch loop.
pub const WATCHED_SIGNALS: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGTERM,
    Signal::SIGQUIT,
    Signal::SIGHUP,
];

/// What a watched signal asks the process to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalClass {
    Terminating,
    Reloading,
}

/// A watched signal together with its class and a human-readable reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedSignal {
    pub signal: Signal,
    pub class: SignalClass,
    pub reason: &'static str,
}

/// Map a signal to its class. Returns `None` for signals outside the watched set.
pub fn classify(signal: Signal) -> Option<ClassifiedSignal> {
    let class = match signal {
        Signal::SIGINT | Signal::SIGTERM | Signal::SIGQUIT => SignalClass::Terminating,
        Signal::SIGHUP => SignalClass::Reloading,
        _ => return None,
    };
    Some(ClassifiedSignal {
        signal,
        class,
        reason: known_description(signal)?,
    })
}

/// Human-readable description of a signal, `Unknown signal <n>` when unmapped.
pub fn describe(signal: Signal) -> Cow<'static, str> {
    match known_description(signal) {
        Some(text) => Cow::Borrowed(text),
        None => Cow::Owned(format!("Unknown signal {}", signal as i32)),
    }
}

fn known_description(signal: Signal) -> Option<&'static str> {
    let text = match signal {
        Signal::SIGINT => "Interactive attention signal",
        Signal::SIGTERM => "Termination request",
        Signal::SIGQUIT => "Quit",
        Signal::SIGHUP => "Hangup",
        Signal::SIGILL => "Illegal instruction",
        Signal::SIGABRT => "Abnormal termination",
        Signal::SIGFPE => "Erroneous arithmetic operation",
        Signal::SIGSEGV => "Invalid access to storage",
        Signal::SIGTRAP => "Trace/breakpoint trap",
        Signal::SIGKILL => "Killed",
        Signal::SIGPIPE => "Broken pipe",
        Signal::SIGALRM => "Alarm clock",
        _ => return None,
    };
    Some(text)
}

/// Failure of [`SignalSource::await_next`].
#[derive(Debug, Error)]
pub enum SignalWaitError {
    #[error("Signal wait operation failed: {0}")]
    Wait(#[from] nix::Error),

    /// The source was interrupted by the coordinator and will not deliver more signals.
    #[error("Signal wait interrupted")]
    Interrupted,
}

/// External event source feeding the dispatch loop.
pub trait SignalSource: Send + Sync + 'static {
    /// Block the watched signals on the calling thread. Threads spawned
    /// afterwards inherit the mask.
    fn block_on_current_thread(&self) -> nix::Result<()>;

    /// Undo [`block_on_current_thread`](Self::block_on_current_thread).
    fn unblock_on_current_thread(&self) -> nix::Result<()>;

    /// Block until the next watched signal arrives.
    fn await_next(&self) -> Result<Signal, SignalWaitError>;

    /// Wake a pending [`await_next`](Self::await_next) so the dispatch loop
    /// can observe that it should stop. Every later wait returns
    /// [`SignalWaitError::Interrupted`].
    fn interrupt(&self);
}

#[derive(Debug, Default)]
struct WaiterState {
    waiter: Option<Pthread>,
    interrupted: bool,
}

/// Signal source backed by `sigwait(3)` on the watched set.
#[derive(Debug)]
pub struct OsSignalSource {
    watched: SigSet,
    state: Mutex<WaiterState>,
}

impl OsSignalSource {
    pub fn new() -> Self {
        let mut watched = SigSet::empty();
        for signal in WATCHED_SIGNALS {
            watched.add(signal);
        }
        Self {
            watched,
            state: Mutex::new(WaiterState::default()),
        }
    }

    pub fn watched(&self) -> &SigSet {
        &self.watched
    }
}

impl Default for OsSignalSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalSource for OsSignalSource {
    fn block_on_current_thread(&self) -> nix::Result<()> {
        self.watched.thread_block()
    }

    fn unblock_on_current_thread(&self) -> nix::Result<()> {
        self.watched.thread_unblock()
    }

    fn await_next(&self) -> Result<Signal, SignalWaitError> {
        {
            let mut state = self.state.lock();
            if state.interrupted {
                return Err(SignalWaitError::Interrupted);
            }
            // A kill sent before sigwait starts stays pending on this thread.
            state.waiter = Some(pthread_self());
        }

        let result = self.watched.wait();
        self.state.lock().waiter = None;
        Ok(result?)
    }

    fn interrupt(&self) {
        let mut state = self.state.lock();
        state.interrupted = true;
        if let Some(waiter) = state.waiter.take() {
            if let Err(e) = pthread_kill(waiter, Signal::SIGTERM) {
                tracing::warn!(error = %e, "Failed to interrupt signal dispatch thread");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_terminating() {
        for signal in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGQUIT] {
            let classified = classify(signal).unwrap();
            assert_eq!(classified.class, SignalClass::Terminating);
            assert_eq!(classified.signal, signal);
        }
        assert_eq!(classify(Signal::SIGTERM).unwrap().reason, "Termination request");
        assert_eq!(classify(Signal::SIGINT).unwrap().reason, "Interactive attention signal");
    }

    #[test]
    fn test_classify_reloading() {
        let classified = classify(Signal::SIGHUP).unwrap();
        assert_eq!(classified.class, SignalClass::Reloading);
        assert_eq!(classified.reason, "Hangup");
    }

    #[test]
    fn test_unwatched_signals_are_not_classified() {
        assert!(classify(Signal::SIGUSR1).is_none());
        assert!(classify(Signal::SIGPIPE).is_none());
        assert_eq!(describe(Signal::SIGPIPE), "Broken pipe");
    }

    #[test]
    fn test_unknown_signal_names_its_number() {
        let expected = format!("Unknown signal {}", Signal::SIGUSR1 as i32);
        assert_eq!(describe(Signal::SIGUSR1), expected);
    }

    #[test]
    fn test_os_source_watches_all_classes() {
        let source = OsSignalSource::new();
        for signal in WATCHED_SIGNALS {
            assert!(source.watched().contains(signal));
        }
        assert!(!source.watched().contains(Signal::SIGUSR1));
    }

    #[test]
    fn test_interrupted_source_stops_waiting() {
        let source = OsSignalSource::new();
        source.interrupt();
        assert!(matches!(source.await_next(), Err(SignalWaitError::Interrupted)));
    }
}
