//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Init logging → Start coordinator → Hand over to the service
//!
//! Signals (signals.rs → coordinator.rs):
//!     SIGTERM/SIGINT/SIGQUIT → Termination gate → wait_for_termination() returns
//!     SIGHUP → EventQueue → processor thread → reload listeners (events.rs)
//!
//! Shutdown (shutdown.rs):
//!     Termination recorded → Broadcast reason to async tasks
//! ```
//!
//! # Design Decisions
//! - Signals are blocked on the initial thread and consumed by one dispatch thread
//! - Reload listeners run on their own thread, never on the dispatch thread
//! - Termination is recorded once; a repeated terminating signal skips the grace period
//! - No lock is held while a listener runs

pub mod coordinator;
pub mod events;
pub mod listeners;
pub mod notify;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod termination;

pub use coordinator::{Coordinator, CoordinatorBuilder, Spawn, StartError, StdSpawner};
pub use listeners::{ListenerRegistry, ListenerResult};
pub use notify::{NoopNotifier, ReadinessNotifier, ReadinessState, SystemdNotifier};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::{OsSignalSource, SignalClass, SignalSource};
pub use termination::{TerminationRecord, TerminationSource};
