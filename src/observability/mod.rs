//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (signal, reason, listener, grace_ms)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, pretty or JSON)
//!     → process supervisor via lifecycle::notify (readiness only)
//! ```

pub mod logging;
