//! Process lifecycle coordination library.
//!
//! Turns termination and reload requests, from OS signals or application
//! code, into an ordered, thread-safe protocol.

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod service;

pub use config::schema::AppConfig;
pub use lifecycle::Coordinator;
