//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the reading emitter and the port interfaces it is
//! wired against.

/// Port interfaces for external systems (value sources).
pub mod ports;

/// Application services (periodic reading emitter).
pub mod services;
