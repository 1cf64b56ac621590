//! Domain Layer - Core reading types and subscription bookkeeping.
//!
//! This layer contains the sensor reading model and the registry of live
//! subscriptions. Nothing here touches the network or the clock driver.

/// Sensor reading record and value sampling.
pub mod reading;

/// Live subscription tracking.
pub mod subscription;
