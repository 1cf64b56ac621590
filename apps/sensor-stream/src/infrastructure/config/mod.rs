//! Configuration Module
//!
//! Configuration loading for the sensor stream service.

mod settings;

pub use settings::{ConfigError, EmitterSettings, ServerSettings, StreamConfig};
