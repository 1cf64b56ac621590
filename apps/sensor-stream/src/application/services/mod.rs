//! Application Services
//!
//! - `ReadingEmitter`: hands out one independent periodic reading stream
//!   per subscription

mod emitter;

pub use emitter::{EmitterError, ReadingEmitter, ReadingStream};
