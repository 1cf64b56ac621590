//! gRPC Streaming Server
//!
//! Implements the `SensorStreamService` gRPC service.
//!
//! # Architecture
//!
//! Each call to the `Server` route:
//!
//! 1. Registers a subscription with the `SubscriptionRegistry`
//! 2. Starts a fresh reading stream from the `ReadingEmitter`
//! 3. Converts each reading into a `Temperature` message
//! 4. Unregisters the subscription when tonic drops the response stream
//!    (client disconnect, cancellation or server shutdown)

pub mod server;

// Allow clippy warnings and missing docs in generated code
#[allow(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
pub mod proto {
    pub mod sensor {
        pub mod v1 {
            include!(concat!(env!("OUT_DIR"), "/sensor.v1.rs"));
        }
    }
}

pub use server::{SensorStreamServer, SensorStreamServerConfig};
