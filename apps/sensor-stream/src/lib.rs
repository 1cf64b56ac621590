#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Sensor Stream - Periodic Reading Emitter
//!
//! A gRPC service with a single server-streaming route (`Server`) that
//! emits a randomly generated temperature reading once per interval.
//! Every call gets its own independent sequence.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Reading record and subscription bookkeeping
//!   - `reading`: The `Reading` type and the `ValueSource` abstraction
//!   - `subscription`: Registry of live subscriptions
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Value source factory
//!   - `services`: The periodic reading emitter
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `grpc`: gRPC streaming server implementation
//!   - `random`: `rand`-backed value sources
//!   - `config`: Configuration from environment variables
//!   - `health`: Health check HTTP endpoint
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: Tracing and OpenTelemetry setup
//!
//! # Data Flow
//!
//! ```text
//!                 ┌─────────────┐ subscribe ┌──────────────┐
//! Client 1 ──────►│             │──────────►│ ReadingStream│──► Client 1
//! Client 2 ──────►│    gRPC     │──────────►│ ReadingStream│──► Client 2
//! Client N ──────►│   Server    │──────────►│ ReadingStream│──► Client N
//!                 └─────────────┘           └──────────────┘
//!                        │ each stream: own timer, own value source
//!                        ▼
//!                 SubscriptionRegistry (observes open streams)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::reading::{Reading, ReadingId, VALUE_MAX, VALUE_MIN, VALUE_RANGE, ValueSource};
pub use domain::subscription::{
    SubscriptionHandle, SubscriptionId, SubscriptionInfo, SubscriptionRegistry, SubscriptionStats,
};

// Application
pub use application::ports::ValueSourceFactory;
pub use application::services::{EmitterError, ReadingEmitter, ReadingStream};

// Infrastructure config
pub use infrastructure::config::{ConfigError, EmitterSettings, ServerSettings, StreamConfig};

// Random value sources
pub use infrastructure::random::{RandomSourceFactory, SeededRandomSource, ThreadRandomSource};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// gRPC server (for integration tests)
pub use infrastructure::grpc::{
    proto::sensor::v1 as proto,
    server::{SensorStreamServer, SensorStreamServerConfig},
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{
    TelemetryConfig, TelemetryError, TelemetryGuard, init as init_telemetry,
};
