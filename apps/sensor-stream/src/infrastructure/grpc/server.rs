//! gRPC Streaming Server Implementation
//!
//! Implements the `SensorStreamService` gRPC service that exposes the
//! periodic reading stream to downstream clients.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use futures::{Stream, StreamExt};
use prost_types::Timestamp;
use tonic::{Request, Response, Status};

use super::proto::sensor::v1::{
    GetStreamStatusRequest, GetStreamStatusResponse, ServerRequest, StreamStatus, Temperature,
    sensor_stream_service_server::SensorStreamService,
};
use crate::application::services::{EmitterError, ReadingEmitter, ReadingStream};
use crate::domain::reading::Reading;
use crate::domain::subscription::{SubscriptionHandle, SubscriptionId, SubscriptionRegistry};
use crate::infrastructure::metrics::{self, AbortReason};

// =============================================================================
// Type Aliases
// =============================================================================

type StreamResult<T> = Result<Response<T>, Status>;
type BoxedStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Wire format of the `time` field: ISO-8601 local date-time, no offset.
const LOCAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the gRPC streaming server.
#[derive(Debug, Clone)]
pub struct SensorStreamServerConfig {
    /// Service version string.
    pub version: String,
}

impl Default for SensorStreamServerConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// Server Implementation
// =============================================================================

/// gRPC server for the reading stream.
#[derive(Debug)]
pub struct SensorStreamServer {
    config: SensorStreamServerConfig,
    emitter: ReadingEmitter,
    registry: Arc<SubscriptionRegistry>,
    started_at: Instant,
}

impl SensorStreamServer {
    /// Create a new gRPC streaming server.
    #[must_use]
    pub fn new(
        config: SensorStreamServerConfig,
        emitter: ReadingEmitter,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            config,
            emitter,
            registry,
            started_at: Instant::now(),
        }
    }

    /// Subscription registry shared with the health server.
    #[must_use]
    pub fn registry(&self) -> Arc<SubscriptionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Emission interval of every stream served.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.emitter.interval()
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> StreamStatus {
        let now = Utc::now();
        let started_at =
            now - chrono::Duration::from_std(self.started_at.elapsed()).unwrap_or_default();
        let stats = self.registry.stats();

        StreamStatus {
            version: self.config.version.clone(),
            started_at: Some(datetime_to_timestamp(started_at)),
            current_time: Some(datetime_to_timestamp(now)),
            interval_ms: i64::try_from(self.interval().as_millis()).unwrap_or(i64::MAX),
            active_subscriptions: i32::try_from(stats.active).unwrap_or(i32::MAX),
            total_subscriptions: i64::try_from(stats.total_opened).unwrap_or(i64::MAX),
            readings_emitted: i64::try_from(stats.readings_emitted).unwrap_or(i64::MAX),
        }
    }
}

#[tonic::async_trait]
impl SensorStreamService for SensorStreamServer {
    type ServerStream = BoxedStream<Temperature>;

    async fn server(&self, _request: Request<ServerRequest>) -> StreamResult<Self::ServerStream> {
        let subscription_id = uuid::Uuid::new_v4().as_u64_pair().0;
        let handle = SubscriptionRegistry::open(&self.registry, subscription_id);

        metrics::record_subscription_opened();
        tracing::info!(
            subscription_id = %subscription_id,
            interval = ?self.interval(),
            "Reading stream opened"
        );

        let stream = SubscriptionStream {
            readings: self.emitter.subscribe(),
            handle: Some(handle),
        };

        Ok(Response::new(Box::pin(stream) as Self::ServerStream))
    }

    async fn get_stream_status(
        &self,
        _request: Request<GetStreamStatusRequest>,
    ) -> StreamResult<GetStreamStatusResponse> {
        Ok(Response::new(GetStreamStatusResponse {
            status: Some(self.status()),
        }))
    }
}

// =============================================================================
// Subscription Stream
// =============================================================================

/// Response stream of one `Server` call.
///
/// Owns the subscription's registration; dropping the stream closes it.
struct SubscriptionStream {
    readings: ReadingStream,
    handle: Option<SubscriptionHandle>,
}

impl SubscriptionStream {
    fn subscription_id(&self) -> Option<SubscriptionId> {
        self.handle.as_ref().map(SubscriptionHandle::id)
    }
}

impl Stream for SubscriptionStream {
    type Item = Result<Temperature, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match ready!(this.readings.poll_next_unpin(cx)) {
            Some(Ok(reading)) => {
                if let Some(handle) = &this.handle {
                    handle.record_reading();
                }
                metrics::record_reading_emitted();
                Poll::Ready(Some(Ok(reading_to_proto(&reading))))
            }
            Some(Err(error)) => {
                tracing::warn!(
                    subscription_id = ?this.subscription_id(),
                    error = %error,
                    "Reading stream aborted"
                );
                metrics::record_stream_aborted(abort_reason(&error));
                Poll::Ready(Some(Err(emitter_error_to_status(&error))))
            }
            None => Poll::Ready(None),
        }
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let subscription_id = handle.id();
            let readings_sent = handle.readings_sent();
            drop(handle);

            metrics::record_subscription_closed();
            tracing::info!(
                subscription_id = %subscription_id,
                readings_sent,
                "Reading stream closed"
            );
        }
    }
}

// =============================================================================
// Conversion Functions
// =============================================================================

fn datetime_to_timestamp(dt: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: dt.timestamp(),
        nanos: i32::try_from(dt.timestamp_subsec_nanos()).unwrap_or(i32::MAX),
    }
}

fn local_time_string(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&Local)
        .naive_local()
        .format(LOCAL_TIME_FORMAT)
        .to_string()
}

fn reading_to_proto(reading: &Reading) -> Temperature {
    Temperature {
        id: reading.id(),
        temperature: reading.value(),
        time: local_time_string(reading.timestamp()),
        recorded_at: Some(datetime_to_timestamp(reading.timestamp())),
    }
}

const fn abort_reason(error: &EmitterError) -> AbortReason {
    match error {
        EmitterError::TickOverflow(_) => AbortReason::TickOverflow,
        EmitterError::SchedulerShutdown | EmitterError::ZeroInterval => AbortReason::Shutdown,
    }
}

fn emitter_error_to_status(error: &EmitterError) -> Status {
    Status::aborted(format!("stream aborted: {error}"))
}

// =============================================================================
// Tests
// =============================================================================
